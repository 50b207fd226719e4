use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::data::{DatasetSpec, default_specs};
use crate::design::{
    DesignOptions, Enumeration, ExploreOptions, Processors, StageSpec, default_stage_specs,
};
use crate::error::Result;
use crate::plot::RenderOptions;
use crate::sensor::{EnvelopeVariant, LibraryOptions};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataConfig {
    #[serde(default = "DataConfig::default_marionette_csv")]
    pub marionette_csv: String,
    #[serde(default = "DataConfig::default_dose_response_dir")]
    pub dose_response_dir: String,
    /// `ymin` column unit to RPU.
    #[serde(default = "DataConfig::default_leak_scale")]
    pub leak_scale: f64,
    /// Range of generated std margins when the library has no `std` column.
    #[serde(default = "DataConfig::default_std_range")]
    pub std_range: [f64; 2],
    #[serde(default = "DataConfig::default_std_seed")]
    pub std_seed: u64,
    #[serde(default = "default_specs")]
    pub datasets: Vec<DatasetSpec>,
}

impl DataConfig {
    fn default_marionette_csv() -> String {
        "data/marionette_data.csv".to_string()
    }
    fn default_dose_response_dir() -> String {
        "data/dose_response".to_string()
    }
    fn default_leak_scale() -> f64 {
        1e-3
    }
    fn default_std_range() -> [f64; 2] {
        [0.7, 0.8]
    }
    fn default_std_seed() -> u64 {
        7
    }

    pub fn library_options(&self) -> LibraryOptions {
        LibraryOptions {
            leak_scale: self.leak_scale,
            std_range: (self.std_range[0], self.std_range[1]),
            std_seed: self.std_seed,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            marionette_csv: Self::default_marionette_csv(),
            dose_response_dir: Self::default_dose_response_dir(),
            leak_scale: Self::default_leak_scale(),
            std_range: Self::default_std_range(),
            std_seed: Self::default_std_seed(),
            datasets: default_specs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExplorationConfig {
    #[serde(default)]
    pub enumeration: Enumeration,
    #[serde(default)]
    pub variant: EnvelopeVariant,
    #[serde(default = "ExplorationConfig::default_jobs")]
    pub jobs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub save_contracts: bool,
    #[serde(default)]
    pub save_errors: bool,
    #[serde(default = "ExplorationConfig::default_output_dir")]
    pub output_dir: String,
}

impl ExplorationConfig {
    fn default_jobs() -> usize {
        1
    }
    fn default_output_dir() -> String {
        "data".to_string()
    }

    pub fn explore_options(&self) -> ExploreOptions {
        ExploreOptions {
            enumeration: self.enumeration,
            design: DesignOptions {
                variant: self.variant,
                save_contracts: self.save_contracts,
                save_errors: self.save_errors,
                output_dir: PathBuf::from(&self.output_dir),
            },
            jobs: self.jobs,
            limit: self.limit,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            enumeration: Enumeration::default(),
            variant: EnvelopeVariant::default(),
            jobs: Self::default_jobs(),
            limit: None,
            save_contracts: false,
            save_errors: false,
            output_dir: Self::default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlotConfig {
    #[serde(default = "PlotConfig::default_out_dir")]
    pub out_dir: String,
    #[serde(default = "PlotConfig::default_width")]
    pub width: u32,
    #[serde(default = "PlotConfig::default_height")]
    pub height: u32,
}

impl PlotConfig {
    fn default_out_dir() -> String {
        "target/plots".to_string()
    }
    fn default_width() -> u32 {
        1200
    }
    fn default_height() -> u32 {
        800
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            out_dir: Self::default_out_dir(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub exploration: ExplorationConfig,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default = "default_stage_specs")]
    pub processors: Vec<StageSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            exploration: ExplorationConfig::default(),
            plot: PlotConfig::default(),
            processors: default_stage_specs(),
        }
    }
}

impl AppConfig {
    pub fn processors(&self) -> Result<Processors> {
        Processors::from_specs(&self.processors)
    }

    /// Every line of `text` commented out except plain `[table]` headers,
    /// so the file documents the defaults without pinning them. Array
    /// tables and their sub-tables are commented as a whole.
    fn commented_template(text: &str) -> String {
        let mut array_paths: Vec<String> = Vec::new();
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
                continue;
            }
            if let Some(path) = trimmed.strip_prefix("[[").and_then(|t| t.strip_suffix("]]")) {
                array_paths.push(path.trim().to_string());
            }
            let plain_header = trimmed
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .filter(|path| !path.starts_with('['))
                .is_some_and(|path| {
                    !array_paths
                        .iter()
                        .any(|a| path.trim().starts_with(&format!("{a}.")))
                });
            if !plain_header {
                commented.push_str("# ");
            }
            commented.push_str(line);
            commented.push('\n');
        }
        commented
    }

    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        warn!("Failed to parse config {path}: {err}. Using defaults.");
                    }
                },
                Err(err) => {
                    warn!("Failed to read config {path}: {err}. Using defaults.");
                }
            }
            return Self::default();
        }

        // File does not exist: write defaults and return them.
        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Some(parent) = path_obj.parent().filter(|p| !p.as_os_str().is_empty()) {
                    let _ = fs::create_dir_all(parent);
                }
                if let Err(err) = fs::write(path_obj, Self::commented_template(&text)) {
                    warn!("Failed to write default config to {path}: {err}");
                }
            }
            Err(err) => {
                warn!("Failed to serialize default config ({err}); continuing with defaults");
            }
        }
        default_cfg
    }
}
