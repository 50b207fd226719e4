// Entry point: loads config and the sensor library, then runs one subcommand.
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sensor_contracts::cli::{Args, Command};
use sensor_contracts::config::AppConfig;
use sensor_contracts::data::{DataKind, load_datasets};
use sensor_contracts::design::{Enumeration, explore};
use sensor_contracts::plot::{
    Limits, contract_figure, envelope_lines, envelope_regions, render_exploration, render_figure,
    stitch,
};
use sensor_contracts::polyhedra::{Var, write_contracts_to_file};
use sensor_contracts::sensor::{EnvelopeVariant, SensorLibrary};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = AppConfig::load_or_default(&args.config);

    match args.command {
        Command::Schema => {
            let schema = schemars::schema_for!(AppConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Summarize { absolute, out_dir } => {
            let kind = if absolute {
                DataKind::Absolute
            } else {
                DataKind::Normalized
            };
            let dir = Path::new(&config.data.dose_response_dir);
            let summaries = load_datasets(dir, &config.data.datasets, kind)?;
            if let Some(out) = &out_dir {
                fs::create_dir_all(out)?;
            }
            for (name, summary) in &summaries {
                println!("== {name} ==\n{summary}");
                if let Some(out) = &out_dir {
                    let path = Path::new(out).join(format!("{}_summary.csv", file_stem(name)));
                    summary.to_csv().write(&path)?;
                    info!("wrote {}", path.display());
                }
            }
        }
        command => {
            let library = SensorLibrary::load(
                Path::new(&config.data.marionette_csv),
                &config.data.library_options(),
            )?;
            run_with_library(command, &config, &library)?;
        }
    }
    Ok(())
}

fn run_with_library(
    command: Command,
    config: &AppConfig,
    library: &SensorLibrary,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Explore {
            jobs,
            limit,
            ordered,
            variant,
            save_contracts,
            save_errors,
            report,
            summary,
            chart,
        } => {
            let processors = config.processors()?;
            let mut options = config.exploration.explore_options();
            if let Some(jobs) = jobs {
                options.jobs = jobs;
            }
            if limit.is_some() {
                options.limit = limit;
            }
            if ordered {
                options.enumeration = Enumeration::Permutations;
            }
            if let Some(variant) = variant {
                options.design.variant = variant;
            }
            options.design.save_contracts |= save_contracts;
            options.design.save_errors |= save_errors;

            let result = explore(library, &processors, &options)?;
            println!("{}", serde_json::to_string_pretty(&result.summary())?);
            if let Some(path) = report {
                result.write_csv(Path::new(&path))?;
                info!("wrote {path}");
            }
            if let Some(path) = summary {
                result.write_summary_json(Path::new(&path))?;
                info!("wrote {path}");
            }
            if let Some(path) = chart {
                render_exploration(Path::new(&path), &result, config.plot.render_options())?;
                info!("wrote {path}");
            }
        }
        Command::Contracts {
            sensor,
            output,
            variant,
            json,
        } => {
            let variant = variant.unwrap_or(config.exploration.variant);
            let contracts = library.contracts(&sensor, &output, variant)?;
            let mut named = Vec::new();
            for (regime, contract) in contracts.iter() {
                println!("-- {sensor} {regime} --\n{contract}\n");
                named.push((format!("{sensor}_{regime}"), contract.clone()));
            }
            if let Some(path) = json {
                write_contracts_to_file(Path::new(&path), &named)?;
                info!("wrote {path}");
            }
        }
        Command::Augment { out } => {
            library.write_with_std(Path::new(&out))?;
        }
        Command::Plot { sensors, variant } => {
            let variant = variant.unwrap_or(config.exploration.variant);
            let out_dir = PathBuf::from(&config.plot.out_dir);
            fs::create_dir_all(&out_dir)?;
            let names: Vec<String> = if sensors.is_empty() {
                library.names().into_iter().map(String::from).collect()
            } else {
                sensors
            };
            plot_sensors(&names, variant, library, config, &out_dir)?;
        }
        Command::Summarize { .. } | Command::Schema => {
            warn!("command does not need the sensor library");
        }
    }
    Ok(())
}

fn plot_sensors(
    names: &[String],
    variant: EnvelopeVariant,
    library: &SensorLibrary,
    config: &AppConfig,
    out_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let render = config.plot.render_options();
    let mut ranges = Vec::with_capacity(names.len());
    for name in names {
        let params = library
            .get(name)
            .ok_or_else(|| format!("unknown sensor `{name}`"))?;
        let limits = Limits::around(params)?;
        let stem = file_stem(name);

        let nominal = envelope_lines(params, limits);
        render_figure(&out_dir.join(format!("{stem}_envelope.png")), &nominal, render)?;
        let range = envelope_regions(params, limits);
        render_figure(&out_dir.join(format!("{stem}_range.png")), &range, render)?;

        let contracts = library.contracts(name, "y", variant)?;
        let (u, y) = (Var::new(name.as_str()), Var::new("y"));
        let contract_limits = Limits::new(0.0, limits.x_max, 0.0, limits.y_max)?;
        let regimes = contracts
            .iter()
            .map(|(regime, c)| {
                contract_figure(c, &u, &y, contract_limits, &format!("{name} {regime}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let stitched = stitch(&regimes)?;
        render_figure(&out_dir.join(format!("{stem}_contracts.png")), &stitched, render)?;

        ranges.push(range);
        info!("plotted {name}");
    }
    if ranges.len() > 1 {
        let mut overview = stitch(&ranges)?;
        overview.title = "sensor ranges".to_string();
        overview.x_label = "inducer (µM)".to_string();
        render_figure(&out_dir.join("overview.png"), &overview, render)?;
    }
    info!("plots in {}", out_dir.display());
    Ok(())
}

/// File-name-safe version of a sensor or dataset name (`IPTG*` -> `IPTG_`).
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
