//! The inducer library: one row of curve-fit parameters per sensor.

use std::collections::BTreeSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::contracts::{RegimeContracts, sensor_contracts};
use super::envelope::EnvelopeVariant;
use super::params::{SaturationParams, SensorParams};
use crate::data::csv::{CsvTable, parse_number};
use crate::error::{Error, Result};

pub const COL_INDUCER: &str = "Inducer";
pub const COL_YMIN: &str = "ymin (RPUx10-3)";
pub const COL_START: &str = "start";
pub const COL_K: &str = "K (µM)";
pub const COL_YMAX_LINEAR: &str = "ymax Linear";
pub const COL_STD: &str = "std";
pub const COL_YMAX_SATURATION: &str = "ymax Saturation";
pub const COL_FINAL_K: &str = "final K (µM)";

/// How raw library columns turn into [`SensorParams`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibraryOptions {
    /// Multiplier from the `ymin` column unit to RPU.
    pub leak_scale: f64,
    /// Half-open range for generated std margins.
    pub std_range: (f64, f64),
    pub std_seed: u64,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            leak_scale: 1e-3,
            std_range: (0.7, 0.8),
            std_seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorLibrary {
    sensors: Vec<SensorParams>,
    table: CsvTable,
}

impl SensorLibrary {
    pub fn load(path: &Path, options: &LibraryOptions) -> Result<Self> {
        let table = CsvTable::read(path)?;
        let library = Self::from_table(table, options)?;
        info!(
            target: "library",
            "loaded {} sensors from {}",
            library.len(),
            path.display()
        );
        Ok(library)
    }

    pub fn from_table(table: CsvTable, options: &LibraryOptions) -> Result<Self> {
        if table.rows.is_empty() {
            return Err(Error::Csv("library has no sensors".to_string()));
        }
        let names = table.column(COL_INDUCER)?;
        let leaks = table.numeric_column(COL_YMIN)?;
        let starts = table.numeric_column(COL_START)?;
        let ks = table.numeric_column(COL_K)?;
        let ymaxes = table.numeric_column(COL_YMAX_LINEAR)?;
        let stds = match table.column_index(COL_STD) {
            Some(_) => table.numeric_column(COL_STD)?,
            None => {
                debug!(target: "library", "no `{COL_STD}` column, drawing margins");
                draw_stds(table.rows.len(), options)?
            }
        };
        let saturation = saturation_columns(&table)?;

        let mut sensors = Vec::with_capacity(names.len());
        for i in 0..names.len() {
            let mut params = SensorParams::new(
                names[i],
                leaks[i] * options.leak_scale,
                starts[i],
                ks[i],
                ymaxes[i],
                stds[i],
            );
            params.saturation = saturation.as_ref().and_then(|sat| sat[i]);
            params.validate(EnvelopeVariant::Simple)?;
            sensors.push(params);
        }
        check_unique(&sensors)?;
        Ok(Self { sensors, table })
    }

    /// Build a library from parameters directly; `leak` is written back in
    /// RPU×10⁻³.
    pub fn from_params(sensors: Vec<SensorParams>) -> Result<Self> {
        if sensors.is_empty() {
            return Err(Error::InvalidInput("library has no sensors".to_string()));
        }
        for params in &sensors {
            params.validate(EnvelopeVariant::Simple)?;
        }
        check_unique(&sensors)?;
        let leak_scale = LibraryOptions::default().leak_scale;
        let with_saturation = sensors.iter().all(|p| p.saturation.is_some());
        let mut headers: Vec<String> = [COL_INDUCER, COL_YMIN, COL_START, COL_K, COL_YMAX_LINEAR]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if with_saturation {
            headers.push(COL_YMAX_SATURATION.to_string());
            headers.push(COL_FINAL_K.to_string());
        }
        headers.push(COL_STD.to_string());
        let rows = sensors
            .iter()
            .map(|p| {
                let mut row = vec![
                    p.name.clone(),
                    (p.leak / leak_scale).to_string(),
                    p.start.to_string(),
                    p.k.to_string(),
                    p.ymax_lin.to_string(),
                ];
                if let (true, Some(sat)) = (with_saturation, p.saturation) {
                    row.push(sat.ymax_sat.to_string());
                    row.push(sat.final_k.to_string());
                }
                row.push(p.std.to_string());
                row
            })
            .collect();
        Ok(Self {
            sensors,
            table: CsvTable::new(headers, rows)?,
        })
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Sensor names in file order.
    pub fn names(&self) -> Vec<&str> {
        self.sensors.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn sensors(&self) -> &[SensorParams] {
        &self.sensors
    }

    pub fn get(&self, name: &str) -> Option<&SensorParams> {
        self.sensors.iter().find(|p| p.name == name)
    }

    /// Regime contracts of `name`, whose input variable is the sensor name.
    pub fn contracts(
        &self,
        name: &str,
        output: &str,
        variant: EnvelopeVariant,
    ) -> Result<RegimeContracts> {
        let params = self
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown sensor `{name}`")))?;
        sensor_contracts(params, name, output, variant)
    }

    /// The source table with the std margins in use as its `std` column.
    pub fn write_with_std(&self, path: &Path) -> Result<()> {
        let mut table = self.table.clone();
        table.set_column(
            COL_STD,
            self.sensors.iter().map(|p| p.std.to_string()).collect(),
        )?;
        table.write(path)?;
        info!(target: "library", "wrote {} sensors to {}", self.len(), path.display());
        Ok(())
    }
}

fn draw_stds(count: usize, options: &LibraryOptions) -> Result<Vec<f64>> {
    let (lo, hi) = options.std_range;
    if !(0.0..1.0).contains(&lo) || !(lo..=1.0).contains(&hi) {
        return Err(Error::Config(format!(
            "std_range [{lo}, {hi}) must lie within [0, 1)"
        )));
    }
    if hi <= lo {
        return Ok(vec![lo; count]);
    }
    let mut rng = StdRng::seed_from_u64(options.std_seed);
    Ok((0..count).map(|_| rng.random_range(lo..hi)).collect())
}

/// Both saturation columns, or neither.
fn saturation_columns(table: &CsvTable) -> Result<Option<Vec<Option<SaturationParams>>>> {
    let (Some(sat_idx), Some(k_idx)) = (
        table.column_index(COL_YMAX_SATURATION),
        table.column_index(COL_FINAL_K),
    ) else {
        return Ok(None);
    };
    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row[sat_idx].is_empty() || row[k_idx].is_empty() {
                return Ok(None);
            }
            Ok(Some(SaturationParams {
                ymax_sat: parse_number(&row[sat_idx], COL_YMAX_SATURATION, i + 1)?,
                final_k: parse_number(&row[k_idx], COL_FINAL_K, i + 1)?,
            }))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn check_unique(sensors: &[SensorParams]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for p in sensors {
        if !seen.insert(p.name.as_str()) {
            return Err(Error::InvalidInput(format!("duplicate sensor `{}`", p.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = "\
Inducer,ymin (RPUx10-3),start,K (µM),ymax Linear
IPTG,2.0,5,110,1.2
aTc,10,2,12,2.0
Ara,1.5,10,300,3.0
";

    #[test]
    fn seeded_std_is_reproducible_and_in_range() {
        let table = CsvTable::parse(LIBRARY, "lib").unwrap();
        let opts = LibraryOptions::default();
        let a = SensorLibrary::from_table(table.clone(), &opts).unwrap();
        let b = SensorLibrary::from_table(table, &opts).unwrap();
        assert_eq!(a, b);
        for p in a.sensors() {
            assert!((0.7..0.8).contains(&p.std), "{} std {}", p.name, p.std);
        }
        assert_eq!(a.names(), vec!["IPTG", "aTc", "Ara"]);
        assert!((a.get("IPTG").unwrap().leak - 0.002).abs() < 1e-12);
    }

    #[test]
    fn std_column_is_used_when_present() {
        let text = "Inducer,ymin (RPUx10-3),start,K (µM),ymax Linear,std\nIPTG,2,5,110,1.2,0.25\n";
        let table = CsvTable::parse(text, "lib").unwrap();
        let lib = SensorLibrary::from_table(table, &LibraryOptions::default()).unwrap();
        assert_eq!(lib.get("IPTG").unwrap().std, 0.25);
        assert!(lib.get("IPTG").unwrap().saturation.is_none());
    }

    #[test]
    fn saturation_columns_are_optional_per_row() {
        let text = "Inducer,ymin (RPUx10-3),start,K (µM),ymax Linear,ymax Saturation,final K (µM)\n\
                    IPTG,2,5,110,1.2,1.5,1000\naTc,10,2,12,2.0,,\n";
        let table = CsvTable::parse(text, "lib").unwrap();
        let lib = SensorLibrary::from_table(table, &LibraryOptions::default()).unwrap();
        let sat = lib.get("IPTG").unwrap().saturation.unwrap();
        assert_eq!(sat.final_k, 1000.0);
        assert!(lib.get("aTc").unwrap().saturation.is_none());
        assert!(lib.contracts("aTc", "x1", EnvelopeVariant::Full).is_err());
        assert!(lib.contracts("IPTG", "x1", EnvelopeVariant::Full).is_ok());
    }

    #[test]
    fn rejects_duplicates_and_bad_ranges() {
        let text = "Inducer,ymin (RPUx10-3),start,K (µM),ymax Linear\nIPTG,2,5,110,1.2\nIPTG,2,5,110,1.2\n";
        let table = CsvTable::parse(text, "lib").unwrap();
        assert!(SensorLibrary::from_table(table, &LibraryOptions::default()).is_err());

        let table = CsvTable::parse(LIBRARY, "lib").unwrap();
        let opts = LibraryOptions {
            std_range: (0.5, 1.5),
            ..LibraryOptions::default()
        };
        assert!(SensorLibrary::from_table(table, &opts).is_err());
    }

    #[test]
    fn from_params_round_trips_through_table() {
        let lib = SensorLibrary::from_params(vec![
            SensorParams::new("IPTG", 0.002, 5.0, 110.0, 1.2, 0.25),
            SensorParams::new("aTc", 0.01, 2.0, 12.0, 2.0, 0.5),
        ])
        .unwrap();
        let text = lib.table.to_csv_string();
        let again =
            SensorLibrary::from_table(CsvTable::parse(&text, "lib").unwrap(), &LibraryOptions::default())
                .unwrap();
        assert_eq!(again.names(), lib.names());
        for (a, b) in again.sensors().iter().zip(lib.sensors()) {
            assert!((a.leak - b.leak).abs() < 1e-12, "{}", a.name);
            assert_eq!(a.k, b.k);
            assert_eq!(a.std, b.std);
        }
    }
}
