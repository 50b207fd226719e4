//! One design: four sensors composed through the fixed stage topology.
//!
//! ```text
//!  s1 ─┐                 s3 ─┐
//!      ├─ s2∘s1 ─ ∘P1 ─┐     ├─ s4∘s3 ─ ∘P2 ─┐
//!  s2 ─┘               │ s4 ─┘               │
//!                      └──── sub1∘sub2 ──────┴─ ∘P3 ─> system
//! ```

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::processors::{Processors, SENSOR_SLOTS};
use crate::instrumentation::{self, OpCounters};
use crate::polyhedra::{ContractError, IoContract, QUANTIZATION_TOLERANCE, write_contracts_to_file};
use crate::sensor::{EnvelopeVariant, SensorLibrary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Sensors12,
    Subsystem1,
    Sensors34,
    Subsystem2,
    Subsystems,
    System,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Sensors12 => "sensors 1+2",
            Stage::Subsystem1 => "subsystem 1",
            Stage::Sensors34 => "sensors 3+4",
            Stage::Subsystem2 => "subsystem 2",
            Stage::Subsystems => "subsystem 1+2",
            Stage::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageError {
    /// A sensor's contract could not be built.
    Sensor { sensor: String, message: String },
    Composition { stage: Stage, error: ContractError },
    UpstreamFailed { stage: Stage },
    /// The composed system does not expose the expected ports.
    Interface(String),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor { sensor, message } => write!(f, "sensor {sensor}: {message}"),
            Self::Composition { stage, error } => {
                write!(f, "{} composition failed: {error}", stage.name())
            }
            Self::UpstreamFailed { stage } => {
                write!(f, "{} skipped: upstream composition failed", stage.name())
            }
            Self::Interface(msg) => write!(f, "interface check failed: {msg}"),
        }
    }
}

impl std::error::Error for StageError {}

#[derive(Debug, Clone)]
pub struct DesignOptions {
    pub variant: EnvelopeVariant,
    pub save_contracts: bool,
    pub save_errors: bool,
    pub output_dir: PathBuf,
}

impl Default for DesignOptions {
    fn default() -> Self {
        Self {
            variant: EnvelopeVariant::Simple,
            save_contracts: false,
            save_errors: false,
            output_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DesignOutcome {
    pub index: usize,
    pub sensors: Vec<String>,
    pub contract: Option<IoContract>,
    pub errors: Vec<StageError>,
    pub counters: OpCounters,
    pub elapsed: Duration,
}

impl DesignOutcome {
    pub fn is_success(&self) -> bool {
        self.contract.is_some()
    }
}

/// Compose one 4-sensor design; every failure is recorded, none is fatal.
pub fn explore_combination(
    index: usize,
    combo: &[&str],
    library: &SensorLibrary,
    processors: &Processors,
    options: &DesignOptions,
) -> DesignOutcome {
    let started = Instant::now();
    instrumentation::reset();
    let mut errors = Vec::new();

    let contract = if combo.len() == SENSOR_SLOTS.len() {
        compose_design(combo, library, processors, options.variant, &mut errors)
    } else {
        errors.push(StageError::Interface(format!(
            "expected {} sensors, got {}",
            SENSOR_SLOTS.len(),
            combo.len()
        )));
        None
    };

    let outcome = DesignOutcome {
        index,
        sensors: combo.iter().map(|s| s.to_string()).collect(),
        contract,
        errors,
        counters: instrumentation::take(),
        elapsed: started.elapsed(),
    };
    debug!(
        target: "explore",
        "design {index} {:?}: {} ({} errors, {} ops)",
        outcome.sensors,
        if outcome.is_success() { "ok" } else { "failed" },
        outcome.errors.len(),
        outcome.counters.total()
    );
    save_artifacts(&outcome, options);
    outcome
}

fn compose_design(
    combo: &[&str],
    library: &SensorLibrary,
    processors: &Processors,
    variant: EnvelopeVariant,
    errors: &mut Vec<StageError>,
) -> Option<IoContract> {
    let sensors: Vec<Option<IoContract>> = combo
        .iter()
        .zip(SENSOR_SLOTS)
        .map(|(name, slot)| match library.contracts(name, slot, variant) {
            Ok(regimes) => Some(regimes.saturation),
            Err(e) => {
                errors.push(StageError::Sensor {
                    sensor: name.to_string(),
                    message: e.to_string(),
                });
                None
            }
        })
        .collect();

    let sub1 = branch(
        sensors[0].as_ref(),
        sensors[1].as_ref(),
        &processors.first,
        [Stage::Sensors12, Stage::Subsystem1],
        errors,
    );
    let sub2 = branch(
        sensors[2].as_ref(),
        sensors[3].as_ref(),
        &processors.second,
        [Stage::Sensors34, Stage::Subsystem2],
        errors,
    );

    let system = match (sub1, sub2) {
        (Some(sub1), Some(sub2)) => attempt(Stage::Subsystems, sub1.compose(&sub2), errors)
            .and_then(|both| attempt(Stage::System, both.compose(&processors.combiner), errors)),
        _ => {
            errors.push(StageError::UpstreamFailed {
                stage: Stage::Subsystems,
            });
            None
        }
    }?;

    let failures = errors.len();
    for name in combo {
        if !system.has_input(name) {
            errors.push(StageError::Interface(format!(
                "sensor {name} is not an input of the system"
            )));
        }
    }
    let output = processors.system_output();
    if !system.has_output(output) {
        errors.push(StageError::Interface(format!(
            "`{output}` is not an output of the system"
        )));
    }
    (errors.len() == failures).then_some(system)
}

// (first ∘ second) is attempted as second.compose(first), then ∘ processor.
fn branch(
    first: Option<&IoContract>,
    second: Option<&IoContract>,
    processor: &IoContract,
    [pair_stage, sub_stage]: [Stage; 2],
    errors: &mut Vec<StageError>,
) -> Option<IoContract> {
    let pair = match (first, second) {
        (Some(first), Some(second)) => attempt(pair_stage, second.compose(first), errors),
        _ => {
            errors.push(StageError::UpstreamFailed { stage: pair_stage });
            None
        }
    };
    match pair {
        Some(pair) => attempt(sub_stage, pair.compose(processor), errors),
        None => {
            errors.push(StageError::UpstreamFailed { stage: sub_stage });
            None
        }
    }
}

fn attempt(
    stage: Stage,
    result: Result<IoContract, ContractError>,
    errors: &mut Vec<StageError>,
) -> Option<IoContract> {
    result
        .map_err(|error| errors.push(StageError::Composition { stage, error }))
        .ok()
}

fn save_artifacts(outcome: &DesignOutcome, options: &DesignOptions) {
    if !options.save_errors && !(options.save_contracts && outcome.is_success()) {
        return;
    }
    if let Err(e) = fs::create_dir_all(&options.output_dir) {
        warn!(target: "explore", "cannot create {}: {e}", options.output_dir.display());
        return;
    }
    let index = outcome.index;
    if options.save_errors {
        let path = options.output_dir.join(format!("design_error_log_{index}.txt"));
        let text: String = outcome.errors.iter().map(|e| format!("{e}\n")).collect();
        if let Err(e) = fs::write(&path, text) {
            warn!(target: "explore", "cannot write {}: {e}", path.display());
        }
    }
    if let (true, Some(contract)) = (options.save_contracts, &outcome.contract) {
        let path = options.output_dir.join(format!("successful_design_{index}.json"));
        let named = [(
            format!("contract_{index}"),
            contract.remove_quantization_errors(QUANTIZATION_TOLERANCE),
        )];
        if let Err(e) = write_contracts_to_file(&path, &named) {
            warn!(target: "explore", "{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedra::{Term, TermList, Var, read_contracts_from_file};

    #[test]
    fn saved_contracts_drop_projection_residue() {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "sensor_contracts_residue_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let contract = IoContract::new(
            vec![Var::new("u")],
            vec![Var::new("y")],
            TermList::from_terms([Term::lower("u", 1.0)]),
            TermList::from_terms([
                Term::new([(Var::new("u"), 1e-7), (Var::new("y"), -1e-7)], 1.0),
                Term::lower("y", 2.05),
            ]),
        )
        .unwrap();
        let outcome = DesignOutcome {
            index: 4,
            sensors: vec!["u".to_string()],
            contract: Some(contract),
            errors: Vec::new(),
            counters: OpCounters::default(),
            elapsed: Duration::ZERO,
        };
        let options = DesignOptions {
            save_contracts: true,
            output_dir: dir.clone(),
            ..DesignOptions::default()
        };
        save_artifacts(&outcome, &options);

        let saved = read_contracts_from_file(&dir.join("successful_design_4.json")).unwrap();
        let system = &saved["contract_4"];
        assert_eq!(system.guarantees().len(), 1);
        assert!(system.guarantees().implies(&Term::lower("y", 2.05)));
        assert_eq!(system.assumptions().len(), 1);
        assert!(!dir.join("design_error_log_4.txt").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
