//! The three processing stages every design feeds its sensors into.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::polyhedra::IoContract;

/// Output variables the four sensors of a design drive, in slot order.
pub const SENSOR_SLOTS: [&str; 4] = ["x1", "x2", "x3", "x4"];

/// A processing stage written as constraint strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageSpec {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub guarantees: Vec<String>,
}

impl StageSpec {
    fn new(name: &str, inputs: [&str; 2], output: &str, assumptions: [&str; 2], guarantee: &str) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            name: name.to_string(),
            inputs: owned(&inputs),
            outputs: vec![output.to_string()],
            assumptions: owned(&assumptions),
            guarantees: vec![guarantee.to_string()],
        }
    }

    pub fn build(&self) -> Result<IoContract> {
        IoContract::from_strings(
            &self.inputs,
            &self.outputs,
            &self.assumptions,
            &self.guarantees,
        )
        .map_err(|e| Error::Config(format!("stage `{}`: {e}", self.name)))
    }
}

pub fn default_stage_specs() -> Vec<StageSpec> {
    vec![
        StageSpec::new("P1", ["x1", "x2"], "y1", ["-x1 <= -0.02", "-x2 <= -0.01"], "-y1 <= -2.05"),
        StageSpec::new("P2", ["x3", "x4"], "y2", ["-x3 <= -0.07", "-x4 <= -0.08"], "-y2 <= -1.05"),
        StageSpec::new("P3", ["y1", "y2"], "y", ["-y1 <= -0.4", "-y2 <= -0.5"], "-y <= -2.05"),
    ]
}

/// P1 consumes slots 1-2, P2 slots 3-4, P3 combines their outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Processors {
    pub first: IoContract,
    pub second: IoContract,
    pub combiner: IoContract,
}

impl Processors {
    pub fn standard() -> Result<Self> {
        Self::from_specs(&default_stage_specs())
    }

    pub fn from_specs(specs: &[StageSpec]) -> Result<Self> {
        let [first, second, combiner] = specs else {
            return Err(Error::Config(format!(
                "expected 3 processing stages, got {}",
                specs.len()
            )));
        };
        let processors = Self {
            first: first.build()?,
            second: second.build()?,
            combiner: combiner.build()?,
        };
        processors.check_wiring()?;
        Ok(processors)
    }

    /// The variable the finished system must produce.
    pub fn system_output(&self) -> &str {
        self.combiner
            .outputs()
            .first()
            .map(|v| v.name())
            .unwrap_or_default()
    }

    fn check_wiring(&self) -> Result<()> {
        for (stage, slots) in [(&self.first, &SENSOR_SLOTS[..2]), (&self.second, &SENSOR_SLOTS[2..])] {
            if let Some(slot) = slots.iter().find(|s| !stage.has_input(s)) {
                return Err(Error::Config(format!(
                    "a sensor stage does not read `{slot}`"
                )));
            }
        }
        for upstream in [&self.first, &self.second] {
            if let Some(v) = upstream.outputs().iter().find(|v| !self.combiner.has_input(v.name())) {
                return Err(Error::Config(format!(
                    "combining stage does not read `{v}`"
                )));
            }
        }
        if self.combiner.outputs().is_empty() {
            return Err(Error::Config("combining stage has no output".to_string()));
        }
        Ok(())
    }
}
