use serde::{Deserialize, Serialize};

use super::envelope::EnvelopeVariant;
use crate::error::{Error, Result};

/// End of the saturation regime, only needed by the full envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationParams {
    /// Absolute maximum output after saturation.
    pub ymax_sat: f64,
    /// Inducer level at which the saturation regime ends.
    pub final_k: f64,
}

/// Curve-fit summary of one inducible sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorParams {
    /// Inducer name; also the contract input variable.
    pub name: String,
    /// Output expression without inducer (RPU).
    pub leak: f64,
    /// Inducer level where induction starts.
    pub start: f64,
    /// Hill activation constant; end of the linear regime.
    pub k: f64,
    /// Output at the end of the linear regime (RPU).
    pub ymax_lin: f64,
    /// Relative margin applied to leak and ymax.
    pub std: f64,
    #[serde(default)]
    pub saturation: Option<SaturationParams>,
}

impl SensorParams {
    pub fn new(name: impl Into<String>, leak: f64, start: f64, k: f64, ymax_lin: f64, std: f64) -> Self {
        Self {
            name: name.into(),
            leak,
            start,
            k,
            ymax_lin,
            std,
            saturation: None,
        }
    }

    pub fn with_saturation(mut self, ymax_sat: f64, final_k: f64) -> Self {
        self.saturation = Some(SaturationParams { ymax_sat, final_k });
        self
    }

    pub fn with_std(&self, std: f64) -> Self {
        Self {
            std,
            ..self.clone()
        }
    }

    /// Reject parameter sets whose envelope would divide by zero or flip.
    pub fn validate(&self, variant: EnvelopeVariant) -> Result<()> {
        let name = &self.name;
        let finite = [self.leak, self.start, self.k, self.ymax_lin, self.std]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(Error::InvalidInput(format!("{name}: non-finite parameter")));
        }
        if self.leak < 0.0 || self.ymax_lin < 0.0 || self.start < 0.0 {
            return Err(Error::InvalidInput(format!(
                "{name}: leak, start and ymax must be non-negative"
            )));
        }
        if !(0.0..1.0).contains(&self.std) {
            return Err(Error::InvalidInput(format!(
                "{name}: std margin {} outside [0, 1)",
                self.std
            )));
        }
        if self.k <= self.start {
            return Err(Error::InvalidInput(format!(
                "{name}: K ({}) must exceed start ({})",
                self.k, self.start
            )));
        }
        if variant == EnvelopeVariant::Full {
            let Some(sat) = self.saturation else {
                return Err(Error::InvalidInput(format!(
                    "{name}: full envelope needs ymax_sat and final K"
                )));
            };
            if self.start <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{name}: full envelope needs a positive start"
                )));
            }
            if !sat.ymax_sat.is_finite() || !sat.final_k.is_finite() || sat.ymax_sat < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{name}: invalid saturation parameters"
                )));
            }
            if sat.final_k <= self.k {
                return Err(Error::InvalidInput(format!(
                    "{name}: final K ({}) must exceed K ({})",
                    sat.final_k, self.k
                )));
            }
        }
        Ok(())
    }
}
