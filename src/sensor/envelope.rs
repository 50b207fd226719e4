//! Piecewise-linear output envelopes for the three regimes of a sensor.
//!
//! Every regime is an input domain plus a lower line and an optional upper
//! line on the output. The margins widen the curve-fit leak and ymax by the
//! sensor's relative `std`; the linear regime connects the pessimistic ends
//! (`leak_hi -> ymax_lo`) for its lower line and the optimistic ends
//! (`leak_lo -> ymax_hi`) for its upper line.

use std::fmt;

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::params::{SaturationParams, SensorParams};
use crate::error::Result;

/// Lag regime lower edge, as a fraction of `start` (full variant).
pub const LAG_START_FRACTION: f64 = 0.08;
/// Leak level reached at the lag lower edge, as a fraction of leak.
pub const LAG_LEAK_FRACTION: f64 = 0.1;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeVariant {
    /// Four parameters; flat lag and open-ended saturation.
    #[default]
    Simple,
    /// Six parameters; sloped lag and bounded saturation.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    Lag,
    Linear,
    Saturation,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Lag, Regime::Linear, Regime::Saturation];

    pub fn name(self) -> &'static str {
        match self {
            Regime::Lag => "lag",
            Regime::Linear => "linear",
            Regime::Saturation => "saturation",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `y = slope * u + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    pub fn flat(level: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: level,
        }
    }

    /// Line through `(u0, y0)` and `(u1, y1)`.
    pub fn through(u0: f64, y0: f64, u1: f64, y1: f64) -> Self {
        let slope = (y1 - y0) / (u1 - u0);
        Self {
            slope,
            intercept: y0 - slope * u0,
        }
    }

    pub fn at(&self, u: f64) -> f64 {
        self.slope * u + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeEnvelope {
    pub regime: Regime,
    pub u_min: Option<f64>,
    pub u_max: Option<f64>,
    pub lower: Line,
    pub upper: Option<Line>,
}

impl RegimeEnvelope {
    pub fn covers(&self, u: f64) -> bool {
        self.u_min.is_none_or(|lo| u >= lo) && self.u_max.is_none_or(|hi| u <= hi)
    }

    /// Output bounds at `u`, or `None` outside the domain.
    pub fn bounds_at(&self, u: f64) -> Option<(f64, Option<f64>)> {
        self.covers(u)
            .then(|| (self.lower.at(u), self.upper.map(|line| line.at(u))))
    }
}

/// Leak and ymax widened by the relative std.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub leak_hi: f64,
    pub leak_lo: f64,
    pub ymax_hi: f64,
    pub ymax_lo: f64,
}

impl Margins {
    pub fn of(params: &SensorParams) -> Self {
        Self {
            leak_hi: params.leak * (1.0 + params.std),
            leak_lo: params.leak * (1.0 - params.std),
            ymax_hi: params.ymax_lin * (1.0 + params.std),
            ymax_lo: params.ymax_lin * (1.0 - params.std),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub lag: RegimeEnvelope,
    pub linear: RegimeEnvelope,
    pub saturation: RegimeEnvelope,
}

impl Envelope {
    pub fn build(params: &SensorParams, variant: EnvelopeVariant) -> Result<Self> {
        params.validate(variant)?;
        let margins = Margins::of(params);
        let linear = linear_regime(params, &margins);
        Ok(match (variant, params.saturation) {
            (EnvelopeVariant::Full, Some(sat)) => Self {
                lag: sloped_lag(params, &margins),
                linear,
                saturation: bounded_saturation(params, &margins, sat),
            },
            _ => Self {
                lag: RegimeEnvelope {
                    regime: Regime::Lag,
                    u_min: None,
                    u_max: Some(params.start),
                    lower: Line::flat(margins.leak_lo),
                    upper: Some(Line::flat(margins.leak_hi)),
                },
                linear,
                saturation: RegimeEnvelope {
                    regime: Regime::Saturation,
                    u_min: Some(params.k),
                    u_max: None,
                    lower: Line::flat(margins.ymax_lo),
                    upper: None,
                },
            },
        })
    }

    pub fn regime(&self, regime: Regime) -> &RegimeEnvelope {
        match regime {
            Regime::Lag => &self.lag,
            Regime::Linear => &self.linear,
            Regime::Saturation => &self.saturation,
        }
    }

    pub fn regimes(&self) -> [&RegimeEnvelope; 3] {
        [&self.lag, &self.linear, &self.saturation]
    }

    /// First regime (lag, linear, saturation order) whose domain holds `u`.
    pub fn regime_at(&self, u: f64) -> Option<&RegimeEnvelope> {
        self.regimes().into_iter().find(|r| r.covers(u))
    }
}

fn linear_regime(params: &SensorParams, m: &Margins) -> RegimeEnvelope {
    RegimeEnvelope {
        regime: Regime::Linear,
        u_min: Some(params.start),
        u_max: Some(params.k),
        lower: Line::through(params.start, m.leak_hi, params.k, m.ymax_lo),
        upper: Some(Line::through(params.start, m.leak_lo, params.k, m.ymax_hi)),
    }
}

// Slopes come from the hi/lo leak respectively, intercepts are swapped:
// upper = slope(hi) with intercept(lo), lower = slope(lo) with intercept(hi).
fn sloped_lag(params: &SensorParams, m: &Margins) -> RegimeEnvelope {
    let u0 = LAG_START_FRACTION * params.start;
    let slope_of = |leak: f64| (LAG_LEAK_FRACTION * leak - leak) / (u0 - params.start);
    let slope_hi = slope_of(m.leak_hi);
    let slope_lo = slope_of(m.leak_lo);
    let intercept_hi = m.leak_hi - slope_hi * params.start;
    let intercept_lo = m.leak_lo - slope_lo * params.start;
    RegimeEnvelope {
        regime: Regime::Lag,
        u_min: Some(u0),
        u_max: Some(params.start),
        lower: Line {
            slope: slope_lo,
            intercept: intercept_hi,
        },
        upper: Some(Line {
            slope: slope_hi,
            intercept: intercept_lo,
        }),
    }
}

fn bounded_saturation(
    params: &SensorParams,
    m: &Margins,
    sat: SaturationParams,
) -> RegimeEnvelope {
    let ysat_lo = sat.ymax_sat * (1.0 - params.std);
    let ysat_hi = sat.ymax_sat * (1.0 + params.std);
    RegimeEnvelope {
        regime: Regime::Saturation,
        u_min: Some(params.k),
        u_max: Some(sat.final_k),
        lower: Line::through(params.k, m.ymax_lo, sat.final_k, ysat_lo),
        upper: Some(Line::through(params.k, m.ymax_hi, sat.final_k, ysat_hi)),
    }
}
