//! Sensor contracts: piecewise-linear assume/guarantee envelopes for
//! inducible genetic sensors, and an exhaustive check of which sensor
//! combinations satisfy a fixed three-stage processing design.

pub mod cli;
pub mod config;
pub mod data;
pub mod design;
pub mod error;
pub mod instrumentation;
pub mod plot;
pub mod polyhedra;
pub mod sensor;

pub use error::{Error, Result};
