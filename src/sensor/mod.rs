//! Inducible sensors: curve-fit parameters, regime envelopes and the
//! contracts derived from them.

pub mod contracts;
pub mod envelope;
pub mod library;
pub mod params;

pub use contracts::{RegimeContracts, regime_contract, sensor_contracts};
pub use envelope::{Envelope, EnvelopeVariant, Line, Margins, Regime, RegimeEnvelope};
pub use library::{LibraryOptions, SensorLibrary};
pub use params::{SaturationParams, SensorParams};
