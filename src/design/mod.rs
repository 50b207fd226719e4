//! Multi-sensor designs: the processing stages, the composition pipeline
//! for a single design and the exhaustive exploration over a library.

pub mod explore;
pub mod pipeline;
pub mod processors;

pub use explore::{
    Combinations, Enumeration, ExplorationReport, ExplorationSummary, ExploreOptions,
    Permutations, design_count, explore,
};
pub use pipeline::{DesignOptions, DesignOutcome, Stage, StageError, explore_combination};
pub use processors::{Processors, SENSOR_SLOTS, StageSpec, default_stage_specs};
