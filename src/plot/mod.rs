//! Sensor envelope, contract-region and scalability charts.

pub mod regions;
pub mod render;

pub use regions::{
    Figure, Limits, Region, Segment, Shade, contract_figure, contract_polygon, envelope_lines,
    envelope_regions, stitch,
};
pub use render::{RenderOptions, render_exploration, render_figure};
