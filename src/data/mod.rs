//! Dose-response tables: CSV reading, per-replicate normalization and
//! mean/std summaries.

pub mod csv;
pub mod datasets;
pub mod table;

pub use csv::CsvTable;
pub use datasets::{DataKind, DatasetSpec, TailCollapse, default_specs, load_dataset, load_datasets};
pub use table::{Reference, ReplicateTable, SummaryTable};
