//! The dose-response sources and how each one is prepared.

use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::table::{Reference, ReplicateTable, SummaryTable};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TailCollapse {
    pub count: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSpec {
    pub name: String,
    /// File name relative to the dose-response directory.
    pub file: String,
    pub reference: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_tail: Option<TailCollapse>,
}

impl DatasetSpec {
    fn new(name: &str, file: &str, reference: Reference) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
            reference,
            collapse_tail: None,
        }
    }

    fn collapsing(mut self, count: usize, label: &str) -> Self {
        self.collapse_tail = Some(TailCollapse {
            count,
            label: label.to_string(),
        });
        self
    }
}

pub fn default_specs() -> Vec<DatasetSpec> {
    vec![
        DatasetSpec::new("IPTG", "IPTG.csv", Reference::First),
        DatasetSpec::new("IPTG*", "IPTG_08_29.csv", Reference::Last),
        DatasetSpec::new("OC6", "OC6.csv", Reference::First),
        DatasetSpec::new("Sal", "Sal.csv", Reference::Last).collapsing(5, "1000uM"),
        DatasetSpec::new("OHC14", "OHC14.csv", Reference::Last).collapsing(5, "2uM"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Normalized,
    Absolute,
}

pub fn load_dataset(dir: &Path, spec: &DatasetSpec, kind: DataKind) -> Result<SummaryTable> {
    let path = dir.join(&spec.file);
    let mut table = ReplicateTable::read(&path)?;
    if let Some(tail) = &spec.collapse_tail {
        table = table.collapse_tail(tail.count, &tail.label)?;
    }
    if kind == DataKind::Normalized {
        table = table.normalized_by(spec.reference)?;
    }
    debug!(
        target: "data",
        "{}: {} replicates x {} concentrations",
        spec.name,
        table.replicates(),
        table.columns().len()
    );
    Ok(table.summary())
}

/// Summaries keyed by dataset name.
pub fn load_datasets(
    dir: &Path,
    specs: &[DatasetSpec],
    kind: DataKind,
) -> Result<BTreeMap<String, SummaryTable>> {
    specs
        .iter()
        .map(|spec| Ok((spec.name.clone(), load_dataset(dir, spec, kind)?)))
        .collect()
}
