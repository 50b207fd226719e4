use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::csv::{CsvTable, parse_number};
use crate::error::{Error, Result};

/// Which column a replicate row is normalized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Reference {
    First,
    Last,
}

/// Replicate measurements: one row per replicate, one column per
/// inducer concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ReplicateTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Csv("table has no columns".to_string()));
        }
        if rows.is_empty() {
            return Err(Error::Csv("table has no replicates".to_string()));
        }
        if let Some(i) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(Error::Csv(format!(
                "replicate {} has {} values for {} columns",
                i + 1,
                rows[i].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv(table: &CsvTable) -> Result<Self> {
        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .zip(&table.headers)
                    .map(|(cell, col)| parse_number(cell, col, i + 1))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(table.headers.clone(), rows)
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::from_csv(&CsvTable::read(path)?)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn replicates(&self) -> usize {
        self.rows.len()
    }

    /// Replace the last `count` columns by their per-row mean under `label`.
    pub fn collapse_tail(&self, count: usize, label: &str) -> Result<Self> {
        if count == 0 || count > self.columns.len() {
            return Err(Error::InvalidInput(format!(
                "cannot collapse {count} of {} columns",
                self.columns.len()
            )));
        }
        let keep = self.columns.len() - count;
        let mut columns = self.columns[..keep].to_vec();
        columns.push(label.to_string());
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out = row[..keep].to_vec();
                out.push(mean(&row[keep..]));
                out
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Divide every row by its own reference column.
    pub fn normalized_by(&self, reference: Reference) -> Result<Self> {
        let idx = match reference {
            Reference::First => 0,
            Reference::Last => self.columns.len() - 1,
        };
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let denom = row[idx];
                if denom == 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "replicate {} has zero in reference column `{}`",
                        i + 1,
                        self.columns[idx]
                    )));
                }
                Ok(row.iter().map(|v| v / denom).collect())
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.columns.clone(), rows)
    }

    /// Per-column mean and sample standard deviation.
    pub fn summary(&self) -> SummaryTable {
        let n = self.columns.len();
        let column = |j: usize| self.rows.iter().map(|r| r[j]).collect::<Vec<_>>();
        let (mean, std): (Vec<f64>, Vec<f64>) = (0..n)
            .map(|j| {
                let values = column(j);
                (mean(&values), sample_std(&values))
            })
            .unzip();
        SummaryTable {
            columns: self.columns.clone(),
            replicates: self.rows.clone(),
            mean,
            std,
        }
    }
}

/// Replicates plus appended `mean` and `std` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub replicates: Vec<Vec<f64>>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl SummaryTable {
    pub fn row_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = (1..=self.replicates.len())
            .map(|i| format!("replicate {i}"))
            .collect();
        labels.push("mean".to_string());
        labels.push("std".to_string());
        labels
    }

    pub fn row(&self, label: &str) -> Option<&[f64]> {
        match label {
            "mean" => Some(self.mean.as_slice()),
            "std" => Some(self.std.as_slice()),
            _ => label
                .strip_prefix("replicate ")
                .and_then(|i| i.parse::<usize>().ok())
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| self.replicates.get(i))
                .map(Vec::as_slice),
        }
    }

    pub fn to_csv(&self) -> CsvTable {
        let mut headers = vec![String::new()];
        headers.extend(self.columns.iter().cloned());
        let rows = self
            .row_labels()
            .into_iter()
            .zip(self.replicates.iter().chain([&self.mean, &self.std]))
            .map(|(label, values)| {
                let mut row = vec![label];
                row.extend(values.iter().map(|v| v.to_string()));
                row
            })
            .collect();
        CsvTable { headers, rows }
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.row_labels();
        let label_w = labels.iter().map(String::len).max().unwrap_or(0);
        let col_w = self
            .columns
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0)
            .max(10);
        write!(f, "{:label_w$}", "")?;
        for c in &self.columns {
            write!(f, "  {c:>col_w$}")?;
        }
        writeln!(f)?;
        for (label, values) in labels
            .iter()
            .zip(self.replicates.iter().chain([&self.mean, &self.std]))
        {
            write!(f, "{label:label_w$}")?;
            for v in values {
                write!(f, "  {v:>col_w$.4}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// n-1 denominator; NaN for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReplicateTable {
        ReplicateTable::new(
            vec!["0uM".into(), "10uM".into(), "100uM".into()],
            vec![vec![2.0, 4.0, 8.0], vec![4.0, 4.0, 16.0]],
        )
        .unwrap()
    }

    #[test]
    fn normalizes_by_first_and_last() {
        let first = table().normalized_by(Reference::First).unwrap();
        assert_eq!(first.rows()[0], vec![1.0, 2.0, 4.0]);
        assert_eq!(first.rows()[1], vec![1.0, 1.0, 4.0]);
        let last = table().normalized_by(Reference::Last).unwrap();
        assert_eq!(last.rows()[0], vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn zero_reference_is_an_error() {
        let t = ReplicateTable::new(vec!["a".into(), "b".into()], vec![vec![0.0, 1.0]]).unwrap();
        assert!(t.normalized_by(Reference::First).is_err());
        assert!(t.normalized_by(Reference::Last).is_ok());
    }

    #[test]
    fn summary_uses_sample_std() {
        let s = table().summary();
        assert_eq!(s.mean, vec![3.0, 4.0, 12.0]);
        assert!((s.std[0] - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.std[1], 0.0);
        assert_eq!(s.row_labels(), vec!["replicate 1", "replicate 2", "mean", "std"]);
        assert_eq!(s.row("replicate 2").unwrap(), &[4.0, 4.0, 16.0]);
        assert!(s.row("replicate 0").is_none());
    }

    #[test]
    fn single_replicate_std_is_nan() {
        let t = ReplicateTable::new(vec!["a".into()], vec![vec![1.0]]).unwrap();
        assert!(t.summary().std[0].is_nan());
    }

    #[test]
    fn collapse_tail_averages_last_columns() {
        let c = table().collapse_tail(2, "high").unwrap();
        assert_eq!(c.columns(), &["0uM".to_string(), "high".to_string()]);
        assert_eq!(c.rows()[0], vec![2.0, 6.0]);
        assert_eq!(c.rows()[1], vec![4.0, 10.0]);
        assert!(table().collapse_tail(0, "x").is_err());
        assert!(table().collapse_tail(4, "x").is_err());
    }

    #[test]
    fn summary_csv_has_label_column() {
        let csv = table().summary().to_csv();
        assert_eq!(csv.headers[0], "");
        assert_eq!(csv.rows.len(), 4);
        assert_eq!(csv.rows[2][0], "mean");
        assert_eq!(csv.rows[2][1], "3");
    }
}
