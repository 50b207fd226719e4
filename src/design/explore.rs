//! Enumerate designs over the library and tally the outcomes.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use crossbeam_channel::bounded;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pipeline::{DesignOptions, DesignOutcome, explore_combination};
use super::processors::{Processors, SENSOR_SLOTS};
use crate::error::{Error, Result};
use crate::instrumentation::OpCounters;
use crate::sensor::SensorLibrary;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Enumeration {
    /// Unordered k-subsets; slot order follows library order.
    #[default]
    Combinations,
    /// Every ordered k-tuple of distinct sensors.
    Permutations,
}

/// Lexicographic k-subsets of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();
        let k = self.indices.len();
        // rightmost index that can still move
        match (0..k).rev().find(|&i| self.indices[i] < self.n - k + i) {
            Some(i) => {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(current)
    }
}

/// Ordered k-tuples of distinct indices: each combination in turn, with its
/// elements permuted lexicographically.
#[derive(Debug, Clone)]
pub struct Permutations {
    combinations: Combinations,
    current: Option<Vec<usize>>,
}

impl Permutations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            combinations: Combinations::new(n, k),
            current: None,
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if let Some(current) = self.current.as_mut() {
            if next_permutation(current) {
                return Some(current.clone());
            }
        }
        let first = self.combinations.next()?;
        self.current = Some(first.clone());
        Some(first)
    }
}

fn next_permutation(items: &mut [usize]) -> bool {
    let Some(pivot) = (1..items.len()).rev().find(|&i| items[i - 1] < items[i]) else {
        return false;
    };
    let pivot = pivot - 1;
    let Some(swap) = (pivot + 1..items.len()).rev().find(|&j| items[j] > items[pivot]) else {
        return false;
    };
    items.swap(pivot, swap);
    items[pivot + 1..].reverse();
    true
}

/// Number of designs `enumeration` yields for `n` sensors taken `k` at a time.
pub fn design_count(n: usize, k: usize, enumeration: Enumeration) -> u128 {
    if k > n {
        return 0;
    }
    let falling: u128 = (n - k + 1..=n).map(|v| v as u128).product();
    match enumeration {
        Enumeration::Permutations => falling,
        Enumeration::Combinations => falling / (1..=k).map(|v| v as u128).product::<u128>(),
    }
}

pub fn enumerate(
    n: usize,
    k: usize,
    enumeration: Enumeration,
) -> Box<dyn Iterator<Item = Vec<usize>> + Send> {
    match enumeration {
        Enumeration::Combinations => Box::new(Combinations::new(n, k)),
        Enumeration::Permutations => Box::new(Permutations::new(n, k)),
    }
}

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub enumeration: Enumeration,
    pub design: DesignOptions,
    /// Worker threads; 0 and 1 both run on the calling thread.
    pub jobs: usize,
    pub limit: Option<usize>,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            enumeration: Enumeration::Combinations,
            design: DesignOptions::default(),
            jobs: 1,
            limit: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplorationReport {
    pub outcomes: Vec<DesignOutcome>,
    pub successes: usize,
    pub failures: usize,
    pub counters: OpCounters,
    pub elapsed: Duration,
}

/// Serializable totals of an [`ExplorationReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_rate: f64,
    pub elapsed_ms: f64,
    pub counters: OpCounters,
}

impl ExplorationReport {
    fn from_outcomes(outcomes: Vec<DesignOutcome>, elapsed: Duration) -> Self {
        let successes = outcomes.iter().filter(|o| o.is_success()).count();
        let mut counters = OpCounters::default();
        for outcome in &outcomes {
            counters += outcome.counters;
        }
        Self {
            failures: outcomes.len() - successes,
            successes,
            outcomes,
            counters,
            elapsed,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.successes as f64 / self.total() as f64
        }
    }

    pub fn summary(&self) -> ExplorationSummary {
        ExplorationSummary {
            total: self.total(),
            successes: self.successes,
            failures: self.failures,
            success_rate: self.success_rate(),
            elapsed_ms: self.elapsed.as_secs_f64() * 1e3,
            counters: self.counters,
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out =
            String::from("index,sensors,success,errors,compositions,eliminations,elapsed_us\n");
        for o in &self.outcomes {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                o.index,
                o.sensors.join(";"),
                o.is_success(),
                o.errors.len(),
                o.counters.compositions,
                o.counters.eliminations,
                o.elapsed.as_micros()
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(path, out).map_err(|e| Error::io(path, e))
    }

    pub fn write_summary_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.summary())
            .map_err(|e| Error::InvalidInput(format!("serialize summary: {e}")))?;
        fs::write(path, text).map_err(|e| Error::io(path, e))
    }
}

/// Run every design the options select, in enumeration order.
pub fn explore(
    library: &SensorLibrary,
    processors: &Processors,
    options: &ExploreOptions,
) -> Result<ExplorationReport> {
    let names = library.names();
    let k = SENSOR_SLOTS.len();
    if names.len() < k {
        return Err(Error::InvalidInput(format!(
            "need at least {k} sensors, library has {}",
            names.len()
        )));
    }
    let available = design_count(names.len(), k, options.enumeration);
    let planned = options
        .limit
        .map_or(available, |limit| available.min(limit as u128));
    info!(
        target: "explore",
        "exploring {planned} of {available} designs ({:?}, {} jobs)",
        options.enumeration,
        options.jobs.max(1)
    );

    let started = Instant::now();
    let designs = enumerate(names.len(), k, options.enumeration)
        .take(options.limit.unwrap_or(usize::MAX))
        .enumerate();
    let outcomes = if options.jobs <= 1 {
        designs
            .map(|(index, combo)| {
                let combo: Vec<&str> = combo.iter().map(|&i| names[i]).collect();
                explore_combination(index, &combo, library, processors, &options.design)
            })
            .collect()
    } else {
        explore_parallel(designs, &names, library, processors, options)?
    };

    let report = ExplorationReport::from_outcomes(outcomes, started.elapsed());
    info!(
        target: "explore",
        "{} designs: {} succeeded, {} failed in {:.2?}",
        report.total(),
        report.successes,
        report.failures,
        report.elapsed
    );
    Ok(report)
}

fn explore_parallel(
    designs: impl Iterator<Item = (usize, Vec<usize>)> + Send,
    names: &[&str],
    library: &SensorLibrary,
    processors: &Processors,
    options: &ExploreOptions,
) -> Result<Vec<DesignOutcome>> {
    let jobs = options.jobs;
    thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<(usize, Vec<usize>)>(jobs * 4);
        let (result_tx, result_rx) = bounded::<DesignOutcome>(jobs * 4);

        for worker in 0..jobs {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("explore-{worker}"))
                .spawn_scoped(scope, move || {
                    for (index, combo) in job_rx {
                        let combo: Vec<&str> = combo.iter().map(|&i| names[i]).collect();
                        let outcome =
                            explore_combination(index, &combo, library, processors, &options.design);
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| Error::Worker(format!("spawn explore-{worker}: {e}")))?;
        }
        drop(job_rx);
        drop(result_tx);

        thread::Builder::new()
            .name("explore-feed".to_string())
            .spawn_scoped(scope, move || {
                for job in designs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| Error::Worker(format!("spawn explore-feed: {e}")))?;

        let mut outcomes: Vec<DesignOutcome> = Vec::new();
        for outcome in result_rx {
            if (outcome.index + 1) % 100 == 0 {
                debug!(target: "explore", "{} designs done", outcome.index + 1);
            }
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|o| o.index);
        Ok(outcomes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<_> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(3, 4).count(), 0);
        assert_eq!(Combinations::new(3, 0).count(), 1);
    }

    #[test]
    fn permutations_cover_all_ordered_tuples() {
        let all: Vec<_> = Permutations::new(4, 2).collect();
        assert_eq!(all.len(), 12);
        assert_eq!(&all[..2], &[vec![0, 1], vec![1, 0]]);
        let mut dedup = all.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 12);
    }

    #[test]
    fn counts_match_iterators() {
        for (n, k) in [(12, 4), (6, 4), (5, 5), (3, 4)] {
            assert_eq!(
                design_count(n, k, Enumeration::Combinations),
                Combinations::new(n, k).count() as u128
            );
            assert_eq!(
                design_count(n, k, Enumeration::Permutations),
                Permutations::new(n, k).count() as u128
            );
        }
        assert_eq!(design_count(12, 4, Enumeration::Combinations), 495);
        assert_eq!(design_count(12, 4, Enumeration::Permutations), 11_880);
    }
}
