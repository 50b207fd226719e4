//! Per-thread counters for contract-algebra operations.
//!
//! The exploration loop resets the counters before each design and takes a
//! snapshot afterwards, so every [`crate::design::DesignOutcome`] records how
//! much algebra its composition chain needed. Worker threads each own their
//! counters.

use std::cell::Cell;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Composition,
    Merge,
    Refinement,
    Elimination,
    FeasibilityCheck,
    Abduction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCounters {
    pub compositions: u64,
    pub merges: u64,
    pub refinements: u64,
    pub eliminations: u64,
    pub feasibility_checks: u64,
    pub abductions: u64,
}

impl OpCounters {
    fn bump(&mut self, op: Op) {
        let slot = match op {
            Op::Composition => &mut self.compositions,
            Op::Merge => &mut self.merges,
            Op::Refinement => &mut self.refinements,
            Op::Elimination => &mut self.eliminations,
            Op::FeasibilityCheck => &mut self.feasibility_checks,
            Op::Abduction => &mut self.abductions,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        self.compositions
            + self.merges
            + self.refinements
            + self.eliminations
            + self.feasibility_checks
            + self.abductions
    }
}

impl AddAssign for OpCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.compositions += rhs.compositions;
        self.merges += rhs.merges;
        self.refinements += rhs.refinements;
        self.eliminations += rhs.eliminations;
        self.feasibility_checks += rhs.feasibility_checks;
        self.abductions += rhs.abductions;
    }
}

thread_local! {
    static COUNTERS: Cell<OpCounters> = Cell::new(OpCounters::default());
}

pub fn record(op: Op) {
    COUNTERS.with(|cell| {
        let mut counters = cell.get();
        counters.bump(op);
        cell.set(counters);
    });
}

pub fn snapshot() -> OpCounters {
    COUNTERS.with(Cell::get)
}

pub fn reset() {
    COUNTERS.with(|cell| cell.set(OpCounters::default()));
}

/// Snapshot and reset in one step.
pub fn take() -> OpCounters {
    COUNTERS.with(|cell| cell.replace(OpCounters::default()))
}
