//! Assume/guarantee contracts with input/output
//! variable roles.
//!
//! Composition follows the usual IO-contract algebra: variables produced by
//! one operand and consumed by the other become internal. The consumer's
//! assumptions on them are abduced from the producer's guarantees and the
//! internal variables are projected out of the combined guarantees.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ContractError;
use super::term::{Term, Var};
use super::term_list::TermList;
use crate::error::{Error, Result};
use crate::instrumentation::{self, Op};

/// Tolerance used by [`IoContract::remove_quantization_errors`] by default.
pub const QUANTIZATION_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct IoContract {
    inputs: Vec<Var>,
    outputs: Vec<Var>,
    assumptions: TermList,
    guarantees: TermList,
}

fn union(a: &[Var], b: &[Var]) -> Vec<Var> {
    let mut out = a.to_vec();
    for v in b {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn intersection(a: &[Var], b: &[Var]) -> Vec<Var> {
    a.iter().filter(|v| b.contains(v)).cloned().collect()
}

impl IoContract {
    /// Build a contract, checking variable roles: inputs and outputs are
    /// disjoint, assumptions only mention inputs, guarantees only mention
    /// declared variables.
    pub fn new(
        inputs: Vec<Var>,
        outputs: Vec<Var>,
        assumptions: TermList,
        guarantees: TermList,
    ) -> std::result::Result<Self, ContractError> {
        let both = intersection(&inputs, &outputs);
        if !both.is_empty() {
            return Err(ContractError::Invalid(format!(
                "variables {} are both inputs and outputs",
                both.iter().map(Var::name).collect::<Vec<_>>().join(", ")
            )));
        }
        if let Some(v) = assumptions.vars().into_iter().find(|v| !inputs.contains(v)) {
            return Err(ContractError::Invalid(format!(
                "assumptions mention non-input variable {v}"
            )));
        }
        if let Some(v) = guarantees
            .vars()
            .into_iter()
            .find(|v| !inputs.contains(v) && !outputs.contains(v))
        {
            return Err(ContractError::Invalid(format!(
                "guarantees mention undeclared variable {v}"
            )));
        }
        Ok(Self {
            inputs,
            outputs,
            assumptions,
            guarantees,
        })
    }

    /// Build a contract from constraint strings, e.g.
    /// `IoContract::from_strings(&["u"], &["y"], &["u >= 1"], &["y >= 0.5"])`.
    pub fn from_strings<S: AsRef<str>>(
        inputs: &[S],
        outputs: &[S],
        assumptions: &[S],
        guarantees: &[S],
    ) -> std::result::Result<Self, ContractError> {
        Self::new(
            inputs.iter().map(|s| Var::new(s.as_ref())).collect(),
            outputs.iter().map(|s| Var::new(s.as_ref())).collect(),
            TermList::parse(assumptions)?,
            TermList::parse(guarantees)?,
        )
    }

    pub fn inputs(&self) -> &[Var] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Var] {
        &self.outputs
    }

    pub fn assumptions(&self) -> &TermList {
        &self.assumptions
    }

    pub fn guarantees(&self) -> &TermList {
        &self.guarantees
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|v| v.name() == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|v| v.name() == name)
    }

    /// The assumptions admit at least one input valuation.
    pub fn is_compatible(&self) -> bool {
        self.assumptions.is_feasible()
    }

    /// Some behavior satisfies assumptions and guarantees together.
    pub fn is_consistent(&self) -> bool {
        self.assumptions.conjoin(&self.guarantees).is_feasible()
    }

    /// Compose, hiding every internal variable.
    pub fn compose(&self, other: &IoContract) -> std::result::Result<IoContract, ContractError> {
        self.compose_keeping(other, &[])
    }

    /// Compose, keeping the listed internal variables visible as outputs.
    pub fn compose_keeping(
        &self,
        other: &IoContract,
        keep: &[Var],
    ) -> std::result::Result<IoContract, ContractError> {
        instrumentation::record(Op::Composition);

        let overlap = intersection(&self.outputs, &other.outputs);
        if !overlap.is_empty() {
            return Err(ContractError::OverlappingOutputs(overlap));
        }
        let forward = intersection(&self.outputs, &other.inputs);
        let backward = intersection(&other.outputs, &self.inputs);
        if !forward.is_empty() && !backward.is_empty() {
            return Err(ContractError::Cyclic { forward, backward });
        }

        let internal: BTreeSet<Var> = forward.iter().chain(backward.iter()).cloned().collect();
        let hidden: BTreeSet<Var> = internal
            .iter()
            .filter(|v| !keep.contains(v))
            .cloned()
            .collect();

        let inputs: Vec<Var> = union(&self.inputs, &other.inputs)
            .into_iter()
            .filter(|v| !internal.contains(v))
            .collect();
        let outputs: Vec<Var> = union(&self.outputs, &other.outputs)
            .into_iter()
            .filter(|v| !hidden.contains(v))
            .collect();

        let link = if !forward.is_empty() {
            Some((self, other))
        } else if !backward.is_empty() {
            Some((other, self))
        } else {
            None
        };
        let assumptions = match link {
            Some((upstream, downstream)) => {
                // every upstream output, consumed or not, must leave the
                // abduced assumptions
                let produced: BTreeSet<Var> = upstream.outputs.iter().cloned().collect();
                let context = upstream.assumptions.conjoin(&upstream.guarantees);
                let abduced = downstream
                    .assumptions
                    .abduce_with_context(&context, &produced)?;
                upstream.assumptions.conjoin(&abduced)
            }
            None => self.assumptions.conjoin(&other.assumptions),
        };
        if !assumptions.is_feasible() {
            return Err(ContractError::IncompatibleAssumptions {
                assumptions: assumptions.to_string(),
            });
        }
        let assumptions = assumptions.simplify();

        let guarantees = self
            .guarantees
            .conjoin(&other.guarantees)
            .project_out(&hidden)
            .simplify_under(&assumptions);

        IoContract::new(inputs, outputs, assumptions, guarantees)
    }

    /// Conjoin two views of the same component.
    pub fn merge(&self, other: &IoContract) -> std::result::Result<IoContract, ContractError> {
        instrumentation::record(Op::Merge);
        let inputs = union(&self.inputs, &other.inputs);
        let outputs = union(&self.outputs, &other.outputs);
        let assumptions = self.assumptions.conjoin(&other.assumptions);
        if !assumptions.is_feasible() {
            return Err(ContractError::IncompatibleAssumptions {
                assumptions: assumptions.to_string(),
            });
        }
        let guarantees = self
            .guarantees
            .conjoin(&other.guarantees)
            .simplify_under(&assumptions);
        IoContract::new(inputs, outputs, assumptions.simplify(), guarantees)
    }

    /// `self` can replace `other`: it assumes no more and guarantees no less
    /// wherever `other`'s assumptions hold.
    pub fn refines(&self, other: &IoContract) -> bool {
        instrumentation::record(Op::Refinement);
        other.assumptions.implies_all(&self.assumptions)
            && self
                .guarantees
                .conjoin(&other.assumptions)
                .implies_all(&other.guarantees)
    }

    pub fn remove_quantization_errors(&self, tolerance: f64) -> IoContract {
        IoContract {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            assumptions: self.assumptions.remove_small_terms(tolerance),
            guarantees: self.guarantees.remove_small_terms(tolerance),
        }
    }

    pub fn to_record(&self) -> ContractRecord {
        ContractRecord {
            input_vars: self.inputs.iter().map(|v| v.name().to_string()).collect(),
            output_vars: self.outputs.iter().map(|v| v.name().to_string()).collect(),
            assumptions: self.assumptions.terms().to_vec(),
            guarantees: self.guarantees.terms().to_vec(),
        }
    }
}

impl fmt::Display for IoContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |vars: &[Var]| {
            vars.iter()
                .map(Var::name)
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "InVars: [{}]", names(&self.inputs))?;
        writeln!(f, "OutVars: [{}]", names(&self.outputs))?;
        writeln!(f, "A: [")?;
        for term in &self.assumptions {
            writeln!(f, "  {term}")?;
        }
        writeln!(f, "]")?;
        writeln!(f, "G: [")?;
        for term in &self.guarantees {
            writeln!(f, "  {term}")?;
        }
        write!(f, "]")
    }
}

/// Serialized form of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub input_vars: Vec<String>,
    pub output_vars: Vec<String>,
    pub assumptions: Vec<Term>,
    pub guarantees: Vec<Term>,
}

impl TryFrom<ContractRecord> for IoContract {
    type Error = ContractError;

    fn try_from(record: ContractRecord) -> std::result::Result<Self, Self::Error> {
        IoContract::new(
            record.input_vars.into_iter().map(Var::from).collect(),
            record.output_vars.into_iter().map(Var::from).collect(),
            TermList::from_terms(record.assumptions),
            TermList::from_terms(record.guarantees),
        )
    }
}

/// Write named contracts as one JSON object `{ name: record, ... }`.
pub fn write_contracts_to_file(path: &Path, contracts: &[(String, IoContract)]) -> Result<()> {
    let records: BTreeMap<&str, ContractRecord> = contracts
        .iter()
        .map(|(name, c)| (name.as_str(), c.to_record()))
        .collect();
    let text = serde_json::to_string_pretty(&records)
        .map_err(|e| Error::InvalidInput(format!("serialize contracts: {e}")))?;
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

pub fn read_contracts_from_file(path: &Path) -> Result<BTreeMap<String, IoContract>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let records: BTreeMap<String, ContractRecord> = serde_json::from_str(&text)
        .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
    records
        .into_iter()
        .map(|(name, record)| Ok((name, IoContract::try_from(record)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(input: &str, output: &str, k: f64, floor: f64) -> IoContract {
        IoContract::from_strings(
            &[input],
            &[output],
            &[format!("{input} >= {k}").as_str()],
            &[format!("{output} >= {floor}").as_str()],
        )
        .unwrap()
    }

    fn stage(floor1: f64, floor2: f64) -> IoContract {
        IoContract::from_strings(
            &["x1", "x2"],
            &["y1"],
            &[
                format!("x1 >= {floor1}").as_str(),
                format!("x2 >= {floor2}").as_str(),
            ],
            &["y1 >= 2.05"],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_bad_roles() {
        let err = IoContract::from_strings(&["u"], &["u"], &[], &[]).unwrap_err();
        assert!(matches!(err, ContractError::Invalid(_)));
        let err = IoContract::from_strings(&["u"], &["y"], &["y >= 0"], &[]).unwrap_err();
        assert!(matches!(err, ContractError::Invalid(_)));
        let err = IoContract::from_strings(&["u"], &["y"], &[], &["z >= 0"]).unwrap_err();
        assert!(matches!(err, ContractError::Invalid(_)));
    }

    #[test]
    fn parallel_composition_conjoins() {
        let s1 = sensor("IPTG", "x1", 1.0, 0.3);
        let s2 = sensor("aTc", "x2", 0.5, 0.2);
        let both = s2.compose(&s1).unwrap();
        assert!(both.has_input("IPTG") && both.has_input("aTc"));
        assert!(both.has_output("x1") && both.has_output("x2"));
        assert_eq!(both.assumptions().len(), 2);
        assert_eq!(both.guarantees().len(), 2);
    }

    #[test]
    fn serial_composition_hides_internal_vars() {
        let sensors = sensor("aTc", "x2", 0.5, 0.2)
            .compose(&sensor("IPTG", "x1", 1.0, 0.3))
            .unwrap();
        let sub = sensors.compose(&stage(0.02, 0.01)).unwrap();
        assert_eq!(sub.outputs(), &[Var::new("y1")]);
        assert!(sub.has_input("IPTG") && sub.has_input("aTc"));
        assert!(!sub.has_input("x1"));
        assert!(sub.guarantees().implies(&Term::lower("y1", 2.05)));
        assert!(sub.assumptions().vars().iter().all(|v| v.name() != "x1"));
    }

    #[test]
    fn composition_order_does_not_matter() {
        let sensors = sensor("aTc", "x2", 0.5, 0.2)
            .compose(&sensor("IPTG", "x1", 1.0, 0.3))
            .unwrap();
        let a = sensors.compose(&stage(0.02, 0.01)).unwrap();
        let b = stage(0.02, 0.01).compose(&sensors).unwrap();
        assert!(a.refines(&b) && b.refines(&a));
    }

    #[test]
    fn unmet_assumption_fails_composition() {
        let sensors = sensor("aTc", "x2", 0.5, 0.005)
            .compose(&sensor("IPTG", "x1", 1.0, 0.3))
            .unwrap();
        let err = sensors.compose(&stage(0.02, 0.01)).unwrap_err();
        assert!(matches!(err, ContractError::Unsatisfiable { .. }), "{err}");
    }

    #[test]
    fn overlapping_outputs_and_cycles_are_rejected() {
        let a = sensor("u", "x1", 1.0, 0.3);
        let b = sensor("v", "x1", 1.0, 0.3);
        assert!(matches!(
            a.compose(&b),
            Err(ContractError::OverlappingOutputs(_))
        ));

        let f = IoContract::from_strings(&["p"], &["q"], &[], &["q >= p"]).unwrap();
        let g = IoContract::from_strings(&["q"], &["p"], &[], &["p >= q"]).unwrap();
        assert!(matches!(f.compose(&g), Err(ContractError::Cyclic { .. })));
    }

    #[test]
    fn input_dependent_guarantee_propagates_requirement() {
        // sensor: u in [1, 10] gives y >= 0.1u ; stage needs y >= 0.5
        let s = IoContract::from_strings(
            &["u"],
            &["y"],
            &["u >= 1", "u <= 10"],
            &["y >= 0.1 u"],
        )
        .unwrap();
        let p = IoContract::from_strings(&["y"], &["z"], &["y >= 0.5"], &["z >= 1"]).unwrap();
        let c = s.compose(&p).unwrap();
        // the composite must now demand u >= 5
        assert!(c.assumptions().implies(&Term::lower("u", 5.0)));
        assert!(!c.assumptions().implies(&Term::lower("u", 5.1)));
    }

    #[test]
    fn unconsumed_upstream_output_stays_out_of_assumptions() {
        // a: u -> (x, z) with x >= z >= u; b reads only x and needs x >= 1
        let a = IoContract::from_strings(&["u"], &["x", "z"], &[], &["x - z >= 0", "z - u >= 0"])
            .unwrap();
        let b = IoContract::from_strings(&["x"], &["y"], &["x >= 1"], &["y >= 0"]).unwrap();
        let c = a.compose(&b).unwrap();
        assert_eq!(c.inputs(), &[Var::new("u")]);
        assert!(c.has_output("z") && c.has_output("y"));
        assert!(c.assumptions().implies(&Term::lower("u", 1.0)));
        assert!(!c.assumptions().implies(&Term::lower("u", 1.1)));
        assert!(b.compose(&a).unwrap().refines(&c));
    }

    #[test]
    fn compose_keeping_exposes_internal_output() {
        let s = sensor("IPTG", "x1", 1.0, 0.3);
        let p = IoContract::from_strings(&["x1"], &["y"], &["x1 >= 0.1"], &["y >= x1"]).unwrap();
        let c = s.compose_keeping(&p, &[Var::new("x1")]).unwrap();
        assert!(c.has_output("x1") && c.has_output("y"));
        assert!(c.guarantees().implies(&Term::lower("y", 0.3)));
    }

    #[test]
    fn merge_and_refinement() {
        let loose = IoContract::from_strings(&["u"], &["y"], &["u >= 1"], &["y >= 0"]).unwrap();
        let tight = IoContract::from_strings(&["u"], &["y"], &["u >= 0"], &["y >= 1"]).unwrap();
        assert!(tight.refines(&loose));
        assert!(!loose.refines(&tight));

        let upper = IoContract::from_strings(&["u"], &["y"], &["u >= 1"], &["y <= 5"]).unwrap();
        let merged = loose.merge(&upper).unwrap();
        assert!(merged.guarantees().implies(&Term::upper("y", 5.0)));
        assert!(merged.guarantees().implies(&Term::lower("y", 0.0)));
        assert!(merged.is_consistent());

        let disjoint = IoContract::from_strings(&["u"], &["y"], &["u <= 0"], &[]).unwrap();
        assert!(loose.merge(&disjoint).is_err());
    }

    #[test]
    fn quantization_cleanup() {
        let c = IoContract::new(
            vec![Var::new("u")],
            vec![Var::new("y")],
            TermList::new(),
            TermList::from_terms([
                Term::new([(Var::new("u"), 1e-7), (Var::new("y"), -1e-7)], 1.0),
                Term::lower("y", 0.5),
            ]),
        )
        .unwrap();
        let cleaned = c.remove_quantization_errors(QUANTIZATION_TOLERANCE);
        assert_eq!(cleaned.guarantees().len(), 1);
    }

    #[test]
    fn contract_file_round_trip() {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "sensor_contracts_contract_file_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let c = sensor("IPTG", "x1", 1.0, 0.3);
        write_contracts_to_file(&path, &[("contract_0".to_string(), c.clone())]).unwrap();
        let back = read_contracts_from_file(&path).unwrap();
        assert_eq!(back.get("contract_0"), Some(&c));
        let _ = fs::remove_file(&path);
    }
}
