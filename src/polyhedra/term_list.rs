//! Conjunctions of linear inequalities.
//!
//! Projection is plain Fourier–Motzkin with per-step normalization and
//! parallel-term dedup. Problems here are small (a few variables, tens of
//! terms), so no LP solver is involved: feasibility, suprema and implication
//! all reduce to projections.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ContractError, ParseError};
use super::parse::parse_constraints;
use super::term::{EPS, Term, Var};
use crate::instrumentation::{self, Op};

/// Supremum of a linear objective over a polyhedron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// The polyhedron is empty.
    Empty,
    Unbounded,
    Finite(f64),
}

/// Conjunction of [`Term`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermList {
    terms: Vec<Term>,
}

fn implication_slack(constant: f64) -> f64 {
    EPS * (1.0 + constant.abs())
}

impl TermList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut list = Self::new();
        for term in terms {
            list.push(term);
        }
        list
    }

    pub fn parse<S: AsRef<str>>(constraints: &[S]) -> Result<Self, ParseError> {
        Ok(Self::from_terms(parse_constraints(constraints)?))
    }

    /// Add a term. Tautologies are dropped; a term parallel to an existing
    /// one keeps only the tighter of the two.
    pub fn push(&mut self, term: Term) {
        if term.is_tautology() {
            return;
        }
        let constant = term.normalized_constant();
        if let Some(existing) = self.terms.iter_mut().find(|t| t.same_direction(&term)) {
            if constant < existing.normalized_constant() {
                *existing = term;
            }
            return;
        }
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn vars(&self) -> BTreeSet<Var> {
        self.terms
            .iter()
            .flat_map(|t| t.vars().cloned())
            .collect()
    }

    /// Both lists at once.
    pub fn conjoin(&self, other: &TermList) -> TermList {
        let mut out = self.clone();
        for term in &other.terms {
            out.push(term.clone());
        }
        out
    }

    pub fn contains_contradiction(&self) -> bool {
        self.terms.iter().any(Term::is_contradiction)
    }

    /// Project `var` out by pairing every upper bound with every lower bound.
    pub fn eliminate(&self, var: &Var) -> TermList {
        instrumentation::record(Op::Elimination);
        let mut out = TermList::new();
        let mut pos = Vec::new();
        let mut neg = Vec::new();
        for term in &self.terms {
            if !term.contains_var(var) {
                out.push(term.clone());
                continue;
            }
            // unit scale keeps the combined constants comparable to EPS
            let term = term.normalized();
            let c = term.coefficient(var);
            if c > 0.0 {
                pos.push((term, c));
            } else {
                neg.push((term, -c));
            }
        }
        for (p, cp) in &pos {
            for (n, cn) in &neg {
                let combined = p.scaled(*cn).add_scaled(n, *cp).without(var);
                out.push(combined.normalized());
            }
        }
        out
    }

    pub fn project_out<'a>(&self, vars: impl IntoIterator<Item = &'a Var>) -> TermList {
        let mut current = self.clone();
        for var in vars {
            if current.terms.iter().any(|t| t.contains_var(var)) {
                current = current.eliminate(var);
            }
        }
        current
    }

    /// Alias of [`TermList::project_out`] named after the guarantee side of
    /// composition.
    pub fn deduce(&self, forbidden: &BTreeSet<Var>) -> TermList {
        self.project_out(forbidden)
    }

    pub fn is_feasible(&self) -> bool {
        instrumentation::record(Op::FeasibilityCheck);
        let mut current = self.clone();
        for var in self.vars() {
            if current.contains_contradiction() {
                return false;
            }
            current = current.eliminate(&var);
        }
        !current.contains_contradiction()
    }

    /// Maximum of `Σ objective[v]·v` over the polyhedron.
    pub fn supremum(&self, objective: &BTreeMap<Var, f64>) -> Bound {
        let vars = self.vars();
        let mut aux = Var::new("__sup");
        while vars.contains(&aux) || objective.contains_key(&aux) {
            aux = Var::new(format!("{}_", aux.name()));
        }

        let mut system = self.clone();
        let obj = objective.iter().map(|(v, c)| (v.clone(), *c));
        system.push(Term::new(
            obj.clone()
                .map(|(v, c)| (v, -c))
                .chain(std::iter::once((aux.clone(), 1.0))),
            0.0,
        ));
        system.push(Term::new(
            obj.chain(std::iter::once((aux.clone(), -1.0))),
            0.0,
        ));

        let others: Vec<Var> = system.vars().into_iter().filter(|v| *v != aux).collect();
        let projected = system.project_out(&others);
        if projected.contains_contradiction() {
            return Bound::Empty;
        }
        projected
            .terms
            .iter()
            .filter_map(|t| {
                let a = t.coefficient(&aux);
                (a > 0.0).then(|| t.constant() / a)
            })
            .reduce(f64::min)
            .map_or(Bound::Unbounded, Bound::Finite)
    }

    /// Every point of the polyhedron satisfies `term`.
    pub fn implies(&self, term: &Term) -> bool {
        if term.is_tautology() {
            return true;
        }
        if term.is_constant() {
            return !self.is_feasible();
        }
        let target = term.normalized_constant();
        if self
            .terms
            .iter()
            .any(|t| t.same_direction(term) && t.normalized_constant() <= target + implication_slack(target))
        {
            return true;
        }
        match self.supremum(term.coefficients()) {
            Bound::Empty => true,
            Bound::Unbounded => false,
            Bound::Finite(sup) => sup <= term.constant() + implication_slack(term.constant()),
        }
    }

    pub fn implies_all(&self, other: &TermList) -> bool {
        other.terms.iter().all(|t| self.implies(t))
    }

    /// Drop terms implied by the remaining ones. Empty polyhedra are
    /// returned unchanged so the contradiction stays visible.
    pub fn simplify(&self) -> TermList {
        self.simplify_under(&TermList::new())
    }

    /// Drop terms implied by `context` together with the remaining terms.
    pub fn simplify_under(&self, context: &TermList) -> TermList {
        if !self.conjoin(context).is_feasible() {
            return self.clone();
        }
        let mut kept = self.terms.clone();
        let mut i = 0usize;
        while i < kept.len() {
            let rest = TermList::from_terms(
                kept.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, t)| t.clone()),
            )
            .conjoin(context);
            if rest.implies(&kept[i]) {
                kept.remove(i);
            } else {
                i += 1;
            }
        }
        TermList { terms: kept }
    }

    /// Rewrite every term mentioning a forbidden variable into a sufficient
    /// condition over the allowed variables, using bounds from `context`.
    ///
    /// Bounds come from the context projected onto the allowed variables
    /// plus the one being replaced, so chains through other forbidden
    /// variables are followed. When several bounds qualify, the one that
    /// turns the term into a tautology, or else leaves the fewest variables,
    /// wins.
    pub fn abduce_with_context(
        &self,
        context: &TermList,
        forbidden: &BTreeSet<Var>,
    ) -> Result<TermList, ContractError> {
        instrumentation::record(Op::Abduction);
        let mut out = TermList::new();
        let mut bounds_cache: BTreeMap<Var, TermList> = BTreeMap::new();

        for term in &self.terms {
            let mut current = term.clone();
            loop {
                let next = current.vars().find(|v| forbidden.contains(*v)).cloned();
                let Some(var) = next else { break };
                let bounds = bounds_cache.entry(var.clone()).or_insert_with(|| {
                    context.project_out(forbidden.iter().filter(|v| **v != var))
                });
                let best = bounds
                    .iter()
                    .filter_map(|bound| current.substitute_bound(&var, bound))
                    .min_by(|a, b| {
                        let key = |t: &Term| (!t.is_tautology(), t.coefficients().len());
                        key(a)
                            .cmp(&key(b))
                            .then(b.constant().total_cmp(&a.constant()))
                    });
                current = best.ok_or_else(|| ContractError::Abduction {
                    term: term.to_string(),
                    var: var.clone(),
                })?;
            }
            if current.is_contradiction() {
                return Err(ContractError::Unsatisfiable {
                    term: term.to_string(),
                });
            }
            out.push(current);
        }
        Ok(out)
    }

    /// Drop terms whose coefficient mass is below `tolerance`; these are
    /// rounding residue from projection.
    pub fn remove_small_terms(&self, tolerance: f64) -> TermList {
        TermList {
            terms: self
                .terms
                .iter()
                .filter(|t| t.coefficient_mass() >= tolerance)
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for TermList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("true");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{term}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TermList {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

impl FromIterator<Term> for TermList {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Self::from_terms(iter)
    }
}
