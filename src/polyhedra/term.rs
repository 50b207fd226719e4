// polyhedra/term.rs
// Linear inequality `Σ cᵢ·vᵢ <= b` over named real variables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Relative tolerance: a coefficient this small next to the term's largest
/// one counts as zero, as does a constant this far below zero's magnitude.
pub const EPS: f64 = 1e-9;

/// Named real-valued variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Var {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Var {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One half-space `Σ cᵢ·vᵢ <= constant`.
///
/// Coefficients are kept in variable order and zero entries are never
/// stored, so two terms over the same variables compare structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    coefficients: BTreeMap<Var, f64>,
    constant: f64,
}

impl Term {
    /// Build a term, summing repeated variables and dropping zeros.
    ///
    /// A sum is zero when it cancels to within `EPS` of the magnitudes that
    /// fed it, or when it is within `EPS` of the largest coefficient. Scale
    /// alone never drops a coefficient.
    pub fn new(coefficients: impl IntoIterator<Item = (Var, f64)>, constant: f64) -> Self {
        // var -> (sum, sum of magnitudes)
        let mut sums: BTreeMap<Var, (f64, f64)> = BTreeMap::new();
        for (var, coeff) in coefficients {
            let entry = sums.entry(var).or_insert((0.0, 0.0));
            entry.0 += coeff;
            entry.1 += coeff.abs();
        }
        sums.retain(|_, (sum, magnitude)| sum.abs() > EPS * *magnitude);
        let max_abs = sums.values().fold(0.0f64, |acc, (sum, _)| acc.max(sum.abs()));
        let coefficients = sums
            .into_iter()
            .filter(|(_, (sum, _))| sum.abs() > EPS * max_abs)
            .map(|(var, (sum, _))| (var, sum))
            .collect();
        Self {
            coefficients,
            constant,
        }
    }

    /// `var <= bound`
    pub fn upper(var: impl Into<Var>, bound: f64) -> Self {
        Self::new([(var.into(), 1.0)], bound)
    }

    /// `var >= bound`, stored as `-var <= -bound`.
    pub fn lower(var: impl Into<Var>, bound: f64) -> Self {
        Self::new([(var.into(), -1.0)], -bound)
    }

    pub fn coefficients(&self) -> &BTreeMap<Var, f64> {
        &self.coefficients
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.coefficients.keys()
    }

    pub fn coefficient(&self, var: &Var) -> f64 {
        self.coefficients.get(var).copied().unwrap_or(0.0)
    }

    pub fn contains_var(&self, var: &Var) -> bool {
        self.coefficients.contains_key(var)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// `0 <= b` with `b >= 0`: always true.
    pub fn is_tautology(&self) -> bool {
        self.is_constant() && self.constant >= -EPS
    }

    /// `0 <= b` with `b < 0`: never true.
    pub fn is_contradiction(&self) -> bool {
        self.is_constant() && self.constant < -EPS
    }

    /// Sum of absolute coefficient values.
    pub fn coefficient_mass(&self) -> f64 {
        self.coefficients.values().map(|c| c.abs()).sum()
    }

    /// Multiply both sides by a positive factor.
    pub fn scaled(&self, factor: f64) -> Self {
        debug_assert!(factor > 0.0, "scaling an inequality by {factor} flips or erases it");
        Self::new(
            self.coefficients
                .iter()
                .map(|(v, c)| (v.clone(), c * factor)),
            self.constant * factor,
        )
    }

    /// Scale so the largest coefficient magnitude is 1.
    pub fn normalized(&self) -> Self {
        let max = self
            .coefficients
            .values()
            .fold(0.0f64, |acc, c| acc.max(c.abs()));
        if max > 0.0 {
            self.scaled(1.0 / max)
        } else {
            self.clone()
        }
    }

    /// `self + factor·other`; callers keep `factor` positive unless they
    /// are cancelling a variable with an equal-signed bound.
    pub(crate) fn add_scaled(&self, other: &Term, factor: f64) -> Self {
        let merged = self
            .coefficients
            .iter()
            .map(|(v, c)| (v.clone(), *c))
            .chain(other.coefficients.iter().map(|(v, c)| (v.clone(), c * factor)));
        Self::new(merged, self.constant + factor * other.constant)
    }

    pub(crate) fn without(mut self, var: &Var) -> Self {
        self.coefficients.remove(var);
        self
    }

    /// True when both terms describe parallel half-spaces facing the same way.
    pub(crate) fn same_direction(&self, other: &Term) -> bool {
        if self.coefficients.len() != other.coefficients.len() {
            return false;
        }
        let a = self.normalized();
        let b = other.normalized();
        a.coefficients
            .iter()
            .zip(b.coefficients.iter())
            .all(|((va, ca), (vb, cb))| va == vb && (ca - cb).abs() <= 1e-9)
    }

    /// Constant after normalization; comparable across `same_direction` terms.
    pub(crate) fn normalized_constant(&self) -> f64 {
        self.normalized().constant
    }

    /// Replace `var` using the bound on it expressed by `bound`.
    ///
    /// For `self: a·v + c·x <= b` and `bound: k·v + d·x <= e` with `a` and
    /// `k` of equal sign, `(c − r·d)·x <= b − r·e` (`r = a/k`) is a sufficient
    /// condition for `self` whenever `bound` holds. Returns `None` when the
    /// signs disagree or either side lacks `var`.
    pub fn substitute_bound(&self, var: &Var, bound: &Term) -> Option<Self> {
        let a = self.coefficient(var);
        let k = bound.coefficient(var);
        if a == 0.0 || k == 0.0 || a.signum() != k.signum() {
            return None;
        }
        let ratio = a / k;
        Some(self.add_scaled(bound, -ratio).without(var))
    }
}

pub(crate) fn format_number(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    let abs = x.abs();
    if !(1e-4..1e9).contains(&abs) {
        return format!("{x:e}");
    }
    let mut s = format!("{x:.9}");
    while s.contains('.') && s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficients.is_empty() {
            f.write_str("0")?;
        }
        for (i, (var, coeff)) in self.coefficients.iter().enumerate() {
            let magnitude = coeff.abs();
            let negative = *coeff < 0.0;
            match (i, negative) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            if (magnitude - 1.0).abs() > 1e-12 {
                write!(f, "{} ", format_number(magnitude))?;
            }
            write!(f, "{var}")?;
        }
        write!(f, " <= {}", format_number(self.constant))
    }
}
