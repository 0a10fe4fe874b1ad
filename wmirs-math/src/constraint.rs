//! Linear constraints and Fourier-Motzkin elimination.
//!
//! A [`LinearConstraint`] is `sum coeffs[i] * x_i (<= | <) bound` over a
//! dense variable domain. [`ConstraintSet`] answers feasibility questions
//! and projects exact per-variable bounds by eliminating variables pairwise:
//! for every lower bound `L` and upper bound `U` on the pivot, the
//! combination `L <= U` survives with the pivot removed. Combining a strict
//! with a non-strict bound yields a strict one.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::fmt;

use crate::error::{MathError, Result};

/// Hard ceiling on intermediate rows during elimination.
const MAX_ROWS: usize = 100_000;

/// A half-space `sum coeffs[i] * x_i (<= | <) bound`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinearConstraint {
    /// Dense coefficient vector over the variable domain.
    pub coeffs: Vec<BigRational>,
    /// Right-hand side constant.
    pub bound: BigRational,
    /// True for `<`, false for `<=`.
    pub strict: bool,
}

impl LinearConstraint {
    /// Create a constraint.
    #[must_use]
    pub fn new(coeffs: Vec<BigRational>, bound: BigRational, strict: bool) -> Self {
        Self { coeffs, bound, strict }
    }

    /// True when no variable has a non-zero coefficient.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(Zero::is_zero)
    }

    /// For a constant constraint, whether `0 (<=|<) bound` holds.
    #[must_use]
    pub fn constant_holds(&self) -> bool {
        if self.strict {
            self.bound.is_positive()
        } else {
            !self.bound.is_negative()
        }
    }

    /// If the constraint touches exactly one variable, its index.
    #[must_use]
    pub fn single_var(&self) -> Option<usize> {
        let mut found = None;
        for (index, c) in self.coeffs.iter().enumerate() {
            if !c.is_zero() {
                if found.is_some() {
                    return None;
                }
                found = Some(index);
            }
        }
        found
    }

    /// Evaluate the left-hand side at a point.
    #[must_use]
    pub fn lhs_at(&self, point: &[BigRational]) -> BigRational {
        self.coeffs
            .iter()
            .zip(point.iter())
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Whether the point satisfies the closed relaxation `lhs <= bound`.
    ///
    /// Strictness is deliberately ignored: boundary points are measure-zero
    /// for integration, and vertex enumeration works on the closure.
    #[must_use]
    pub fn satisfied_closed(&self, point: &[BigRational]) -> bool {
        self.lhs_at(point) <= self.bound
    }

    /// The complementary half-space: `not (lhs <= b)` is `-lhs < -b`, and
    /// `not (lhs < b)` is `-lhs <= -b`.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|c| -c.clone()).collect(),
            bound: -self.bound.clone(),
            strict: !self.strict,
        }
    }

    /// Scale coefficients to integers with gcd 1 (positive scaling only,
    /// preserving direction). Canonical form for deduplication and cache
    /// fingerprints.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut lcm = BigInt::from(1);
        for c in self.coeffs.iter().chain(std::iter::once(&self.bound)) {
            lcm = lcm_bigint(&lcm, c.denom());
        }
        let mut ints: Vec<BigInt> = self
            .coeffs
            .iter()
            .chain(std::iter::once(&self.bound))
            .map(|c| (c * BigRational::from_integer(lcm.clone())).to_integer())
            .collect();
        let mut gcd = BigInt::zero();
        for v in &ints {
            gcd = gcd_bigint(&gcd, v);
        }
        if !gcd.is_zero() && !gcd.is_one() {
            for v in &mut ints {
                *v = &*v / &gcd;
            }
        }
        let bound = BigRational::from_integer(ints.pop().unwrap_or_default());
        Self {
            coeffs: ints.into_iter().map(BigRational::from_integer).collect(),
            bound,
            strict: self.strict,
        }
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (index, c) in self.coeffs.iter().enumerate() {
            if c.is_zero() {
                continue;
            }
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            write!(f, "{c}*x{index}")?;
        }
        if first {
            write!(f, "0")?;
        }
        write!(f, " {} {}", if self.strict { "<" } else { "<=" }, self.bound)
    }
}

fn gcd_bigint(a: &BigInt, b: &BigInt) -> BigInt {
    let mut x = a.abs();
    let mut y = b.abs();
    while !y.is_zero() {
        let r = &x % &y;
        x = y;
        y = r;
    }
    x
}

fn lcm_bigint(a: &BigInt, b: &BigInt) -> BigInt {
    if a.is_zero() || b.is_zero() {
        return BigInt::zero();
    }
    (a * b).abs() / gcd_bigint(a, b)
}

/// Exact lower/upper bounds of one variable over a constraint set.
///
/// The flag records strictness of the tightest bound; `None` means the
/// variable is unbounded on that side.
#[derive(Debug, Clone, Default)]
pub struct VarBounds {
    /// Greatest lower bound, if any.
    pub lower: Option<(BigRational, bool)>,
    /// Least upper bound, if any.
    pub upper: Option<(BigRational, bool)>,
}

/// A conjunction of linear constraints over a fixed variable domain.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    n_vars: usize,
    rows: Vec<LinearConstraint>,
}

impl ConstraintSet {
    /// Empty set over `n_vars` variables.
    #[must_use]
    pub fn new(n_vars: usize) -> Self {
        Self {
            n_vars,
            rows: Vec::new(),
        }
    }

    /// Number of variables.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// The constraints.
    #[must_use]
    pub fn rows(&self) -> &[LinearConstraint] {
        &self.rows
    }

    /// Add a constraint.
    pub fn push(&mut self, constraint: LinearConstraint) {
        debug_assert_eq!(constraint.coeffs.len(), self.n_vars);
        self.rows.push(constraint);
    }

    /// Decide satisfiability over the reals by eliminating every variable.
    pub fn is_feasible(&self) -> Result<bool> {
        let mut rows = self.rows.clone();
        for pivot in 0..self.n_vars {
            match eliminate(rows, pivot)? {
                Some(next) => rows = next,
                None => return Ok(false),
            }
        }
        Ok(rows.iter().all(LinearConstraint::constant_holds))
    }

    /// Project exact bounds for one variable by eliminating all others.
    ///
    /// Returns `None` when the set is infeasible.
    pub fn variable_bounds(&self, var: usize) -> Result<Option<VarBounds>> {
        let mut rows = self.rows.clone();
        for pivot in 0..self.n_vars {
            if pivot == var {
                continue;
            }
            match eliminate(rows, pivot)? {
                Some(next) => rows = next,
                None => return Ok(None),
            }
        }

        let mut bounds = VarBounds::default();
        for row in &rows {
            let c = &row.coeffs[var];
            if c.is_zero() {
                if !row.constant_holds() {
                    return Ok(None);
                }
                continue;
            }
            let value = &row.bound / c;
            if c.is_positive() {
                // upper bound: keep the least (strict wins ties)
                let tighter = match &bounds.upper {
                    None => true,
                    Some((current, cur_strict)) => {
                        value < *current || (value == *current && row.strict && !cur_strict)
                    }
                };
                if tighter {
                    bounds.upper = Some((value, row.strict));
                }
            } else {
                let tighter = match &bounds.lower {
                    None => true,
                    Some((current, cur_strict)) => {
                        value > *current || (value == *current && row.strict && !cur_strict)
                    }
                };
                if tighter {
                    bounds.lower = Some((value, row.strict));
                }
            }
        }
        if let (Some((lo, lo_strict)), Some((hi, hi_strict))) = (&bounds.lower, &bounds.upper) {
            let empty = if *lo_strict || *hi_strict { lo >= hi } else { lo > hi };
            if empty {
                return Ok(None);
            }
        }
        Ok(Some(bounds))
    }
}

/// One Fourier-Motzkin elimination step.
///
/// Returns `None` when a contradictory constant row is produced.
fn eliminate(rows: Vec<LinearConstraint>, pivot: usize) -> Result<Option<Vec<LinearConstraint>>> {
    let mut uppers: Vec<LinearConstraint> = Vec::new();
    let mut lowers: Vec<LinearConstraint> = Vec::new();
    let mut rest: Vec<LinearConstraint> = Vec::new();

    for row in rows {
        let c = &row.coeffs[pivot];
        if c.is_zero() {
            if row.is_constant() {
                if !row.constant_holds() {
                    return Ok(None);
                }
            } else {
                rest.push(row);
            }
        } else if c.is_positive() {
            uppers.push(row);
        } else {
            lowers.push(row);
        }
    }

    if rest.len() + uppers.len() * lowers.len() > MAX_ROWS {
        return Err(MathError::TooManyConstraints(MAX_ROWS));
    }

    for upper in &uppers {
        for lower in &lowers {
            let cu = upper.coeffs[pivot].clone();
            let cl = -lower.coeffs[pivot].clone();
            // cl * upper + cu * lower cancels the pivot (both factors > 0)
            let coeffs: Vec<BigRational> = upper
                .coeffs
                .iter()
                .zip(lower.coeffs.iter())
                .map(|(u, l)| u * &cl + l * &cu)
                .collect();
            let bound = &upper.bound * &cl + &lower.bound * &cu;
            let combined = LinearConstraint::new(coeffs, bound, upper.strict || lower.strict);
            if combined.is_constant() {
                if !combined.constant_holds() {
                    return Ok(None);
                }
            } else {
                rest.push(combined);
            }
        }
    }
    Ok(Some(rest))
}
