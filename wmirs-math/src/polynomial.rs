//! Multivariate polynomials with rational coefficients.
//!
//! A polynomial over an ordered domain of `n_vars` real variables is a map
//! from dense exponent vectors to coefficients; `{(2,0,1): 3}` denotes
//! `3 * x0^2 * x2`. Zero coefficients are never stored.

use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

/// Dense exponent vector of a monomial.
pub type Exponents = SmallVec<[u32; 8]>;

/// A multivariate polynomial as a sum of monomials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    n_vars: usize,
    monomials: FxHashMap<Exponents, BigRational>,
}

impl Polynomial {
    /// The zero polynomial over `n_vars` variables.
    #[must_use]
    pub fn zero(n_vars: usize) -> Self {
        Self {
            n_vars,
            monomials: FxHashMap::default(),
        }
    }

    /// A constant polynomial.
    #[must_use]
    pub fn constant(n_vars: usize, value: BigRational) -> Self {
        let mut p = Self::zero(n_vars);
        if !value.is_zero() {
            p.monomials.insert(Self::unit_key(n_vars), value);
        }
        p
    }

    /// The polynomial `x_index`.
    #[must_use]
    pub fn variable(n_vars: usize, index: usize) -> Self {
        debug_assert!(index < n_vars);
        let mut key = Self::unit_key(n_vars);
        key[index] = 1;
        let mut p = Self::zero(n_vars);
        p.monomials.insert(key, BigRational::one());
        p
    }

    fn unit_key(n_vars: usize) -> Exponents {
        let mut key = Exponents::new();
        key.resize(n_vars, 0);
        key
    }

    /// Number of domain variables.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Number of monomials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monomials.len()
    }

    /// True for the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.monomials.is_empty()
    }

    /// Total degree; 0 for constants and the zero polynomial.
    #[must_use]
    pub fn degree(&self) -> u32 {
        self.monomials
            .keys()
            .map(|e| e.iter().sum())
            .max()
            .unwrap_or(0)
    }

    /// The constant value if this polynomial has degree 0.
    #[must_use]
    pub fn constant_value(&self) -> Option<BigRational> {
        if self.monomials.is_empty() {
            return Some(BigRational::zero());
        }
        if self.degree() > 0 {
            return None;
        }
        self.monomials.values().next().cloned()
    }

    /// Iterate over `(exponents, coefficient)` pairs.
    pub fn monomials(&self) -> impl Iterator<Item = (&Exponents, &BigRational)> {
        self.monomials.iter()
    }

    /// Add a single monomial, dropping the entry if it cancels.
    pub fn add_monomial(&mut self, exponents: Exponents, coeff: BigRational) {
        if coeff.is_zero() {
            return;
        }
        debug_assert_eq!(exponents.len(), self.n_vars);
        let entry = self
            .monomials
            .entry(exponents)
            .or_insert_with(BigRational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.monomials.retain(|_, c| !c.is_zero());
        }
    }

    /// Sum of two polynomials.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (key, coeff) in &other.monomials {
            out.add_monomial(key.clone(), coeff.clone());
        }
        out
    }

    /// Difference of two polynomials.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (key, coeff) in &other.monomials {
            out.add_monomial(key.clone(), -coeff.clone());
        }
        out
    }

    /// Product of two polynomials (distributes and collects like terms).
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let mut out = Self::zero(self.n_vars);
        for (ka, ca) in &self.monomials {
            for (kb, cb) in &other.monomials {
                let key: Exponents = ka.iter().zip(kb.iter()).map(|(a, b)| a + b).collect();
                out.add_monomial(key, ca * cb);
            }
        }
        out
    }

    /// Scale by a rational constant.
    #[must_use]
    pub fn scale(&self, factor: &BigRational) -> Self {
        if factor.is_zero() {
            return Self::zero(self.n_vars);
        }
        Self {
            n_vars: self.n_vars,
            monomials: self
                .monomials
                .iter()
                .map(|(k, c)| (k.clone(), c * factor))
                .collect(),
        }
    }

    /// Integer power by repeated multiplication.
    #[must_use]
    pub fn pow(&self, exp: u32) -> Self {
        let mut out = Self::constant(self.n_vars, BigRational::one());
        for _ in 0..exp {
            out = out.mul(self);
        }
        out
    }

    /// Evaluate at a rational point.
    #[must_use]
    pub fn eval(&self, point: &[BigRational]) -> BigRational {
        let mut total = BigRational::zero();
        for (key, coeff) in &self.monomials {
            let mut term = coeff.clone();
            for (exp, value) in key.iter().zip(point.iter()) {
                for _ in 0..*exp {
                    term *= value;
                }
            }
            total += term;
        }
        total
    }

    /// Evaluate at a floating-point sample (used by sampling integrators).
    #[must_use]
    pub fn eval_f64(&self, point: &[f64]) -> f64 {
        let mut total = 0.0;
        for (key, coeff) in &self.monomials {
            let mut term = coeff.to_f64().unwrap_or(f64::NAN);
            for (exp, value) in key.iter().zip(point.iter()) {
                term *= value.powi(*exp as i32);
            }
            total += term;
        }
        total
    }

    /// Monomials sorted by exponent vector; the canonical order used by
    /// [`fmt::Display`] and cache fingerprints.
    #[must_use]
    pub fn sorted_monomials(&self) -> Vec<(Exponents, BigRational)> {
        let mut entries: Vec<(Exponents, BigRational)> = self
            .monomials
            .iter()
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut first = true;
        for (key, coeff) in self.sorted_monomials() {
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            write!(f, "{coeff}")?;
            for (index, exp) in key.iter().enumerate() {
                if *exp > 0 {
                    write!(f, "*x{index}^{exp}")?;
                }
            }
        }
        Ok(())
    }
}
