//! wmirs-math - Exact numerics for Weighted Model Integration
//!
//! Everything in this crate computes with arbitrary-precision rationals:
//! - Multivariate polynomials as monomial maps over an ordered domain
//! - Linear constraints and Fourier-Motzkin feasibility / bound projection
//! - Rational Gaussian elimination (square solve, affine rank)
//! - H-polytopes: vertex enumeration, pulling triangulation, exact
//!   integration of polynomials over simplices

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod matrix;
pub mod polynomial;
pub mod polytope;
pub mod simplex;

pub use constraint::{ConstraintSet, LinearConstraint, VarBounds};
pub use error::{MathError, Result};
pub use polynomial::Polynomial;
pub use polytope::Polytope;
