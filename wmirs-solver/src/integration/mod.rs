//! Integration back-ends.
//!
//! A base integrator computes `integral over polytope of integrand dx`;
//! wrappers implement the same trait and compose: the axis-aligned wrapper
//! short-circuits constant integrands over boxes, the cache wrapper
//! memoizes by canonical fingerprint with a single-flight discipline.

mod axisaligned;
mod cache;
mod exact;
mod rejection;

pub use axisaligned::AxisAlignedWrapper;
pub use cache::{CacheWrapper, IntegrationCache};
pub use exact::ExactIntegrator;
pub use rejection::{RejectionIntegrator, SampleEstimate};

use num_rational::BigRational;
use wmirs_math::{Polynomial, Polytope};

use crate::error::Result;

/// Computes convex integrals `integral over polytope of integrand`.
///
/// Implementations must be shareable across the dispatcher's worker
/// threads. Exact back-ends return exact rationals; sampling back-ends
/// return float-converted rationals.
pub trait Integrator: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Compute a single convex integral.
    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational>;

    /// Compute a batch of integrals, blocking until all complete.
    fn integrate_batch(
        &self,
        batch: &[(Polytope, Polynomial)],
    ) -> Result<Vec<BigRational>> {
        batch
            .iter()
            .map(|(polytope, integrand)| self.integrate(polytope, integrand))
            .collect()
    }
}

impl<T: Integrator + ?Sized> Integrator for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational> {
        (**self).integrate(polytope, integrand)
    }

    fn integrate_batch(
        &self,
        batch: &[(Polytope, Polynomial)],
    ) -> Result<Vec<BigRational>> {
        (**self).integrate_batch(batch)
    }
}

/// Canonical fingerprint of an integration problem, renamed to the domain
/// order and stable across runs of the same solver version.
#[must_use]
pub fn fingerprint(polytope: &Polytope, integrand: &Polynomial) -> String {
    format!("{}|{}", polytope.fingerprint(), integrand)
}
