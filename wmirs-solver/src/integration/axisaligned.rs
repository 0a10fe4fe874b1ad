//! Axis-aligned fast path.

use num_rational::BigRational;
use num_traits::Signed;
use tracing::trace;
use wmirs_math::polytope::box_volume;
use wmirs_math::{Polynomial, Polytope};

use crate::error::Result;
use crate::integration::Integrator;

/// Wrapper that computes constant integrands over axis-aligned boxes in
/// linear time and delegates everything else to the enclosed integrator.
///
/// A polytope is axis-aligned when every half-space constrains exactly one
/// variable; the integral of a constant `c` is then
/// `c * prod (upper_i - lower_i)`, with any non-positive width giving 0.
pub struct AxisAlignedWrapper<I> {
    inner: I,
}

impl<I: Integrator> AxisAlignedWrapper<I> {
    /// Wrap a base integrator.
    #[must_use]
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    /// Interval bounds per variable if every half-space is axis-aligned
    /// and both sides of every variable are bounded.
    fn axis_aligned_bounds(polytope: &Polytope) -> Option<Vec<(Option<BigRational>, Option<BigRational>)>> {
        let mut bounds: Vec<(Option<BigRational>, Option<BigRational>)> =
            vec![(None, None); polytope.dim()];
        for constraint in polytope.constraints() {
            let var = constraint.single_var()?;
            let coeff = &constraint.coeffs[var];
            let value = &constraint.bound / coeff;
            if coeff.is_positive() {
                let upper = &mut bounds[var].1;
                if upper.as_ref().map_or(true, |u| value < *u) {
                    *upper = Some(value);
                }
            } else {
                let lower = &mut bounds[var].0;
                if lower.as_ref().map_or(true, |l| value > *l) {
                    *lower = Some(value);
                }
            }
        }
        Some(bounds)
    }
}

impl<I: Integrator> Integrator for AxisAlignedWrapper<I> {
    fn name(&self) -> &'static str {
        "axis-aligned"
    }

    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational> {
        if let Some(constant) = integrand.constant_value() {
            if let Some(bounds) = Self::axis_aligned_bounds(polytope) {
                // a missing side leaves unboundedness diagnostics to the
                // base integrator
                let closed: Option<Vec<(BigRational, BigRational)>> = bounds
                    .into_iter()
                    .map(|(lower, upper)| lower.zip(upper))
                    .collect();
                if let Some(intervals) = closed {
                    trace!(dim = polytope.dim(), "axis-aligned fast path");
                    return Ok(constant * box_volume(&intervals));
                }
            }
        }
        self.inner.integrate(polytope, integrand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WmiError;
    use num_bigint::BigInt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wmirs_math::LinearConstraint;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn row(coeffs: &[i64], bound: i64) -> LinearConstraint {
        LinearConstraint::new(coeffs.iter().map(|&c| rat(c)).collect(), rat(bound), false)
    }

    /// Base integrator that counts calls and always fails.
    #[derive(Default)]
    struct Probe {
        calls: AtomicUsize,
    }

    impl Integrator for &Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn integrate(&self, _: &Polytope, _: &Polynomial) -> Result<BigRational> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(WmiError::NoIntegrator)
        }
    }

    #[test]
    fn test_constant_over_box_never_reaches_base() {
        let probe = Probe::default();
        let wrapper = AxisAlignedWrapper::new(&probe);
        let p = Polytope::new(
            2,
            vec![row(&[1, 0], 1), row(&[-1, 0], 0), row(&[0, 1], 1), row(&[0, -1], 0)],
        );
        let two = Polynomial::constant(2, rat(2));

        assert_eq!(wrapper.integrate(&p, &two).unwrap(), rat(2));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_interval_gives_zero() {
        let probe = Probe::default();
        let wrapper = AxisAlignedWrapper::new(&probe);
        let p = Polytope::new(1, vec![row(&[1], 0), row(&[-1], -1)]); // 1 <= x <= 0
        let one = Polynomial::constant(1, rat(1));

        assert_eq!(wrapper.integrate(&p, &one).unwrap(), rat(0));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_non_constant_integrand_delegates() {
        let probe = Probe::default();
        let wrapper = AxisAlignedWrapper::new(&probe);
        let p = Polytope::new(1, vec![row(&[1], 1), row(&[-1], 0)]);
        let x = Polynomial::variable(1, 0);

        assert!(wrapper.integrate(&p, &x).is_err());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_diagonal_halfspace_delegates() {
        let probe = Probe::default();
        let wrapper = AxisAlignedWrapper::new(&probe);
        let p = Polytope::new(2, vec![row(&[1, 1], 1), row(&[-1, 0], 0), row(&[0, -1], 0)]);
        let one = Polynomial::constant(2, rat(1));

        assert!(wrapper.integrate(&p, &one).is_err());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scaled_halfspaces_intersect() {
        // x <= 1 and 2x <= 1: tightest upper bound is 1/2
        let probe = Probe::default();
        let wrapper = AxisAlignedWrapper::new(&probe);
        let p = Polytope::new(1, vec![row(&[1], 1), row(&[2], 1), row(&[-1], 0)]);
        let one = Polynomial::constant(1, rat(1));

        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert_eq!(wrapper.integrate(&p, &one).unwrap(), half);
    }
}
