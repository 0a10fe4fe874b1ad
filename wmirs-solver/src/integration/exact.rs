//! Exact integration by vertex enumeration and triangulation.

use num_rational::BigRational;
use num_traits::Zero;
use tracing::trace;
use wmirs_math::simplex::integrate_over_simplex;
use wmirs_math::{Polynomial, Polytope};

use crate::error::{Result, WmiError};
use crate::integration::Integrator;

/// Exact back-end: enumerates the polytope's vertices, triangulates with
/// the pulling scheme and integrates each simplex in rational arithmetic.
///
/// Rejects unbounded polytopes; degenerate (lower-dimensional) ones
/// integrate to 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactIntegrator;

impl ExactIntegrator {
    /// Create the exact integrator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Integrator for ExactIntegrator {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational> {
        if integrand.is_zero() {
            return Ok(BigRational::zero());
        }
        if polytope.dim() == 0 {
            // zero-dimensional domain: the integral over the single point
            // is the (necessarily constant) integrand value
            return integrand
                .constant_value()
                .ok_or_else(|| WmiError::UnsupportedWeight(integrand.to_string()));
        }
        // also detects emptiness and unboundedness exactly
        match polytope.bounding_box()? {
            None => return Ok(BigRational::zero()),
            Some(_) => {}
        }

        let vertices = polytope.vertices();
        if vertices.len() <= polytope.dim() {
            return Ok(BigRational::zero());
        }
        let simplices = polytope.triangulate(&vertices);
        trace!(
            vertices = vertices.len(),
            simplices = simplices.len(),
            "triangulated polytope"
        );

        let mut total = BigRational::zero();
        for simplex in &simplices {
            let points: Vec<&Vec<BigRational>> =
                simplex.iter().map(|&i| &vertices[i]).collect();
            total += integrate_over_simplex(&points, integrand);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use wmirs_math::LinearConstraint;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn frac(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn row(coeffs: &[i64], bound: i64) -> LinearConstraint {
        LinearConstraint::new(coeffs.iter().map(|&c| rat(c)).collect(), rat(bound), false)
    }

    #[test]
    fn test_interval_volume() {
        let p = Polytope::new(1, vec![row(&[1], 3), row(&[-1], 1)]); // [-1, 3]
        let one = Polynomial::constant(1, rat(1));
        assert_eq!(ExactIntegrator::new().integrate(&p, &one).unwrap(), rat(4));
    }

    #[test]
    fn test_linear_integrand_over_square() {
        // integral of (x + y) over [0,1]^2 = 1
        let p = Polytope::new(
            2,
            vec![row(&[1, 0], 1), row(&[-1, 0], 0), row(&[0, 1], 1), row(&[0, -1], 0)],
        );
        let x = Polynomial::variable(2, 0);
        let y = Polynomial::variable(2, 1);
        let sum = x.add(&y);
        assert_eq!(ExactIntegrator::new().integrate(&p, &sum).unwrap(), rat(1));
    }

    #[test]
    fn test_triangle_area() {
        // x >= 0, y >= 0, x + y <= 1
        let p = Polytope::new(2, vec![row(&[-1, 0], 0), row(&[0, -1], 0), row(&[1, 1], 1)]);
        let one = Polynomial::constant(2, rat(1));
        assert_eq!(
            ExactIntegrator::new().integrate(&p, &one).unwrap(),
            frac(1, 2)
        );
    }

    #[test]
    fn test_empty_polytope_is_zero() {
        let p = Polytope::new(1, vec![row(&[1], 0), row(&[-1], -1)]);
        let one = Polynomial::constant(1, rat(1));
        assert_eq!(
            ExactIntegrator::new().integrate(&p, &one).unwrap(),
            rat(0)
        );
    }

    #[test]
    fn test_degenerate_slab_is_zero() {
        // x = 1 encoded as two half-spaces inside a 2d domain
        let p = Polytope::new(
            2,
            vec![
                row(&[1, 0], 1),
                row(&[-1, 0], -1),
                row(&[0, 1], 1),
                row(&[0, -1], 0),
            ],
        );
        let one = Polynomial::constant(2, rat(1));
        assert_eq!(ExactIntegrator::new().integrate(&p, &one).unwrap(), rat(0));
    }

    #[test]
    fn test_unbounded_polytope_rejected() {
        let p = Polytope::new(1, vec![row(&[-1], 0)]);
        let one = Polynomial::constant(1, rat(1));
        assert!(matches!(
            ExactIntegrator::new().integrate(&p, &one),
            Err(WmiError::UnboundedDomain(0))
        ));
    }

    #[test]
    fn test_quadratic_integrand() {
        // integral of x^2 over [0, 2] = 8/3
        let p = Polytope::new(1, vec![row(&[1], 2), row(&[-1], 0)]);
        let x2 = Polynomial::variable(1, 0).pow(2);
        assert_eq!(
            ExactIntegrator::new().integrate(&p, &x2).unwrap(),
            frac(8, 3)
        );
    }
}
