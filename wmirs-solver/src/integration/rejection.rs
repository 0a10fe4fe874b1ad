//! Monte-Carlo integration by rejection sampling.

use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;
use wmirs_math::{Polynomial, Polytope};

use crate::error::{Result, WmiError};
use crate::integration::Integrator;

/// Sampling back-end: samples uniformly from the exact axis-aligned
/// bounding box of the polytope (computed by Fourier-Motzkin projection)
/// and rejects points outside.
///
/// Results are reproducible for a fixed seed as long as the dispatcher
/// runs single-threaded; in parallel mode only the per-cell estimates are
/// deterministic, their summation order is not.
#[derive(Debug, Clone)]
pub struct RejectionIntegrator {
    n_samples: usize,
    seed: u64,
}

impl RejectionIntegrator {
    /// Default sample size.
    pub const DEF_N_SAMPLES: usize = 10_000;

    /// Create a sampler with the given sample count and seed.
    #[must_use]
    pub fn new(n_samples: usize, seed: u64) -> Self {
        Self { n_samples, seed }
    }

    /// Sampler with the default sample count.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::new(Self::DEF_N_SAMPLES, seed)
    }

    /// Estimate the integral together with its standard error.
    pub fn estimate(
        &self,
        polytope: &Polytope,
        integrand: &Polynomial,
    ) -> Result<SampleEstimate> {
        self.sample(polytope, integrand)
    }
}

impl Default for RejectionIntegrator {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

/// A Monte-Carlo estimate with its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleEstimate {
    /// Estimated integral value.
    pub value: f64,
    /// Standard error of the estimate (0 for degenerate cases).
    pub std_error: f64,
}

impl Integrator for RejectionIntegrator {
    fn name(&self) -> &'static str {
        "rejection"
    }

    fn integrate(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<BigRational> {
        let estimate = self.sample(polytope, integrand)?.value;
        BigRational::from_float(estimate).ok_or_else(|| {
            WmiError::InternalInconsistency(format!("non-finite sampling estimate {estimate}"))
        })
    }
}

impl RejectionIntegrator {
    fn sample(&self, polytope: &Polytope, integrand: &Polynomial) -> Result<SampleEstimate> {
        let exact_zero = SampleEstimate { value: 0.0, std_error: 0.0 };
        if integrand.is_zero() {
            return Ok(exact_zero);
        }
        if polytope.dim() == 0 {
            let value = integrand
                .constant_value()
                .ok_or_else(|| WmiError::UnsupportedWeight(integrand.to_string()))?;
            return Ok(SampleEstimate {
                value: value.to_f64().unwrap_or(f64::NAN),
                std_error: 0.0,
            });
        }
        let Some(bounds) = polytope.bounding_box()? else {
            return Ok(exact_zero);
        };

        let lows: Vec<f64> = bounds
            .iter()
            .map(|(lo, _)| lo.to_f64().unwrap_or(f64::NAN))
            .collect();
        let highs: Vec<f64> = bounds
            .iter()
            .map(|(_, hi)| hi.to_f64().unwrap_or(f64::NAN))
            .collect();
        let box_volume: f64 = lows
            .iter()
            .zip(highs.iter())
            .map(|(lo, hi)| (hi - lo).max(0.0))
            .product();
        if box_volume == 0.0 {
            return Ok(exact_zero);
        }

        let rows: Vec<(Vec<f64>, f64)> = polytope
            .constraints()
            .iter()
            .map(|c| {
                (
                    c.coeffs
                        .iter()
                        .map(|v| v.to_f64().unwrap_or(f64::NAN))
                        .collect(),
                    c.bound.to_f64().unwrap_or(f64::NAN),
                )
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut point = vec![0.0f64; polytope.dim()];
        let mut accepted = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for _ in 0..self.n_samples {
            for (value, (lo, hi)) in point.iter_mut().zip(lows.iter().zip(highs.iter())) {
                *value = lo + rng.gen::<f64>() * (hi - lo);
            }
            let inside = rows.iter().all(|(coeffs, bound)| {
                let lhs: f64 = coeffs.iter().zip(point.iter()).map(|(c, x)| c * x).sum();
                lhs <= *bound
            });
            if inside {
                accepted += 1;
                let sample = integrand.eval_f64(&point);
                sum += sample;
                sum_sq += sample * sample;
            }
        }

        // mean and variance of f * indicator over the box
        let n = self.n_samples as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        let value = mean * box_volume;
        let std_error = (variance / n).sqrt() * box_volume;
        trace!(accepted, n = self.n_samples, value, std_error, "rejection sample");
        Ok(SampleEstimate { value, std_error })
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

    fn row(coeffs: &[i64], bound: i64) -> LinearConstraint {
        LinearConstraint::new(coeffs.iter().map(|&c| rat(c)).collect(), rat(bound), false)
    }

    #[test]
    fn test_box_volume_estimate_is_exact() {
        // the bounding box equals the polytope: no rejection error at all
        let p = Polytope::new(
            2,
            vec![row(&[1, 0], 2), row(&[-1, 0], 0), row(&[0, 1], 1), row(&[0, -1], 0)],
        );
        let one = Polynomial::constant(2, rat(1));
        let est = RejectionIntegrator::new(1000, 42)
            .integrate(&p, &one)
            .unwrap();
        let value = est.to_f64().unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_estimate_close() {
        let p = Polytope::new(2, vec![row(&[-1, 0], 0), row(&[0, -1], 0), row(&[1, 1], 1)]);
        let one = Polynomial::constant(2, rat(1));
        let est = RejectionIntegrator::new(200_000, 7)
            .integrate(&p, &one)
            .unwrap();
        let value = est.to_f64().unwrap();
        assert!((value - 0.5).abs() < 0.02, "estimate {value} too far from 1/2");
    }

    #[test]
    fn test_seed_reproducibility() {
        let p = Polytope::new(2, vec![row(&[-1, 0], 0), row(&[0, -1], 0), row(&[1, 1], 1)]);
        let x = Polynomial::variable(2, 0);
        let a = RejectionIntegrator::new(5000, 3).integrate(&p, &x).unwrap();
        let b = RejectionIntegrator::new(5000, 3).integrate(&p, &x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_over_box_has_zero_error() {
        // every sample lands inside and evaluates identically
        let p = Polytope::new(1, vec![row(&[1], 3), row(&[-1], 0)]);
        let five = Polynomial::constant(1, rat(5));
        let est = RejectionIntegrator::new(2000, 11).estimate(&p, &five).unwrap();
        assert!((est.value - 15.0).abs() < 1e-9);
        assert_eq!(est.std_error, 0.0);
    }

    #[test]
    fn test_empty_polytope_is_zero() {
        let p = Polytope::new(1, vec![row(&[1], 0), row(&[-1], -1)]);
        let one = Polynomial::constant(1, rat(1));
        assert_eq!(
            RejectionIntegrator::default().integrate(&p, &one).unwrap(),
            rat(0)
        );
    }
}
