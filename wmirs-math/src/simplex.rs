//! Exact integration of polynomials over simplices.
//!
//! For a simplex with vertices `v0..vn` the substitution
//! `x = v0 + sum lambda_i (v_i - v0)` maps the standard simplex
//! `{lambda >= 0, sum lambda <= 1}` onto it with constant Jacobian
//! `|det(v_i - v0)|`. Monomials of the transformed integrand integrate by
//! the Dirichlet formula
//!
//! `integral lambda^beta d lambda = (prod beta_i!) / (n + |beta|)!`

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

use crate::matrix::determinant;
use crate::polynomial::Polynomial;

/// Integrate `integrand` exactly over the simplex spanned by `vertices`
/// (`dim + 1` points in `dim` dimensions).
///
/// Degenerate simplices (zero Jacobian) contribute 0.
#[must_use]
pub fn integrate_over_simplex(vertices: &[&Vec<BigRational>], integrand: &Polynomial) -> BigRational {
    let n = vertices.len().saturating_sub(1);
    if n == 0 || integrand.is_zero() {
        return BigRational::zero();
    }
    let v0 = vertices[0];

    // Jacobian columns v_i - v0.
    let jacobian: Vec<Vec<BigRational>> = (0..n)
        .map(|row| (1..=n).map(|i| &vertices[i][row] - &v0[row]).collect())
        .collect();
    let det = determinant(&jacobian);
    if det.is_zero() {
        return BigRational::zero();
    }
    let jac = if det < BigRational::zero() { -det } else { det };

    // Coordinate substitutions as degree-1 polynomials in lambda.
    let coords: Vec<Polynomial> = (0..n)
        .map(|coord| {
            let mut p = Polynomial::constant(n, v0[coord].clone());
            for i in 1..=n {
                let delta = &vertices[i][coord] - &v0[coord];
                if !delta.is_zero() {
                    p = p.add(&Polynomial::variable(n, i - 1).scale(&delta));
                }
            }
            p
        })
        .collect();

    // Compose the integrand with the substitution.
    let mut transformed = Polynomial::zero(n);
    for (exponents, coeff) in integrand.monomials() {
        let mut term = Polynomial::constant(n, coeff.clone());
        for (coord, exp) in exponents.iter().enumerate() {
            if *exp > 0 {
                term = term.mul(&coords[coord].pow(*exp));
            }
        }
        transformed = transformed.add(&term);
    }

    // Dirichlet integral per monomial.
    let mut total = BigRational::zero();
    for (beta, coeff) in transformed.monomials() {
        let degree: u32 = beta.iter().sum();
        let mut numer = BigInt::one();
        for b in beta.iter() {
            numer *= factorial(*b);
        }
        let denom = factorial(n as u32 + degree);
        total += coeff * BigRational::new(numer, denom);
    }
    total * jac
}

fn factorial(n: u32) -> BigInt {
    let mut acc = BigInt::one();
    for i in 2..=n {
        acc *= BigInt::from(i);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn frac(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn test_volume_of_standard_triangle() {
        let a = vec![rat(0), rat(0)];
        let b = vec![rat(1), rat(0)];
        let c = vec![rat(0), rat(1)];
        let one = Polynomial::constant(2, rat(1));
        let vol = integrate_over_simplex(&[&a, &b, &c], &one);
        assert_eq!(vol, frac(1, 2));
    }

    #[test]
    fn test_linear_integrand_over_triangle() {
        // integral of x over the standard triangle = 1/6
        let a = vec![rat(0), rat(0)];
        let b = vec![rat(1), rat(0)];
        let c = vec![rat(0), rat(1)];
        let x = Polynomial::variable(2, 0);
        let result = integrate_over_simplex(&[&a, &b, &c], &x);
        assert_eq!(result, frac(1, 6));
    }

    #[test]
    fn test_interval_with_quadratic() {
        // integral of x^2 over [0, 2] = 8/3
        let a = vec![rat(0)];
        let b = vec![rat(2)];
        let x2 = Polynomial::variable(1, 0).pow(2);
        let result = integrate_over_simplex(&[&a, &b], &x2);
        assert_eq!(result, frac(8, 3));
    }

    #[test]
    fn test_shifted_interval_linear() {
        // integral of x over [1, 3] = 4
        let a = vec![rat(1)];
        let b = vec![rat(3)];
        let x = Polynomial::variable(1, 0);
        let result = integrate_over_simplex(&[&a, &b], &x);
        assert_eq!(result, rat(4));
    }

    #[test]
    fn test_degenerate_simplex_is_zero() {
        let a = vec![rat(0), rat(0)];
        let b = vec![rat(1), rat(1)];
        let c = vec![rat(2), rat(2)];
        let one = Polynomial::constant(2, rat(1));
        assert_eq!(integrate_over_simplex(&[&a, &b, &c], &one), rat(0));
    }
}
