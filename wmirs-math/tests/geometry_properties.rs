//! Property-based tests for constraints, polytopes and exact integration.

use num_bigint::BigInt;
use num_rational::BigRational;
use proptest::prelude::*;
use wmirs_math::simplex::integrate_over_simplex;
use wmirs_math::{ConstraintSet, LinearConstraint, Polynomial, Polytope};

fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

fn interval_rows(lo: i64, hi: i64) -> Vec<LinearConstraint> {
    vec![
        LinearConstraint::new(vec![rat(1)], rat(hi), false),
        LinearConstraint::new(vec![rat(-1)], rat(-lo), false),
    ]
}

proptest! {
    /// An interval is feasible exactly when lo <= hi.
    #[test]
    fn interval_feasibility(lo in -20i64..20, hi in -20i64..20) {
        let mut set = ConstraintSet::new(1);
        for row in interval_rows(lo, hi) {
            set.push(row);
        }
        prop_assert_eq!(set.is_feasible().unwrap(), lo <= hi);
    }

    /// Fourier-Motzkin projection recovers the exact interval bounds.
    #[test]
    fn projection_recovers_box(
        lo_x in -10i64..10, w_x in 0i64..10,
        lo_y in -10i64..10, w_y in 0i64..10,
    ) {
        let (hi_x, hi_y) = (lo_x + w_x, lo_y + w_y);
        let mut set = ConstraintSet::new(2);
        set.push(LinearConstraint::new(vec![rat(1), rat(0)], rat(hi_x), false));
        set.push(LinearConstraint::new(vec![rat(-1), rat(0)], rat(-lo_x), false));
        set.push(LinearConstraint::new(vec![rat(0), rat(1)], rat(hi_y), false));
        set.push(LinearConstraint::new(vec![rat(0), rat(-1)], rat(-lo_y), false));
        // a redundant diagonal must not disturb the projection
        set.push(LinearConstraint::new(
            vec![rat(1), rat(1)],
            rat(hi_x + hi_y),
            false,
        ));

        let bounds = set.variable_bounds(0).unwrap().expect("feasible box");
        prop_assert_eq!(bounds.lower.map(|(v, _)| v), Some(rat(lo_x)));
        prop_assert_eq!(bounds.upper.map(|(v, _)| v), Some(rat(hi_x)));
    }

    /// Exact volume of a box equals the product of widths.
    #[test]
    fn box_volume_is_width_product(
        lo_x in -5i64..5, w_x in 1i64..6,
        lo_y in -5i64..5, w_y in 1i64..6,
    ) {
        let (hi_x, hi_y) = (lo_x + w_x, lo_y + w_y);
        let polytope = Polytope::new(
            2,
            vec![
                LinearConstraint::new(vec![rat(1), rat(0)], rat(hi_x), false),
                LinearConstraint::new(vec![rat(-1), rat(0)], rat(-lo_x), false),
                LinearConstraint::new(vec![rat(0), rat(1)], rat(hi_y), false),
                LinearConstraint::new(vec![rat(0), rat(-1)], rat(-lo_y), false),
            ],
        );
        let vertices = polytope.vertices();
        prop_assert_eq!(vertices.len(), 4);

        let one = Polynomial::constant(2, rat(1));
        let total: BigRational = polytope
            .triangulate(&vertices)
            .iter()
            .map(|s| {
                let pts: Vec<&Vec<BigRational>> = s.iter().map(|&i| &vertices[i]).collect();
                integrate_over_simplex(&pts, &one)
            })
            .sum();
        prop_assert_eq!(total, rat(w_x * w_y));
    }

    /// Linearity of simplex integration in the integrand.
    #[test]
    fn simplex_integration_is_linear(
        c1 in -5i64..6,
        c2 in -5i64..6,
    ) {
        let a = vec![rat(0), rat(0)];
        let b = vec![rat(2), rat(0)];
        let c = vec![rat(0), rat(3)];
        let verts = [&a, &b, &c];

        let x = Polynomial::variable(2, 0);
        let y = Polynomial::variable(2, 1).pow(2);
        let combined = x.scale(&rat(c1)).add(&y.scale(&rat(c2)));

        let lhs = integrate_over_simplex(&verts, &combined);
        let rhs = integrate_over_simplex(&verts, &x) * rat(c1)
            + integrate_over_simplex(&verts, &y) * rat(c2);
        prop_assert_eq!(lhs, rhs);
    }
}
