//! Property-based tests for term construction and rewriting.

use num_bigint::BigInt;
use num_rational::BigRational;
use proptest::prelude::*;
use rustc_hash::FxHashMap;
use wmirs_core::TermManager;

fn rational(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

proptest! {
    /// Interning the same constant twice yields the same node.
    #[test]
    fn constant_uniqueness(n in -1000i64..1000, d in 1i64..50) {
        let mut tm = TermManager::new();
        let a = tm.mk_real(rational(n, d));
        let b = tm.mk_real(rational(n, d));
        prop_assert_eq!(a, b);
    }

    /// Variables with the same name share a node; different names do not.
    #[test]
    fn variable_uniqueness(name in "[a-z][a-z0-9]{0,4}") {
        let mut tm = TermManager::new();
        let v1 = tm.mk_bool_var(&name);
        let v2 = tm.mk_bool_var(&name);
        prop_assert_eq!(v1, v2);
        let other = tm.mk_bool_var(&format!("{name}_"));
        prop_assert_ne!(v1, other);
    }

    /// Double negation is the identity.
    #[test]
    fn double_negation(name in "[a-z]") {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var(&name);
        let np = tm.mk_not(p);
        prop_assert_eq!(tm.mk_not(np), p);
    }

    /// Conjunction is order- and duplication-insensitive.
    #[test]
    fn and_is_canonical(perm in proptest::sample::subsequence(vec![0usize, 1, 2, 0, 1], 1..5)) {
        let mut tm = TermManager::new();
        let vars = [tm.mk_bool_var("p"), tm.mk_bool_var("q"), tm.mk_bool_var("r")];
        let all = tm.mk_and(vec![vars[0], vars[1], vars[2]]);

        let mut args: Vec<_> = perm.iter().map(|&i| vars[i]).collect();
        args.extend_from_slice(&vars);
        args.reverse();
        prop_assert_eq!(tm.mk_and(args), all);
    }

    /// Positive scalings of an inequality intern to the same atom.
    #[test]
    fn inequality_scaling_canonical(
        coeff in 1i64..40,
        bound_n in -50i64..50,
    ) {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let b = tm.mk_real_int(bound_n);
        let plain = tm.mk_le(x, b).unwrap();

        let c = tm.mk_real_int(coeff);
        let cx = tm.mk_mul(vec![c, x]);
        let cb = tm.mk_real_int(coeff * bound_n);
        let scaled = tm.mk_le(cx, cb).unwrap();
        prop_assert_eq!(plain, scaled);
    }

    /// Substituting all atoms of a formula always determines it, and the
    /// residual agrees with a direct truth-table evaluation.
    #[test]
    fn full_substitution_determines(
        pv in proptest::bool::ANY,
        qv in proptest::bool::ANY,
    ) {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var("p");
        let q = tm.mk_bool_var("q");
        let nq = tm.mk_not(q);
        let or_pq = tm.mk_or(vec![p, q]);
        let formula = tm.mk_and(vec![or_pq, nq]);

        let mut assignment = FxHashMap::default();
        assignment.insert(p, pv);
        assignment.insert(q, qv);
        let residual = tm.substitute_bools(formula, &assignment).unwrap();

        let expected = (pv || qv) && !qv;
        prop_assert_eq!(residual, tm.mk_bool(expected));
    }

    /// NNF preserves the truth table.
    #[test]
    fn nnf_preserves_models(
        pv in proptest::bool::ANY,
        qv in proptest::bool::ANY,
    ) {
        let mut tm = TermManager::new();
        let p = tm.mk_bool_var("p");
        let q = tm.mk_bool_var("q");
        let iff = tm.mk_iff(p, q);
        let formula = tm.mk_not(iff);
        let nnf = tm.to_nnf(formula);

        let mut assignment = FxHashMap::default();
        assignment.insert(p, pv);
        assignment.insert(q, qv);
        let lhs = tm.substitute_bools(formula, &assignment).unwrap();
        let rhs = tm.substitute_bools(nnf, &assignment).unwrap();
        prop_assert_eq!(lhs, rhs);
    }
}
