//! Conversion of truth assignments into convex integration problems.
//!
//! Each enumerated cell becomes a pair of an H-polytope (from the assigned
//! linear literals) and a polynomial integrand (the weight leaf selected by
//! the cell).
//!
//! True equalities with a variable on one side act as *aliases*: the
//! variable is eliminated by substitution from both the constraints and the
//! integrand, in an order obtained by topologically sorting the alias
//! dependency graph. Equalities between non-variables contribute a pair of
//! half-spaces (a degenerate slab of zero volume unless they cancel), and
//! negated equalities remove a measure-zero set and are dropped.

use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::FxHashMap;
use tracing::trace;
use wmirs_core::{TermId, TermKind, TermManager};
use wmirs_math::{LinearConstraint, Polynomial, Polytope};

use crate::domain::Domain;
use crate::enumeration::Assignment;
use crate::error::{Result, WmiError};
use crate::weights::Weights;

/// Converts enumerator cells into `(Polytope, Polynomial)` pairs over a
/// fixed integration domain.
pub struct AssignmentConverter<'a> {
    weights: &'a Weights,
    domain: &'a Domain,
}

impl<'a> AssignmentConverter<'a> {
    /// Create a converter for one query.
    #[must_use]
    pub fn new(weights: &'a Weights, domain: &'a Domain) -> Self {
        Self { weights, domain }
    }

    /// Convert one cell.
    pub fn convert(
        &self,
        tm: &mut TermManager,
        assignment: &Assignment,
    ) -> Result<(Polytope, Polynomial)> {
        // Deterministic processing order regardless of hash iteration.
        let mut atoms: Vec<(TermId, bool)> =
            assignment.iter().map(|(&a, &v)| (a, v)).collect();
        atoms.sort_unstable_by_key(|(a, _)| *a);

        // Split the cell into aliases and half-space literals.
        let mut aliases: FxHashMap<TermId, TermId> = FxHashMap::default();
        let mut alias_order_input: Vec<TermId> = Vec::new();
        let mut literals: Vec<(TermId, bool)> = Vec::new();
        for &(atom, value) in &atoms {
            match tm.kind(atom).clone() {
                TermKind::LinearAtom { .. } => literals.push((atom, value)),
                TermKind::Eq(lhs, rhs) => {
                    if !value {
                        continue; // measure zero
                    }
                    // Only variables outside the integration domain are
                    // eliminated by substitution; an equality between
                    // domain entities stays a (degenerate) half-space pair.
                    let eliminable =
                        |tm: &TermManager, v: TermId| {
                            matches!(tm.kind(v), TermKind::RealVar(_))
                                && self.domain.index_of(v).is_none()
                        };
                    let alias = if eliminable(tm, lhs) {
                        Some((lhs, rhs))
                    } else if eliminable(tm, rhs) {
                        Some((rhs, lhs))
                    } else {
                        None
                    };
                    match alias {
                        Some((var, expr)) => {
                            if aliases.insert(var, expr).is_some() {
                                return Err(WmiError::AliasClash(tm.display(var)));
                            }
                            alias_order_input.push(var);
                        }
                        None => {
                            // a = b with no variable side: keep both bounds
                            for (l, r) in [(lhs, rhs), (rhs, lhs)] {
                                let le = tm.mk_le(l, r)?;
                                literals.push((le, true));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let order = toposort_aliases(tm, &aliases, &alias_order_input)?;

        // Weight leaf of this cell, then alias elimination on everything.
        let mut leaf = self.weights.leaf_of(tm, assignment)?;
        for &var in &order {
            let mut map = FxHashMap::default();
            map.insert(var, aliases[&var]);
            leaf = tm.substitute(leaf, &map)?;
            for (atom, _) in literals.iter_mut() {
                *atom = tm.substitute(*atom, &map)?;
            }
        }

        let dim = self.domain.dim();
        let mut rows: Vec<LinearConstraint> = Vec::new();
        for &(atom, polarity) in &literals {
            match tm.kind(atom).clone() {
                TermKind::True => {
                    if !polarity {
                        rows.push(contradiction_row(dim));
                    }
                }
                TermKind::False => {
                    if polarity {
                        rows.push(contradiction_row(dim));
                    }
                }
                TermKind::LinearAtom { ref terms, ref bound, strict } => {
                    let row = self.dense_row(tm, terms, bound.clone(), strict)?;
                    rows.push(if polarity { row } else { row.negated() });
                }
                other => {
                    return Err(WmiError::InternalInconsistency(format!(
                        "literal reduced to {other:?}"
                    )))
                }
            }
        }

        let polytope = Polytope::new(dim, rows);
        let integrand = term_to_polynomial(tm, leaf, self.domain)?;
        trace!(
            halfspaces = polytope.constraints().len(),
            monomials = integrand.len(),
            "converted assignment cell"
        );
        Ok((polytope, integrand))
    }

    fn dense_row(
        &self,
        tm: &TermManager,
        terms: &[(TermId, num_bigint::BigInt)],
        bound: BigRational,
        strict: bool,
    ) -> Result<LinearConstraint> {
        let mut coeffs = vec![BigRational::zero(); self.domain.dim()];
        for (var, coeff) in terms {
            let index = self
                .domain
                .index_of(*var)
                .ok_or_else(|| WmiError::UndefinedVariable(tm.display(*var)))?;
            coeffs[index] = BigRational::from_integer(coeff.clone());
        }
        Ok(LinearConstraint::new(coeffs, bound, strict))
    }
}

/// Expand a leaf term into a polynomial over the domain order.
pub fn term_to_polynomial(
    tm: &TermManager,
    term: TermId,
    domain: &Domain,
) -> Result<Polynomial> {
    let dim = domain.dim();
    match tm.kind(term) {
        TermKind::RealConst(c) => Ok(Polynomial::constant(dim, c.clone())),
        TermKind::RealVar(_) => {
            let index = domain
                .index_of(term)
                .ok_or_else(|| WmiError::UndefinedVariable(tm.display(term)))?;
            Ok(Polynomial::variable(dim, index))
        }
        TermKind::Add(args) => {
            let mut acc = Polynomial::zero(dim);
            for &arg in args.iter() {
                acc = acc.add(&term_to_polynomial(tm, arg, domain)?);
            }
            Ok(acc)
        }
        TermKind::Sub(a, b) => {
            let left = term_to_polynomial(tm, *a, domain)?;
            let right = term_to_polynomial(tm, *b, domain)?;
            Ok(left.sub(&right))
        }
        TermKind::Mul(args) => {
            let mut acc = Polynomial::constant(dim, BigRational::from_integer(1.into()));
            for &arg in args.iter() {
                acc = acc.mul(&term_to_polynomial(tm, arg, domain)?);
            }
            Ok(acc)
        }
        TermKind::Pow(base, exp) => {
            Ok(term_to_polynomial(tm, *base, domain)?.pow(*exp))
        }
        TermKind::RealIte(cond, _, _) => {
            Err(WmiError::LeafUnderdetermined(tm.display(*cond)))
        }
        _ => Err(WmiError::UnsupportedWeight(tm.display(term))),
    }
}

/// Order aliases so each is eliminated before the variables it mentions.
fn toposort_aliases(
    tm: &TermManager,
    aliases: &FxHashMap<TermId, TermId>,
    input_order: &[TermId],
) -> Result<Vec<TermId>> {
    // edges: alias -> aliased variables occurring in its definition
    let mut indegree: FxHashMap<TermId, usize> =
        input_order.iter().map(|&v| (v, 0)).collect();
    let mut dependents: FxHashMap<TermId, Vec<TermId>> = FxHashMap::default();
    for &var in input_order {
        for &dep in tm.reals(aliases[&var]) {
            if let Some(d) = indegree.get_mut(&dep) {
                *d += 1;
                dependents.entry(var).or_default().push(dep);
            }
        }
    }

    let mut queue: Vec<TermId> = input_order
        .iter()
        .copied()
        .filter(|v| indegree[v] == 0)
        .collect();
    let mut order = Vec::with_capacity(input_order.len());
    while let Some(var) = queue.pop() {
        order.push(var);
        if let Some(deps) = dependents.remove(&var) {
            for dep in deps {
                if let Some(d) = indegree.get_mut(&dep) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push(dep);
                    }
                }
            }
        }
    }
    if order.len() != input_order.len() {
        let cyclic: Vec<String> = input_order
            .iter()
            .filter(|v| !order.contains(v))
            .map(|&v| tm.display(v))
            .collect();
        return Err(WmiError::CyclicAlias(cyclic.join(", ")));
    }
    Ok(order)
}

fn contradiction_row(dim: usize) -> LinearConstraint {
    LinearConstraint::new(
        vec![BigRational::zero(); dim],
        -BigRational::from_integer(1.into()),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Weights;
    use num_bigint::BigInt;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn test_simple_interval_cell() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let zero = tm.mk_real_int(0);
        let one = tm.mk_real_int(1);
        let low = tm.mk_ge(x, zero).unwrap();
        let high = tm.mk_le(x, one).unwrap();
        let w = Weights::new(&mut tm, x).unwrap();
        let domain = Domain::new([x]);

        let mut cell = Assignment::default();
        cell.insert(low, true);
        cell.insert(high, true);

        let converter = AssignmentConverter::new(&w, &domain);
        let (polytope, integrand) = converter.convert(&mut tm, &cell).unwrap();
        assert_eq!(polytope.constraints().len(), 2);
        assert!(!polytope.is_empty().unwrap());
        assert_eq!(integrand, Polynomial::variable(1, 0));
    }

    #[test]
    fn test_false_literal_negates_halfspace() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let one = tm.mk_real_int(1);
        let le = tm.mk_le(x, one).unwrap();
        let w = Weights::new(&mut tm, one).unwrap();
        let domain = Domain::new([x]);

        let mut cell = Assignment::default();
        cell.insert(le, false); // x > 1

        let converter = AssignmentConverter::new(&w, &domain);
        let (polytope, _) = converter.convert(&mut tm, &cell).unwrap();
        let row = &polytope.constraints()[0];
        assert!(row.strict);
        assert_eq!(row.coeffs, vec![rat(-1)]);
        assert_eq!(row.bound, rat(-1));
    }

    #[test]
    fn test_alias_is_eliminated() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let y = tm.mk_real_var("y");
        let zero = tm.mk_real_int(0);
        let four = tm.mk_real_int(4);
        let minus_two = tm.mk_real_int(-2);
        let expr = tm.mk_add(vec![x, minus_two]);
        let alias = tm.mk_eq(y, expr);
        let low = tm.mk_ge(x, zero).unwrap();
        let high = tm.mk_le(y, four).unwrap();

        let w = Weights::new(&mut tm, y).unwrap();
        let domain = Domain::new([x]);

        let mut cell = Assignment::default();
        cell.insert(alias, true);
        cell.insert(low, true);
        cell.insert(high, true);

        let converter = AssignmentConverter::new(&w, &domain);
        let (polytope, integrand) = converter.convert(&mut tm, &cell).unwrap();

        // y <= 4 became x <= 6; the integrand is x - 2
        let bounds = polytope.bounding_box().unwrap().unwrap();
        assert_eq!(bounds, vec![(rat(0), rat(6))]);
        assert_eq!(integrand.eval(&[rat(6)]), rat(4));
    }

    #[test]
    fn test_cyclic_aliases_detected() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let y = tm.mk_real_var("y");
        let one = tm.mk_real_int(1);
        let x_expr = tm.mk_add(vec![y, one]);
        let y_expr = tm.mk_add(vec![x, one]);
        let a1 = tm.mk_eq(x, x_expr);
        let a2 = tm.mk_eq(y, y_expr);

        let w = Weights::new(&mut tm, one).unwrap();
        // neither variable is integrated over, so both become aliases
        let domain = Domain::new([]);
        let mut cell = Assignment::default();
        cell.insert(a1, true);
        cell.insert(a2, true);

        let converter = AssignmentConverter::new(&w, &domain);
        assert!(matches!(
            converter.convert(&mut tm, &cell),
            Err(WmiError::CyclicAlias(_))
        ));
    }

    #[test]
    fn test_out_of_domain_variable_rejected() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let z = tm.mk_real_var("z");
        let one = tm.mk_real_int(1);
        let le = tm.mk_le(z, one).unwrap();

        let w = Weights::new(&mut tm, one).unwrap();
        let domain = Domain::new([x]);
        let mut cell = Assignment::default();
        cell.insert(le, true);

        let converter = AssignmentConverter::new(&w, &domain);
        assert!(matches!(
            converter.convert(&mut tm, &cell),
            Err(WmiError::UndefinedVariable(_))
        ));
    }
}
