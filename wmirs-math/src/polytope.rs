//! Convex H-polytopes.
//!
//! A polytope is a conjunction of half-spaces over the ordered integration
//! domain. Vertex enumeration solves every n-subset of constraint
//! hyperplanes and keeps the solutions satisfying all constraints (closed
//! relaxation; strictness is metadata). Triangulation is the pulling
//! scheme: cone the first vertex over the triangulations of the facets it
//! does not lie on.

use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::FxHashSet;

use crate::constraint::{ConstraintSet, LinearConstraint, VarBounds};
use crate::error::{MathError, Result};
use crate::matrix::{affine_rank, solve_square};

/// A convex polytope in H-representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polytope {
    dim: usize,
    constraints: Vec<LinearConstraint>,
}

impl Polytope {
    /// Build a polytope from half-spaces; constraints are normalized and
    /// deduplicated.
    #[must_use]
    pub fn new(dim: usize, constraints: Vec<LinearConstraint>) -> Self {
        let mut normalized: Vec<LinearConstraint> = constraints
            .into_iter()
            .map(|c| c.normalized())
            .collect();
        normalized.sort_unstable_by(|a, b| format!("{a}").cmp(&format!("{b}")));
        normalized.dedup();
        Self {
            dim,
            constraints: normalized,
        }
    }

    /// Dimension of the ambient space.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The half-spaces.
    #[must_use]
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// View the polytope as a constraint set for feasibility queries.
    #[must_use]
    pub fn constraint_set(&self) -> ConstraintSet {
        let mut set = ConstraintSet::new(self.dim);
        for c in &self.constraints {
            set.push(c.clone());
        }
        set
    }

    /// True when the polytope contains no point.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.constraint_set().is_feasible()?)
    }

    /// Exact per-variable bounds.
    ///
    /// `Ok(None)` for an empty polytope; [`MathError::Unbounded`] when some
    /// variable has no finite bound on one side.
    pub fn bounding_box(&self) -> Result<Option<Vec<(BigRational, BigRational)>>> {
        let set = self.constraint_set();
        let mut out = Vec::with_capacity(self.dim);
        for var in 0..self.dim {
            let Some(VarBounds { lower, upper }) = set.variable_bounds(var)? else {
                return Ok(None);
            };
            match (lower, upper) {
                (Some((lo, _)), Some((hi, _))) => out.push((lo, hi)),
                _ => return Err(MathError::Unbounded(var)),
            }
        }
        Ok(Some(out))
    }

    /// Enumerate the vertices of the (closure of the) polytope.
    #[must_use]
    pub fn vertices(&self) -> Vec<Vec<BigRational>> {
        let m = self.constraints.len();
        if m < self.dim || self.dim == 0 {
            return Vec::new();
        }
        let mut seen: FxHashSet<Vec<BigRational>> = FxHashSet::default();
        let mut out = Vec::new();
        let mut combo: Vec<usize> = (0..self.dim).collect();
        loop {
            let a: Vec<Vec<BigRational>> = combo
                .iter()
                .map(|&i| self.constraints[i].coeffs.clone())
                .collect();
            let b: Vec<BigRational> = combo
                .iter()
                .map(|&i| self.constraints[i].bound.clone())
                .collect();
            if let Some(point) = solve_square(&a, &b) {
                if self
                    .constraints
                    .iter()
                    .all(|c| c.satisfied_closed(&point))
                    && seen.insert(point.clone())
                {
                    out.push(point);
                }
            }
            if !next_combination(&mut combo, m) {
                break;
            }
        }
        out
    }

    /// Pulling triangulation: partition the polytope into simplices given
    /// its vertex list. Returns index sets of size `dim + 1`.
    ///
    /// The polytope must be bounded; lower-dimensional input yields an
    /// empty triangulation (zero volume).
    #[must_use]
    pub fn triangulate(&self, vertices: &[Vec<BigRational>]) -> Vec<Vec<usize>> {
        if vertices.len() < self.dim + 1 || affine_rank(vertices) < self.dim {
            return Vec::new();
        }
        let all: Vec<usize> = (0..vertices.len()).collect();
        self.triangulate_face(&all, self.dim, vertices)
    }

    fn triangulate_face(
        &self,
        face: &[usize],
        face_dim: usize,
        vertices: &[Vec<BigRational>],
    ) -> Vec<Vec<usize>> {
        if face.len() == face_dim + 1 {
            return vec![face.to_vec()];
        }
        if face_dim == 0 {
            return vec![vec![face[0]]];
        }
        let apex = face[0];
        let mut out = Vec::new();
        let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
        for constraint in &self.constraints {
            let tight: Vec<usize> = face
                .iter()
                .copied()
                .filter(|&v| constraint.lhs_at(&vertices[v]) == constraint.bound)
                .collect();
            if tight.contains(&apex) || tight.is_empty() {
                continue;
            }
            let points: Vec<Vec<BigRational>> =
                tight.iter().map(|&v| vertices[v].clone()).collect();
            if affine_rank(&points) != face_dim - 1 {
                continue;
            }
            if !seen.insert(tight.clone()) {
                continue;
            }
            for sub in self.triangulate_face(&tight, face_dim - 1, vertices) {
                let mut simplex = Vec::with_capacity(face_dim + 1);
                simplex.push(apex);
                simplex.extend(sub);
                out.push(simplex);
            }
        }
        out
    }

    /// Canonical textual fingerprint of the half-space set, stable across
    /// runs; used as (part of) the integration cache key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self.constraints.iter().map(|c| format!("{c}")).collect();
        parts.sort_unstable();
        format!("P{}[{}]", self.dim, parts.join(";"))
    }
}

/// Advance `combo` to the next k-combination of `0..m`; false at the end.
fn next_combination(combo: &mut [usize], m: usize) -> bool {
    let k = combo.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if combo[i] < m - (k - i) {
            combo[i] += 1;
            for j in (i + 1)..k {
                combo[j] = combo[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Half-space volume helper: product of interval widths of a box.
#[must_use]
pub fn box_volume(bounds: &[(BigRational, BigRational)]) -> BigRational {
    let mut volume = BigRational::from_integer(1.into());
    for (lo, hi) in bounds {
        let width = hi - lo;
        if width <= BigRational::zero() {
            return BigRational::zero();
        }
        volume *= width;
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn rat(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn row(coeffs: &[i64], bound: i64) -> LinearConstraint {
        LinearConstraint::new(
            coeffs.iter().map(|&c| rat(c)).collect(),
            rat(bound),
            false,
        )
    }

    fn unit_square() -> Polytope {
        Polytope::new(
            2,
            vec![
                row(&[1, 0], 1),
                row(&[-1, 0], 0),
                row(&[0, 1], 1),
                row(&[0, -1], 0),
            ],
        )
    }

    #[test]
    fn test_unit_square_vertices() {
        let square = unit_square();
        let verts = square.vertices();
        assert_eq!(verts.len(), 4);
        assert!(verts.contains(&vec![rat(0), rat(0)]));
        assert!(verts.contains(&vec![rat(1), rat(1)]));
    }

    #[test]
    fn test_unit_square_triangulates_into_two_triangles() {
        let square = unit_square();
        let verts = square.vertices();
        let simplices = square.triangulate(&verts);
        assert_eq!(simplices.len(), 2);
        for s in &simplices {
            assert_eq!(s.len(), 3);
        }
    }

    #[test]
    fn test_empty_polytope_detected() {
        let empty = Polytope::new(1, vec![row(&[1], 0), row(&[-1], -1)]);
        assert!(empty.is_empty().unwrap());
        assert_eq!(empty.bounding_box().unwrap(), None);
    }

    #[test]
    fn test_degenerate_polytope_has_no_simplices() {
        // x <= 0 and x >= 0: a line segment's worth of y is still
        // 1-dimensional inside a 2-dimensional domain
        let slab = Polytope::new(
            2,
            vec![
                row(&[1, 0], 0),
                row(&[-1, 0], 0),
                row(&[0, 1], 1),
                row(&[0, -1], 0),
            ],
        );
        let verts = slab.vertices();
        assert_eq!(verts.len(), 2);
        assert!(slab.triangulate(&verts).is_empty());
    }

    #[test]
    fn test_bounding_box_and_unbounded() {
        let square = unit_square();
        let bounds = square.bounding_box().unwrap().unwrap();
        assert_eq!(bounds, vec![(rat(0), rat(1)), (rat(0), rat(1))]);

        let half = Polytope::new(1, vec![row(&[-1], 0)]);
        assert!(matches!(half.bounding_box(), Err(MathError::Unbounded(0))));
    }

    #[test]
    fn test_duplicate_halfspaces_collapse() {
        let p = Polytope::new(1, vec![row(&[1], 1), row(&[2], 2), row(&[-1], 0)]);
        assert_eq!(p.constraints().len(), 2);
    }

    #[test]
    fn test_fingerprint_is_order_insensitive() {
        let a = Polytope::new(1, vec![row(&[1], 1), row(&[-1], 0)]);
        let b = Polytope::new(1, vec![row(&[-1], 0), row(&[1], 1)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
