//! Substitution and normal-form conversion.
//!
//! Substitution replaces interned nodes by other nodes and rebuilds the
//! spine through the `mk_*` constructors, so the local simplifications of
//! [`TermManager`] are re-applied bottom-up. Substituting truth values for
//! atoms therefore doubles as the model-preserving Boolean simplifier used
//! by the enumerator: a formula is determined by a partial assignment
//! exactly when the rebuilt residual is a constant.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::term::{TermId, TermKind, TermManager};

impl TermManager {
    /// Replace every occurrence of a mapped node by its image and rebuild.
    ///
    /// Map keys may be arbitrary nodes (atoms, whole conditions, real
    /// variables); lookup happens before descending, so mapping a compound
    /// node replaces it wholesale. Rebuilding a linear atom whose variables
    /// are substituted re-canonicalizes the constraint and can fail when
    /// the image is non-linear.
    pub fn substitute(&mut self, root: TermId, map: &FxHashMap<TermId, TermId>) -> Result<TermId> {
        let mut memo: FxHashMap<TermId, TermId> = FxHashMap::default();
        self.subst_rec(root, map, &mut memo)
    }

    /// Substitute truth values for atoms.
    pub fn substitute_bools(
        &mut self,
        root: TermId,
        assignment: &FxHashMap<TermId, bool>,
    ) -> Result<TermId> {
        let map: FxHashMap<TermId, TermId> = assignment
            .iter()
            .map(|(&atom, &value)| (atom, self.mk_bool(value)))
            .collect();
        self.substitute(root, &map)
    }

    fn subst_rec(
        &mut self,
        id: TermId,
        map: &FxHashMap<TermId, TermId>,
        memo: &mut FxHashMap<TermId, TermId>,
    ) -> Result<TermId> {
        if let Some(&mapped) = map.get(&id) {
            return Ok(mapped);
        }
        if let Some(&done) = memo.get(&id) {
            return Ok(done);
        }
        let result = match self.kind(id).clone() {
            TermKind::True
            | TermKind::False
            | TermKind::BoolVar(_)
            | TermKind::RealVar(_)
            | TermKind::RealConst(_) => id,
            TermKind::Not(a) => {
                let a = self.subst_rec(a, map, memo)?;
                self.mk_not(a)
            }
            TermKind::And(args) => {
                let args = self.subst_args(&args, map, memo)?;
                self.mk_and(args)
            }
            TermKind::Or(args) => {
                let args = self.subst_args(&args, map, memo)?;
                self.mk_or(args)
            }
            TermKind::Implies(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_implies(a, b)
            }
            TermKind::Iff(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_iff(a, b)
            }
            TermKind::Xor(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_xor(a, b)
            }
            TermKind::Ite(c, t, e) => {
                let c = self.subst_rec(c, map, memo)?;
                let t = self.subst_rec(t, map, memo)?;
                let e = self.subst_rec(e, map, memo)?;
                self.mk_ite(c, t, e)
            }
            TermKind::Eq(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_eq(a, b)
            }
            TermKind::LinearAtom { ref terms, ref bound, strict } => {
                if terms.iter().all(|(var, _)| !map.contains_key(var)) {
                    id
                } else {
                    // Rebuild the left-hand side with the images and let the
                    // constructor re-canonicalize.
                    let mut parts = Vec::with_capacity(terms.len());
                    for (var, coeff) in terms.iter() {
                        let image = self.subst_rec(*var, map, memo)?;
                        let c = self.mk_real(num_rational::BigRational::from(coeff.clone()));
                        parts.push(self.mk_mul(vec![c, image]));
                    }
                    let lhs = self.mk_add(parts);
                    let rhs = self.mk_real(bound.clone());
                    if strict {
                        self.mk_lt(lhs, rhs)?
                    } else {
                        self.mk_le(lhs, rhs)?
                    }
                }
            }
            TermKind::Add(args) => {
                let args = self.subst_args(&args, map, memo)?;
                self.mk_add(args)
            }
            TermKind::Sub(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_sub(a, b)
            }
            TermKind::Mul(args) => {
                let args = self.subst_args(&args, map, memo)?;
                self.mk_mul(args)
            }
            TermKind::Pow(a, exp) => {
                let a = self.subst_rec(a, map, memo)?;
                self.mk_pow(a, exp)
            }
            TermKind::Div(a, b) => {
                let a = self.subst_rec(a, map, memo)?;
                let b = self.subst_rec(b, map, memo)?;
                self.mk_div(a, b)?
            }
            TermKind::RealIte(c, t, e) => {
                let c = self.subst_rec(c, map, memo)?;
                let t = self.subst_rec(t, map, memo)?;
                let e = self.subst_rec(e, map, memo)?;
                self.mk_real_ite(c, t, e)
            }
        };
        memo.insert(id, result);
        Ok(result)
    }

    fn subst_args(
        &mut self,
        args: &[TermId],
        map: &FxHashMap<TermId, TermId>,
        memo: &mut FxHashMap<TermId, TermId>,
    ) -> Result<Vec<TermId>> {
        args.iter().map(|&a| self.subst_rec(a, map, memo)).collect()
    }

    /// Negation normal form: negations pushed down to literals, `Implies`,
    /// `Iff`, `Xor` and Boolean `Ite` expanded into and/or.
    pub fn to_nnf(&mut self, root: TermId) -> TermId {
        let mut memo: FxHashMap<(TermId, bool), TermId> = FxHashMap::default();
        self.nnf_rec(root, true, &mut memo)
    }

    fn nnf_rec(
        &mut self,
        id: TermId,
        polarity: bool,
        memo: &mut FxHashMap<(TermId, bool), TermId>,
    ) -> TermId {
        if let Some(&done) = memo.get(&(id, polarity)) {
            return done;
        }
        let result = match self.kind(id).clone() {
            TermKind::True | TermKind::False => {
                if polarity {
                    id
                } else {
                    self.mk_not(id)
                }
            }
            TermKind::BoolVar(_) | TermKind::LinearAtom { .. } | TermKind::Eq(_, _) => {
                if polarity {
                    id
                } else {
                    self.mk_not(id)
                }
            }
            TermKind::Not(a) => self.nnf_rec(a, !polarity, memo),
            TermKind::And(args) => {
                let converted: Vec<TermId> = args
                    .iter()
                    .map(|&a| self.nnf_rec(a, polarity, memo))
                    .collect();
                if polarity {
                    self.mk_and(converted)
                } else {
                    self.mk_or(converted)
                }
            }
            TermKind::Or(args) => {
                let converted: Vec<TermId> = args
                    .iter()
                    .map(|&a| self.nnf_rec(a, polarity, memo))
                    .collect();
                if polarity {
                    self.mk_or(converted)
                } else {
                    self.mk_and(converted)
                }
            }
            TermKind::Implies(a, b) => {
                if polarity {
                    let na = self.nnf_rec(a, false, memo);
                    let pb = self.nnf_rec(b, true, memo);
                    self.mk_or(vec![na, pb])
                } else {
                    let pa = self.nnf_rec(a, true, memo);
                    let nb = self.nnf_rec(b, false, memo);
                    self.mk_and(vec![pa, nb])
                }
            }
            TermKind::Iff(a, b) => {
                // (a <-> b)  =  (a ∧ b) ∨ (¬a ∧ ¬b); negation swaps one side.
                let pa = self.nnf_rec(a, true, memo);
                let na = self.nnf_rec(a, false, memo);
                let pb = self.nnf_rec(b, polarity, memo);
                let nb = self.nnf_rec(b, !polarity, memo);
                let both = self.mk_and(vec![pa, pb]);
                let neither = self.mk_and(vec![na, nb]);
                self.mk_or(vec![both, neither])
            }
            TermKind::Xor(a, b) => {
                let pa = self.nnf_rec(a, true, memo);
                let na = self.nnf_rec(a, false, memo);
                let pb = self.nnf_rec(b, !polarity, memo);
                let nb = self.nnf_rec(b, polarity, memo);
                let both = self.mk_and(vec![pa, pb]);
                let neither = self.mk_and(vec![na, nb]);
                self.mk_or(vec![both, neither])
            }
            TermKind::Ite(c, t, e) => {
                let pc = self.nnf_rec(c, true, memo);
                let nc = self.nnf_rec(c, false, memo);
                let t = self.nnf_rec(t, polarity, memo);
                let e = self.nnf_rec(e, polarity, memo);
                let left = self.mk_or(vec![nc, t]);
                let right = self.mk_or(vec![pc, e]);
                self.mk_and(vec![left, right])
            }
            // Real-sorted kinds are opaque to Boolean normalization.
            _ => {
                if polarity {
                    id
                } else {
                    self.mk_not(id)
                }
            }
        };
        memo.insert((id, polarity), result);
        result
    }

    /// Conjunctive normal form by NNF conversion and distribution.
    ///
    /// Exponential in the worst case; intended for formula-level reasoning
    /// over the moderately sized supports this solver targets.
    pub fn to_cnf(&mut self, root: TermId) -> TermId {
        let nnf = self.to_nnf(root);
        let clauses = self.cnf_clauses(nnf);
        let mut conj = Vec::with_capacity(clauses.len());
        for clause in clauses {
            conj.push(self.mk_or(clause));
        }
        self.mk_and(conj)
    }

    fn cnf_clauses(&mut self, id: TermId) -> Vec<Vec<TermId>> {
        if id == self.mk_true() {
            return Vec::new();
        }
        if id == self.mk_false() {
            return vec![Vec::new()];
        }
        match self.kind(id).clone() {
            TermKind::And(args) => args.iter().flat_map(|&a| self.cnf_clauses(a)).collect(),
            TermKind::Or(args) => {
                let mut acc: Vec<Vec<TermId>> = vec![Vec::new()];
                for &arg in &args {
                    let sub = self.cnf_clauses(arg);
                    let mut next = Vec::with_capacity(acc.len() * sub.len().max(1));
                    if sub.is_empty() {
                        // disjunct is `true`: the whole clause set is trivial
                        return Vec::new();
                    }
                    for left in &acc {
                        for right in &sub {
                            let mut clause = left.clone();
                            clause.extend_from_slice(right);
                            next.push(clause);
                        }
                    }
                    acc = next;
                }
                acc
            }
            _ => vec![vec![id]],
        }
    }
}
