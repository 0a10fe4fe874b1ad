//! Weight decomposition.
//!
//! A piecewise-polynomial weight term is split into a Boolean *skeleton*
//! plus a lazy *leaf registry*. Every distinct if-then-else condition gets a
//! fresh label `l`; the skeleton is the conjunction of the biconditionals
//! `l <-> c`. Conjoined with the support, the skeleton forces the
//! enumerator to decide every label, so each enumerated cell pins down
//! exactly one polynomial leaf of the weight.
//!
//! Structurally identical conditions share one label: conditions are
//! hash-consed (and LRA atoms canonicalized) by the term layer, so identity
//! is id equality.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use tracing::debug;
use wmirs_core::{TermId, TermKind, TermManager};

use crate::error::{Result, WmiError};

/// A decomposed weight function.
pub struct Weights {
    term: TermId,
    labelled: TermId,
    labels: Vec<TermId>,
    conditions: Vec<TermId>,
    skeleton: TermId,
    condition_atoms: Vec<TermId>,
    label_index: FxHashMap<TermId, usize>,
    // leaf registry, filled per label-polarity vector on demand
    leaf_cache: RefCell<FxHashMap<Vec<bool>, TermId>>,
}

impl Weights {
    /// Decompose a weight term.
    ///
    /// Fails with [`WmiError::UnsupportedWeight`] when some leaf is not a
    /// polynomial (symbolic division, Boolean-sorted subterm, ...).
    pub fn new(tm: &mut TermManager, weight: TermId) -> Result<Self> {
        validate_weight(tm, weight)?;

        let mut conditions: Vec<TermId> = Vec::new();
        collect_conditions(tm, weight, &mut conditions);

        let mut labels = Vec::with_capacity(conditions.len());
        let mut substitution: FxHashMap<TermId, TermId> = FxHashMap::default();
        for &cond in &conditions {
            let label = tm.fresh_cond_label();
            labels.push(label);
            substitution.insert(cond, label);
        }
        let labelled = tm.substitute(weight, &substitution)?;

        let mut clauses = Vec::with_capacity(conditions.len());
        for (&label, &cond) in labels.iter().zip(conditions.iter()) {
            clauses.push(tm.mk_iff(label, cond));
        }
        let skeleton = tm.mk_and(clauses);

        let mut condition_atoms: Vec<TermId> = conditions
            .iter()
            .flat_map(|&c| tm.atoms(c).iter().copied())
            .collect();
        condition_atoms.sort_unstable();
        condition_atoms.dedup();

        let label_index = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();

        debug!(
            conditions = conditions.len(),
            atoms = condition_atoms.len(),
            "decomposed weight into skeleton and leaf registry"
        );

        Ok(Self {
            term: weight,
            labelled,
            labels,
            conditions,
            skeleton,
            condition_atoms,
            label_index,
            leaf_cache: RefCell::new(FxHashMap::default()),
        })
    }

    /// The original weight term.
    #[must_use]
    pub fn term(&self) -> TermId {
        self.term
    }

    /// The skeleton formula `/\ (l_i <-> c_i)`.
    #[must_use]
    pub fn skeleton(&self) -> TermId {
        self.skeleton
    }

    /// The fresh condition labels, in condition order.
    #[must_use]
    pub fn labels(&self) -> &[TermId] {
        &self.labels
    }

    /// Atoms occurring in the weight's conditions.
    #[must_use]
    pub fn atoms(&self) -> &[TermId] {
        &self.condition_atoms
    }

    /// Rank of each condition atom: the index of the first condition it
    /// appears in. Used to order theory decisions in the enumerator.
    #[must_use]
    pub fn atom_ranks(&self, tm: &TermManager) -> FxHashMap<TermId, usize> {
        let mut ranks = FxHashMap::default();
        for (index, &cond) in self.conditions.iter().enumerate() {
            for &atom in tm.atoms(cond) {
                ranks.entry(atom).or_insert(index);
            }
        }
        ranks
    }

    /// Resolve the polynomial leaf selected by a truth assignment.
    ///
    /// The assignment may fix each condition either through its label or
    /// through the condition's own atoms (a total assignment determines
    /// every condition). A condition that is fixed by neither is an
    /// invariant break and yields [`WmiError::LeafUnderdetermined`].
    pub fn leaf_of(
        &self,
        tm: &mut TermManager,
        assignment: &FxHashMap<TermId, bool>,
    ) -> Result<TermId> {
        let mut vector = Vec::with_capacity(self.labels.len());
        for (index, &label) in self.labels.iter().enumerate() {
            if let Some(&value) = assignment.get(&label) {
                vector.push(value);
                continue;
            }
            let residual = tm.substitute_bools(self.conditions[index], assignment)?;
            if residual == tm.mk_true() {
                vector.push(true);
            } else if residual == tm.mk_false() {
                vector.push(false);
            } else {
                return Err(WmiError::LeafUnderdetermined(tm.display(self.conditions[index])));
            }
        }

        if let Some(&leaf) = self.leaf_cache.borrow().get(&vector) {
            return Ok(leaf);
        }
        let leaf = self.evaluate(tm, self.labelled, &vector)?;
        self.leaf_cache.borrow_mut().insert(vector, leaf);
        Ok(leaf)
    }

    /// Walk the labelled weight, choosing branches by label polarity.
    fn evaluate(&self, tm: &mut TermManager, node: TermId, vector: &[bool]) -> Result<TermId> {
        match tm.kind(node).clone() {
            TermKind::RealIte(cond, then, els) => {
                let index = self.label_index.get(&cond).copied().ok_or_else(|| {
                    WmiError::LeafUnderdetermined(tm.display(cond))
                })?;
                let branch = if vector[index] { then } else { els };
                self.evaluate(tm, branch, vector)
            }
            TermKind::RealConst(_) | TermKind::RealVar(_) => Ok(node),
            TermKind::Add(args) => {
                let args = self.evaluate_all(tm, &args, vector)?;
                Ok(tm.mk_add(args))
            }
            TermKind::Mul(args) => {
                let args = self.evaluate_all(tm, &args, vector)?;
                Ok(tm.mk_mul(args))
            }
            TermKind::Sub(a, b) => {
                let a = self.evaluate(tm, a, vector)?;
                let b = self.evaluate(tm, b, vector)?;
                Ok(tm.mk_sub(a, b))
            }
            TermKind::Pow(base, exp) => {
                let base = self.evaluate(tm, base, vector)?;
                Ok(tm.mk_pow(base, exp))
            }
            other => Err(WmiError::UnsupportedWeight(format!(
                "unexpected node in labelled weight: {other:?}"
            ))),
        }
    }

    fn evaluate_all(
        &self,
        tm: &mut TermManager,
        args: &[TermId],
        vector: &[bool],
    ) -> Result<Vec<TermId>> {
        args.iter()
            .map(|&a| self.evaluate(tm, a, vector))
            .collect()
    }
}

/// Check that every leaf of the weight is a polynomial over the reals.
fn validate_weight(tm: &TermManager, node: TermId) -> Result<()> {
    match tm.kind(node) {
        TermKind::RealConst(_) | TermKind::RealVar(_) => Ok(()),
        TermKind::Add(args) | TermKind::Mul(args) => {
            for &arg in args.iter() {
                validate_weight(tm, arg)?;
            }
            Ok(())
        }
        TermKind::Sub(a, b) => {
            validate_weight(tm, *a)?;
            validate_weight(tm, *b)
        }
        TermKind::Pow(base, _) => validate_weight(tm, *base),
        TermKind::RealIte(cond, then, els) => {
            validate_condition(tm, *cond)?;
            validate_weight(tm, *then)?;
            validate_weight(tm, *els)
        }
        TermKind::Div(_, _) => Err(WmiError::UnsupportedWeight(format!(
            "symbolic division: {}",
            tm.display(node)
        ))),
        _ => Err(WmiError::UnsupportedWeight(tm.display(node))),
    }
}

/// Conditions must be Boolean formulas over atoms.
fn validate_condition(tm: &TermManager, node: TermId) -> Result<()> {
    match tm.kind(node) {
        TermKind::True
        | TermKind::False
        | TermKind::BoolVar(_)
        | TermKind::LinearAtom { .. }
        | TermKind::Eq(_, _) => Ok(()),
        TermKind::Not(a) => validate_condition(tm, *a),
        TermKind::And(args) | TermKind::Or(args) => {
            for &arg in args.iter() {
                validate_condition(tm, arg)?;
            }
            Ok(())
        }
        TermKind::Implies(a, b) | TermKind::Iff(a, b) | TermKind::Xor(a, b) => {
            validate_condition(tm, *a)?;
            validate_condition(tm, *b)
        }
        TermKind::Ite(c, t, e) => {
            validate_condition(tm, *c)?;
            validate_condition(tm, *t)?;
            validate_condition(tm, *e)
        }
        _ => Err(WmiError::UnsupportedWeight(format!(
            "weight condition is not Boolean: {}",
            tm.display(node)
        ))),
    }
}

/// Collect the distinct ITE conditions of a weight term, outermost first.
fn collect_conditions(tm: &TermManager, node: TermId, out: &mut Vec<TermId>) {
    match tm.kind(node) {
        TermKind::RealIte(cond, then, els) => {
            if !out.contains(cond) {
                out.push(*cond);
            }
            collect_conditions(tm, *then, out);
            collect_conditions(tm, *els, out);
        }
        kind => {
            for child in tm.children(kind) {
                collect_conditions(tm, child, out);
            }
        }
    }
}
