//! Truth-assignment enumeration.
//!
//! Both enumerator variants share one search engine: an explicit decision
//! stack over the hash-consed residual of `delta = support /\ query /\
//! skeleton`. Deciding an atom substitutes its truth value and re-simplifies;
//! a residual of `true` means the partial assignment determines the formula,
//! `false` triggers backtracking. Every theory decision is checked for
//! consistency against the already-asserted linear literals with an exact
//! Fourier-Motzkin decider, pruning infeasible subtrees.
//!
//! Disjointness of the emitted cells falls out of the decision tree: two
//! cells always differ on the atom decided at their lowest common frame.
//! Completeness holds because both phases of every decision are explored.
//!
//! The stream is lazy and cooperative: `next` performs bounded work, honors
//! a deadline and a cancellation token, and the producer state machine
//! (`Preparing -> Streaming -> Done | Errored`) can be dropped early
//! without leaking search state.

mod sae;
mod total;

pub use sae::SaEnumerator;
pub use total::TotalEnumerator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};
use wmirs_core::{TermId, TermKind, TermManager};
use wmirs_math::{ConstraintSet, LinearConstraint};

use crate::error::{Result, WmiError};
use crate::weights::Weights;

/// A (possibly partial) truth assignment over atoms.
pub type Assignment = FxHashMap<TermId, bool>;

/// An enumerator produces disjoint truth-assignment cells covering every
/// model of `support /\ query /\ skeleton`.
pub trait Enumerator {
    /// The support formula.
    fn support(&self) -> TermId;

    /// The decomposed weight function.
    fn weights(&self) -> &Weights;

    /// Start enumerating cells for a query.
    fn enumerate(&self, tm: &mut TermManager, query: TermId) -> Result<AssignmentStream>;
}

/// Emission policy of the shared search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationMode {
    /// Assign every atom; emitted cells are total, `k` is always 0.
    Total,
    /// Emit as soon as the residual is determined; unassigned Boolean
    /// atoms are reported through `k`.
    StructureAware,
}

/// Lifecycle of an [`AssignmentStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Built, no search step taken yet.
    Preparing,
    /// Producing cells.
    Streaming,
    /// Exhausted or cancelled.
    Done,
    /// A solver error ended the stream.
    Errored,
}

/// Theory rows asserted by each polarity of an atom.
struct AtomTheory {
    pos_rows: Vec<LinearConstraint>,
    neg_rows: Vec<LinearConstraint>,
    pos_sat: bool,
    neg_sat: bool,
}

struct Frame {
    residual_before: TermId,
    atom: TermId,
    second_phase: bool,
}

/// Lazy stream of `(assignment, k)` cells.
pub struct AssignmentStream {
    mode: EnumerationMode,
    state: StreamState,
    frames: Vec<Frame>,
    assignment: Assignment,
    residual: TermId,
    decision_order: Vec<TermId>,
    bool_universe: FxHashSet<TermId>,
    theory: FxHashMap<TermId, AtomTheory>,
    theory_rank: FxHashMap<TermId, usize>,
    n_reals: usize,
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
    emitted: usize,
}

impl AssignmentStream {
    pub(crate) fn new(
        tm: &mut TermManager,
        delta: TermId,
        mode: EnumerationMode,
        weights: &Weights,
    ) -> Result<Self> {
        let atoms: Vec<TermId> = tm.atoms(delta).to_vec();
        let reals: Vec<TermId> = tm.reals(delta).to_vec();
        let real_index: FxHashMap<TermId, usize> =
            reals.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let n_reals = reals.len();

        let mut bools: Vec<TermId> = Vec::new();
        let mut theory_atoms: Vec<TermId> = Vec::new();
        for &atom in &atoms {
            match tm.kind(atom) {
                TermKind::BoolVar(_) => bools.push(atom),
                TermKind::LinearAtom { .. } | TermKind::Eq(_, _) => theory_atoms.push(atom),
                other => {
                    return Err(WmiError::InternalInconsistency(format!(
                        "unhandled atom kind {other:?}"
                    )))
                }
            }
        }

        let mut theory: FxHashMap<TermId, AtomTheory> = FxHashMap::default();
        for &atom in &theory_atoms {
            theory.insert(atom, build_theory(tm, atom, &real_index, n_reals)?);
        }

        // Decision heuristic: Boolean atoms first (id order), then theory
        // atoms by their depth in the weight skeleton.
        let ranks = weights.atom_ranks(tm);
        let theory_rank: FxHashMap<TermId, usize> = theory_atoms
            .iter()
            .map(|&a| (a, ranks.get(&a).copied().unwrap_or(usize::MAX)))
            .collect();
        bools.sort_unstable();
        theory_atoms.sort_unstable_by_key(|a| (theory_rank[a], *a));
        let mut decision_order = bools.clone();
        decision_order.extend(theory_atoms.iter().copied());

        let bool_universe: FxHashSet<TermId> = bools
            .iter()
            .copied()
            .filter(|&b| !tm.is_cond_label(b))
            .collect();

        debug!(
            atoms = atoms.len(),
            bools = bool_universe.len(),
            theory = theory.len(),
            reals = n_reals,
            ?mode,
            "prepared enumeration"
        );

        Ok(Self {
            mode,
            state: StreamState::Preparing,
            frames: Vec::new(),
            assignment: Assignment::default(),
            residual: delta,
            decision_order,
            bool_universe,
            theory,
            theory_rank,
            n_reals,
            deadline: None,
            cancel: None,
            emitted: 0,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of cells emitted so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Boolean atoms counted by the `2^k` multiplier (condition labels are
    /// excluded).
    #[must_use]
    pub fn bool_universe(&self) -> &FxHashSet<TermId> {
        &self.bool_universe
    }

    /// Set the wall-clock deadline checked between decisions.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Attach a cancellation token polled between decisions.
    pub fn set_cancel_token(&mut self, token: Arc<AtomicBool>) {
        self.cancel = Some(token);
    }

    /// Cooperatively stop the stream; subsequent `next` calls return `None`.
    pub fn cancel(&mut self) {
        self.state = StreamState::Done;
    }

    /// Produce the next cell: a partial assignment plus the number of
    /// unassigned Boolean atoms it covers.
    pub fn next(&mut self, tm: &mut TermManager) -> Option<Result<(Assignment, u32)>> {
        match self.state {
            StreamState::Done | StreamState::Errored => return None,
            StreamState::Preparing => self.state = StreamState::Streaming,
            StreamState::Streaming => {}
        }
        match self.search(tm) {
            Ok(Some(cell)) => Some(Ok(cell)),
            Ok(None) => {
                self.state = StreamState::Done;
                None
            }
            Err(err) => {
                self.state = StreamState::Errored;
                Some(Err(err))
            }
        }
    }

    fn search(&mut self, tm: &mut TermManager) -> Result<Option<(Assignment, u32)>> {
        loop {
            if let Some(token) = &self.cancel {
                if token.load(Ordering::Relaxed) {
                    return Err(WmiError::Cancelled);
                }
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() > deadline {
                    return Err(WmiError::EnumerationTimeout);
                }
            }

            if self.residual == tm.mk_false() {
                if !self.backtrack(tm)? {
                    return Ok(None);
                }
                continue;
            }

            if self.residual == tm.mk_true() {
                if self.mode == EnumerationMode::Total {
                    if let Some(atom) = self.next_unassigned() {
                        self.decide(tm, atom, true)?;
                        continue;
                    }
                }
                // The theory decider re-validates the emitted cell; a
                // disagreement here means propagation went wrong.
                if !self.theory_feasible()? {
                    return Err(WmiError::InternalInconsistency(
                        "emitted cell is theory-infeasible".to_string(),
                    ));
                }
                let cell = self.assignment.clone();
                let k = self.unassigned_bools();
                self.emitted += 1;
                trace!(cell = self.emitted, k, "emitting assignment cell");
                if !self.backtrack(tm)? {
                    self.state = StreamState::Done;
                }
                return Ok(Some((cell, k)));
            }

            let atom = self.pick_atom(tm);
            self.decide(tm, atom, true)?;
        }
    }

    /// Choose the next decision atom from the residual: Boolean atoms
    /// first in id order, then theory atoms by skeleton rank.
    fn pick_atom(&self, tm: &TermManager) -> TermId {
        let atoms = tm.atoms(self.residual);
        debug_assert!(!atoms.is_empty(), "non-constant residual without atoms");
        let mut best_theory: Option<(usize, TermId)> = None;
        for &atom in atoms {
            if self.bool_universe.contains(&atom) || matches!(tm.kind(atom), TermKind::BoolVar(_)) {
                return atom;
            }
            let rank = self.theory_rank.get(&atom).copied().unwrap_or(usize::MAX);
            if best_theory.map_or(true, |(r, a)| (rank, atom) < (r, a)) {
                best_theory = Some((rank, atom));
            }
        }
        best_theory.map(|(_, a)| a).unwrap_or(atoms[0])
    }

    fn next_unassigned(&self) -> Option<TermId> {
        self.decision_order
            .iter()
            .copied()
            .find(|a| !self.assignment.contains_key(a))
    }

    fn unassigned_bools(&self) -> u32 {
        let assigned = self
            .assignment
            .keys()
            .filter(|a| self.bool_universe.contains(a))
            .count();
        (self.bool_universe.len() - assigned) as u32
    }

    fn decide(&mut self, tm: &mut TermManager, atom: TermId, phase: bool) -> Result<()> {
        self.frames.push(Frame {
            residual_before: self.residual,
            atom,
            second_phase: false,
        });
        self.apply(tm, atom, phase)
    }

    /// Apply a phase of the top frame's atom to the saved residual.
    fn apply(&mut self, tm: &mut TermManager, atom: TermId, phase: bool) -> Result<()> {
        self.assignment.insert(atom, phase);
        let base = self
            .frames
            .last()
            .map(|f| f.residual_before)
            .unwrap_or(self.residual);
        let mut map = Assignment::default();
        map.insert(atom, phase);
        self.residual = tm.substitute_bools(base, &map)?;
        if self.theory.contains_key(&atom) && !self.theory_feasible()? {
            self.residual = tm.mk_false();
        }
        Ok(())
    }

    /// Undo decisions until an unflipped frame is found; flip it.
    fn backtrack(&mut self, tm: &mut TermManager) -> Result<bool> {
        while let Some(mut frame) = self.frames.pop() {
            if frame.second_phase {
                self.assignment.remove(&frame.atom);
                continue;
            }
            frame.second_phase = true;
            let atom = frame.atom;
            self.frames.push(frame);
            self.apply(tm, atom, false)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Exact consistency check of the asserted theory literals.
    fn theory_feasible(&self) -> Result<bool> {
        let mut set = ConstraintSet::new(self.n_reals);
        for (&atom, &value) in &self.assignment {
            let Some(template) = self.theory.get(&atom) else {
                continue;
            };
            let (rows, sat) = if value {
                (&template.pos_rows, template.pos_sat)
            } else {
                (&template.neg_rows, template.neg_sat)
            };
            if !sat {
                return Ok(false);
            }
            for row in rows {
                set.push(row.clone());
            }
        }
        Ok(set.is_feasible()?)
    }
}

/// Build the theory rows asserted by each polarity of an atom.
fn build_theory(
    tm: &mut TermManager,
    atom: TermId,
    real_index: &FxHashMap<TermId, usize>,
    n_reals: usize,
) -> Result<AtomTheory> {
    match tm.kind(atom).clone() {
        TermKind::LinearAtom { ref terms, ref bound, strict } => {
            let row = dense_row(terms, bound.clone(), strict, real_index, n_reals);
            let negated = row.negated();
            Ok(AtomTheory {
                pos_rows: vec![row],
                neg_rows: vec![negated],
                pos_sat: true,
                neg_sat: true,
            })
        }
        TermKind::Eq(lhs, rhs) => {
            // An equality asserts both closed half-spaces; its negation
            // removes a measure-zero set and asserts nothing.
            let le = tm.mk_le(lhs, rhs)?;
            let ge = tm.mk_le(rhs, lhs)?;
            let mut pos_rows = Vec::new();
            let mut pos_sat = true;
            for side in [le, ge] {
                match tm.kind(side).clone() {
                    TermKind::True => {}
                    TermKind::False => pos_sat = false,
                    TermKind::LinearAtom { ref terms, ref bound, strict } => {
                        pos_rows.push(dense_row(terms, bound.clone(), strict, real_index, n_reals));
                    }
                    other => {
                        return Err(WmiError::InternalInconsistency(format!(
                            "equality side canonicalized to {other:?}"
                        )))
                    }
                }
            }
            Ok(AtomTheory {
                pos_rows,
                neg_rows: Vec::new(),
                pos_sat,
                neg_sat: true,
            })
        }
        other => Err(WmiError::InternalInconsistency(format!(
            "not a theory atom: {other:?}"
        ))),
    }
}

/// Densify a canonical linear atom over the full real-variable order.
fn dense_row(
    terms: &[(TermId, num_bigint::BigInt)],
    bound: BigRational,
    strict: bool,
    real_index: &FxHashMap<TermId, usize>,
    n_reals: usize,
) -> LinearConstraint {
    let mut coeffs = vec![BigRational::zero(); n_reals];
    for (var, coeff) in terms {
        if let Some(&index) = real_index.get(var) {
            coeffs[index] = BigRational::from_integer(coeff.clone());
        }
    }
    LinearConstraint::new(coeffs, bound, strict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(
        stream: &mut AssignmentStream,
        tm: &mut TermManager,
    ) -> Vec<(Assignment, u32)> {
        let mut out = Vec::new();
        while let Some(item) = stream.next(tm) {
            out.push(item.unwrap());
        }
        out
    }

    fn unweighted(tm: &mut TermManager) -> Weights {
        let one = tm.mk_real_int(1);
        Weights::new(tm, one).unwrap()
    }

    #[test]
    fn test_pure_boolean_cells_are_disjoint_and_complete() {
        let mut tm = TermManager::new();
        let a = tm.mk_bool_var("a");
        let b = tm.mk_bool_var("b");
        let delta = tm.mk_or(vec![a, b]);
        let w = unweighted(&mut tm);

        let mut stream =
            AssignmentStream::new(&mut tm, delta, EnumerationMode::StructureAware, &w).unwrap();
        let cells = drain(&mut stream, &mut tm);
        assert_eq!(stream.state(), StreamState::Done);

        // totalizations must cover the 3 models of a \/ b exactly once
        let mut covered = 0u32;
        for (cell, k) in &cells {
            covered += 1 << k;
            for (other, _) in &cells {
                if std::ptr::eq(cell, other) {
                    continue;
                }
                assert!(
                    cell.iter().any(|(atom, v)| other.get(atom) == Some(&!v)),
                    "cells must conflict on some atom"
                );
            }
        }
        assert_eq!(covered, 3);
    }

    #[test]
    fn test_total_mode_assigns_every_atom() {
        let mut tm = TermManager::new();
        let a = tm.mk_bool_var("a");
        let b = tm.mk_bool_var("b");
        let delta = tm.mk_or(vec![a, b]);
        let w = unweighted(&mut tm);

        let mut stream =
            AssignmentStream::new(&mut tm, delta, EnumerationMode::Total, &w).unwrap();
        let cells = drain(&mut stream, &mut tm);
        assert_eq!(cells.len(), 3);
        for (cell, k) in &cells {
            assert_eq!(*k, 0);
            assert_eq!(cell.len(), 2);
        }
    }

    #[test]
    fn test_irrelevant_atom_is_not_decided() {
        let mut tm = TermManager::new();
        let a = tm.mk_bool_var("a");
        let b = tm.mk_bool_var("b");
        // b only occurs in a tautological disjunct, which the IR collapses
        let nb = tm.mk_not(b);
        let taut = tm.mk_or(vec![b, nb]);
        let delta = tm.mk_and(vec![a, taut]);
        let w = unweighted(&mut tm);

        let mut stream =
            AssignmentStream::new(&mut tm, delta, EnumerationMode::StructureAware, &w).unwrap();
        let cells = drain(&mut stream, &mut tm);
        assert_eq!(cells.len(), 1);
        let (cell, k) = &cells[0];
        assert_eq!(cell.get(&a), Some(&true));
        assert!(!cell.contains_key(&b));
        assert_eq!(*k, 0, "b is collapsed away entirely, not left free");
    }

    #[test]
    fn test_theory_pruning_cuts_infeasible_branch() {
        let mut tm = TermManager::new();
        let x = tm.mk_real_var("x");
        let zero = tm.mk_real_int(0);
        let one = tm.mk_real_int(1);
        let two = tm.mk_real_int(2);
        let low = tm.mk_ge(x, zero).unwrap();
        let high = tm.mk_le(x, one).unwrap();
        let far = tm.mk_ge(x, two).unwrap();
        // (x>=0) /\ (x<=1) /\ (x>=2 \/ x<=1) has models only through x<=1
        let or_part = tm.mk_or(vec![far, high]);
        let delta = tm.mk_and(vec![low, high, or_part]);
        let w = unweighted(&mut tm);

        let mut stream =
            AssignmentStream::new(&mut tm, delta, EnumerationMode::StructureAware, &w).unwrap();
        let cells = drain(&mut stream, &mut tm);
        // x>=2 contradicts x<=1: only the cell with far=false (or collapsed)
        assert!(!cells.is_empty());
        for (cell, _) in &cells {
            assert_ne!(cell.get(&far), Some(&true));
        }
    }

    #[test]
    fn test_unsatisfiable_delta_yields_no_cells() {
        let mut tm = TermManager::new();
        let a = tm.mk_bool_var("a");
        let na = tm.mk_not(a);
        let delta = tm.mk_and(vec![a, na]);
        assert_eq!(delta, tm.mk_false());
        let w = unweighted(&mut tm);

        let mut stream =
            AssignmentStream::new(&mut tm, delta, EnumerationMode::StructureAware, &w).unwrap();
        assert!(stream.next(&mut tm).is_none());
        assert_eq!(stream.state(), StreamState::Done);
    }

    #[test]
    fn test_cancellation_token_stops_stream() {
        let mut tm = TermManager::new();
        let a = tm.mk_bool_var("a");
        let w = unweighted(&mut tm);
        let mut stream =
            AssignmentStream::new(&mut tm, a, EnumerationMode::StructureAware, &w).unwrap();
        let token = Arc::new(AtomicBool::new(true));
        stream.set_cancel_token(token);

        match stream.next(&mut tm) {
            Some(Err(WmiError::Cancelled)) => {}
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(stream.state(), StreamState::Errored);
        assert!(stream.next(&mut tm).is_none());
    }
}
