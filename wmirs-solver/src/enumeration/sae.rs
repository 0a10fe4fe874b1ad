//! Structure-aware enumerator.

use wmirs_core::{TermId, TermManager};

use crate::enumeration::{AssignmentStream, EnumerationMode, Enumerator};
use crate::error::Result;
use crate::weights::Weights;

/// Structure-aware enumerator: emits a cell as soon as the current partial
/// assignment determines the joint formula.
///
/// Atoms that the hash-consed simplification removes from the residual are
/// never decided; unassigned Boolean atoms are reported through `k` and
/// accounted for by the `2^k` multiplier, while unassigned theory atoms
/// simply leave the cell's polytope unconstrained. Conjoining the weight
/// skeleton keeps every condition label decided, so the weight leaf of
/// every cell is determined.
pub struct SaEnumerator {
    support: TermId,
    weights: Weights,
}

impl SaEnumerator {
    /// Build a structure-aware enumerator for a support and weight term.
    pub fn new(tm: &mut TermManager, support: TermId, weight: TermId) -> Result<Self> {
        let weights = Weights::new(tm, weight)?;
        Ok(Self { support, weights })
    }

    /// Build with the constant weight 1.
    pub fn unweighted(tm: &mut TermManager, support: TermId) -> Result<Self> {
        let one = tm.mk_real_int(1);
        Self::new(tm, support, one)
    }
}

impl Enumerator for SaEnumerator {
    fn support(&self) -> TermId {
        self.support
    }

    fn weights(&self) -> &Weights {
        &self.weights
    }

    fn enumerate(&self, tm: &mut TermManager, query: TermId) -> Result<AssignmentStream> {
        let delta = tm.mk_and(vec![self.support, query, self.weights.skeleton()]);
        AssignmentStream::new(tm, delta, EnumerationMode::StructureAware, &self.weights)
    }
}
