//! Baseline total enumerator.

use wmirs_core::{TermId, TermManager};

use crate::enumeration::{AssignmentStream, EnumerationMode, Enumerator};
use crate::error::Result;
use crate::weights::Weights;

/// Enumerates total truth assignments: every atom of the joint formula is
/// decided in every emitted cell, so the `2^k` multiplier is always 1.
///
/// Used as the reference implementation the structure-aware enumerator is
/// checked against.
pub struct TotalEnumerator {
    support: TermId,
    weights: Weights,
}

impl TotalEnumerator {
    /// Build a total enumerator for a support and weight term.
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

impl Enumerator for TotalEnumerator {
    fn support(&self) -> TermId {
        self.support
    }

    fn weights(&self) -> &Weights {
        &self.weights
    }

    fn enumerate(&self, tm: &mut TermManager, query: TermId) -> Result<AssignmentStream> {
        let delta = tm.mk_and(vec![self.support, query, self.weights.skeleton()]);
        AssignmentStream::new(tm, delta, EnumerationMode::Total, &self.weights)
    }
}
