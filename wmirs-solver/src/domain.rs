//! Query domains.

use rustc_hash::{FxHashMap, FxHashSet};
use wmirs_core::TermId;

/// The domain of a WMI query: the ordered continuous integration variables
/// plus the declared Boolean universe.
///
/// The variable order is fixed when the domain is built and is shared with
/// the integrator (polytopes, polynomials and cache fingerprints all index
/// variables by this order). Declared Boolean atoms count toward the `2^k`
/// multiplier even when the formula never mentions them.
#[derive(Debug, Clone)]
pub struct Domain {
    reals: Vec<TermId>,
    real_index: FxHashMap<TermId, usize>,
    bools: FxHashSet<TermId>,
}

impl Domain {
    /// Domain over the given continuous variables (ordered by term id) and
    /// no declared Booleans.
    #[must_use]
    pub fn new(reals: impl IntoIterator<Item = TermId>) -> Self {
        Self::with_bools(reals, [])
    }

    /// Domain over continuous variables and a declared Boolean universe.
    #[must_use]
    pub fn with_bools(
        reals: impl IntoIterator<Item = TermId>,
        bools: impl IntoIterator<Item = TermId>,
    ) -> Self {
        let mut reals: Vec<TermId> = reals.into_iter().collect();
        reals.sort_unstable();
        reals.dedup();
        let real_index = reals.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        Self {
            reals,
            real_index,
            bools: bools.into_iter().collect(),
        }
    }

    /// Number of continuous variables.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.reals.len()
    }

    /// The ordered continuous variables.
    #[must_use]
    pub fn reals(&self) -> &[TermId] {
        &self.reals
    }

    /// Index of a continuous variable in the fixed order.
    #[must_use]
    pub fn index_of(&self, var: TermId) -> Option<usize> {
        self.real_index.get(&var).copied()
    }

    /// The declared Boolean atoms.
    #[must_use]
    pub fn bools(&self) -> &FxHashSet<TermId> {
        &self.bools
    }
}
