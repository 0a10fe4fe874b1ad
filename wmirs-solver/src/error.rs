//! Error taxonomy of the WMI pipeline.
//!
//! User-caused conditions (unsupported weights, timeouts, unbounded
//! domains) surface as structured errors from `compute`; invariant breaks
//! (`LeafUnderdetermined`, `InternalInconsistency`) indicate bugs in the
//! decomposer or enumerator and propagate without recovery.

use thiserror::Error;
use wmirs_core::CoreError;
use wmirs_math::MathError;

/// Errors raised while computing a weighted model integral.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WmiError {
    /// The weight term contains a non-polynomial leaf (symbolic division,
    /// Boolean-sorted subterm, ...).
    #[error("unsupported weight term: {0}")]
    UnsupportedWeight(String),

    /// The theory decider exceeded the enumeration deadline.
    #[error("enumeration exceeded its deadline")]
    EnumerationTimeout,

    /// The query-wide wall-clock deadline expired.
    #[error("query exceeded its deadline")]
    Timeout,

    /// The query was cancelled through its cancellation token.
    #[error("query cancelled")]
    Cancelled,

    /// No enumerator backend was supplied at solver construction.
    #[error("no enumerator backend configured")]
    NoEnumerator,

    /// No integrator backend was supplied at solver construction.
    #[error("no integrator backend configured")]
    NoIntegrator,

    /// A weight condition label was unassigned at integration time.
    /// Invariant break: the skeleton guarantees every label is enumerated.
    #[error("weight leaf underdetermined: {0}")]
    LeafUnderdetermined(String),

    /// The theory decider contradicts Boolean propagation.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// The integration polytope is unbounded in the given variable.
    #[error("integration domain is unbounded in variable {0}")]
    UnboundedDomain(usize),

    /// A real variable escapes the declared integration domain.
    #[error("variable {0} is not part of the integration domain")]
    UndefinedVariable(String),

    /// Alias definitions form a dependency cycle.
    #[error("cyclic alias definitions: {0}")]
    CyclicAlias(String),

    /// The same variable is aliased twice in one assignment.
    #[error("conflicting alias definitions for {0}")]
    AliasClash(String),

    /// Error bubbled up from the term layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error bubbled up from the numerics layer.
    #[error("numeric failure: {0}")]
    Numeric(MathError),
}

impl WmiError {
    /// Invariant breaks must never be downgraded by best-effort mode.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LeafUnderdetermined(_) | Self::InternalInconsistency(_)
        )
    }
}

impl From<MathError> for WmiError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Unbounded(var) => Self::UnboundedDomain(var),
            other => Self::Numeric(other),
        }
    }
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, WmiError>;
