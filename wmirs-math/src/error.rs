//! Error types for the numerics layer.

use thiserror::Error;

/// Errors raised by polytope and constraint computations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MathError {
    /// The polytope has a recession direction; its volume is infinite.
    #[error("polytope is unbounded in variable {0}")]
    Unbounded(usize),

    /// Fourier-Motzkin elimination exceeded the internal row budget.
    #[error("constraint elimination exceeded {0} rows")]
    TooManyConstraints(usize),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, MathError>;
