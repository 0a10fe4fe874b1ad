//! Error types for the term layer.

use thiserror::Error;

/// Errors raised while building or rewriting terms.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// An arithmetic atom has a non-linear operand.
    #[error("non-linear operand in arithmetic atom: {0}")]
    NonLinearAtom(String),

    /// Division by the constant zero.
    #[error("division by zero in term: {0}")]
    DivisionByZero(String),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, CoreError>;
