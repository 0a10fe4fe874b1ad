//! wmirs-core - Formula and term IR for Weighted Model Integration
//!
//! This crate provides the foundational expression layer of the wmirs solver:
//! - Arena-allocated, hash-consed terms with integer [`TermId`] references
//! - Canonicalized linear-real-arithmetic atoms
//! - Substitution, Boolean simplification and normal-form conversion
//!
//! Node equality is [`TermId`] equality: structurally identical terms are
//! interned once, so structurally identical LRA constraints (after
//! gcd-normalization) share a single node.
//!
//! # Examples
//!
//! ```
//! use wmirs_core::TermManager;
//!
//! let mut tm = TermManager::new();
//!
//! // Boolean formulas
//! let p = tm.mk_bool_var("p");
//! let q = tm.mk_bool_var("q");
//! let and_pq = tm.mk_and(vec![p, q]);
//! assert_eq!(tm.mk_and(vec![q, p]), and_pq);
//!
//! // LRA atoms are canonicalized on construction: x >= 0 becomes -x <= 0
//! let x = tm.mk_real_var("x");
//! let zero = tm.mk_real_int(0);
//! let ge = tm.mk_ge(x, zero).unwrap();
//! let le = tm.mk_le(zero, x).unwrap();
//! assert_eq!(ge, le);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod rewrite;
pub mod term;

pub use error::{CoreError, Result};
pub use term::{Term, TermId, TermKind, TermManager};
