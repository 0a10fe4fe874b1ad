//! wmirs-solver - Weighted Model Integration over SMT-LRA
//!
//! Computes `WMI(chi /\ phi, w) = sum over models mu of chi /\ phi of
//! integral over mu's polytope of w`, for supports and queries mixing
//! propositional and linear-real atoms and piecewise-polynomial weights.
//!
//! The pipeline: the *weight decomposer* splits `w` into a Boolean
//! skeleton plus a leaf registry; an *enumerator* streams disjoint
//! (partial) truth assignments of `support /\ query /\ skeleton`; each
//! cell is converted into an H-polytope and a polynomial integrand; the
//! *dispatcher* integrates every cell (axis-aligned fast path, cache,
//! exact or sampling backend, optional worker pool), scales by `2^k` for
//! `k` unassigned Boolean atoms and accumulates exactly.
//!
//! # Examples
//!
//! ```
//! use wmirs_core::TermManager;
//! use wmirs_solver::{
//!     Domain, ExactIntegrator, SaEnumerator, WmiOptions, WmiSolver,
//! };
//!
//! let mut tm = TermManager::new();
//! let x = tm.mk_real_var("x");
//! let zero = tm.mk_real_int(0);
//! let one = tm.mk_real_int(1);
//!
//! // support 0 <= x <= 1, weight x
//! let low = tm.mk_ge(x, zero).unwrap();
//! let high = tm.mk_le(x, one).unwrap();
//! let support = tm.mk_and(vec![low, high]);
//!
//! let enumerator = SaEnumerator::new(&mut tm, support, x).unwrap();
//! let solver = WmiSolver::new(
//!     Some(Box::new(enumerator)),
//!     Some(Box::new(ExactIntegrator::new())),
//!     WmiOptions::default(),
//! )
//! .unwrap();
//!
//! let domain = Domain::new([x]);
//! let query = tm.mk_true();
//! let result = solver.compute(&mut tm, query, &domain).unwrap();
//! assert_eq!(result.value_f64(), 0.5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
pub mod domain;
pub mod enumeration;
pub mod error;
pub mod integration;
pub mod solver;
pub mod weights;

pub use convert::AssignmentConverter;
pub use domain::Domain;
pub use enumeration::{
    Assignment, AssignmentStream, EnumerationMode, Enumerator, SaEnumerator, StreamState,
    TotalEnumerator,
};
pub use error::{Result, WmiError};
pub use integration::{
    AxisAlignedWrapper, CacheWrapper, ExactIntegrator, IntegrationCache, Integrator,
    RejectionIntegrator, SampleEstimate,
};
pub use solver::{WmiOptions, WmiResult, WmiSolver};
pub use weights::Weights;
