//! Session state for one estimator user.
//!
//! [`SessionMachine`] is the single writer of the [`SessionState`] record and
//! publishes a snapshot on every transition. [`Estimator`] drives the
//! intake and estimate pipelines against it.
//!
//! [`SessionState`]: kaitai_core::SessionState

pub mod estimator;
pub mod machine;

pub use estimator::{Estimator, EstimatorOptions, SubmitReport};
pub use machine::{BeginEstimate, RemoveOutcome, SessionMachine, SubmitOutcome};
