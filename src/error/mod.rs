//! Error types for statement instrumentation.
//!
//! Every [`Error`] carries an [`ErrorKind`], and every kind maps to a
//! [`FailureScope`]:
//!
//! - [`FailureScope::Statistic`]: the failure costs one statistic or artifact
//!   (a sub-flow's network bytes, a plan tree, a bundle). The controller logs
//!   it and moves on.
//! - [`FailureScope::Statement`]: the failure becomes the statement's result.
//!   In practice this is a communication error while writing result rows.
//!
//! ## Key Invariant
//!
//! The statement's real result is never aborted for an instrumentation
//! failure. `finish()` hands back the execution error unchanged unless writing
//! EXPLAIN ANALYZE output to the client failed.

mod core;
mod kind;

pub use self::core::Error;
pub use kind::{ErrorKind, FailureScope};

/// A specialized `Result` type for instrumentation operations.
pub type Result<T> = std::result::Result<T, Error>;
