//! # stmtdiag
//!
//! Statement-level instrumentation for a distributed SQL engine: diagnostics
//! bundles, EXPLAIN ANALYZE output, and execution statistics aggregated from
//! the components of a distributed plan.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use stmtdiag::prelude::*;
//! use stmtdiag::testing::{InMemoryBundleStore, MockDiagnosticsRegistry, RecordingResult};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! // Created once per server.
//! let bundles = Arc::new(InMemoryBundleStore::new());
//! let registry = Arc::new(MockDiagnosticsRegistry::new().collect_for("SELECT _", 1));
//! let services = InstrumentationServices::new(bundles.clone()).with_registry(registry);
//!
//! // Created per statement.
//! let mut helper = InstrumentationHelper::new(services);
//! let setup = helper.setup("SELECT _", true).await?;
//! assert!(setup.need_finish);
//!
//! // ... execute, recording into `setup.span` ...
//!
//! let times = PhaseTimes::new();
//! let mut res = RecordingResult::new();
//! helper.finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Ok::<(), Error>(())).await?;
//! assert_eq!(bundles.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Fingerprint**: the normalized statement, key of every aggregate
//! - **Full-recording span**: captures every event of one execution; turned
//!   into an immutable [`Recording`](tracing_support::Recording) exactly once
//! - **Component stats**: what each operator or stream reports; zero means
//!   "not measured"
//! - **Failure scope**: instrumentation failures never fail the statement,
//!   except broken client writes and lifecycle violations

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod config;
pub mod error;
pub mod types;

// Statement instrumentation
pub mod bundle;
pub mod diagnostics;
pub mod explain;
pub mod instrumentation;
pub mod stats;

// Spans and counters
pub mod tracing_support;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use config::{InstrumentationConfig, TestingKnobs};
pub use error::{Error, ErrorKind, FailureScope, Result};
pub use instrumentation::{
    ExecutionSummary, InstrumentationHelper, InstrumentationServices, InstrumentationState,
    OutputMode, SetupOutcome,
};
pub use types::{BundleId, NodeId, RequestId, StatementFingerprint, StatementKey};
