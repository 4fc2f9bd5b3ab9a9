//! Test doubles for the instrumentation collaborators.
//!
//! - [`MockDiagnosticsRegistry`]: scripted collect decisions, call counting
//! - [`InMemoryBundleStore`]: keeps bundles in memory, injectable failure
//! - [`RecordingResult`]: records the statement result write protocol
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use stmtdiag::InstrumentationServices;
//! use stmtdiag::testing::{InMemoryBundleStore, MockDiagnosticsRegistry};
//!
//! let bundles = Arc::new(InMemoryBundleStore::new());
//! let registry = Arc::new(MockDiagnosticsRegistry::new().collect_for("SELECT 1", 1));
//! let services = InstrumentationServices::new(bundles.clone()).with_registry(registry.clone());
//! # let _ = services;
//! ```

mod bundle_store;
mod registry;
mod result;

pub use bundle_store::{InMemoryBundleStore, StoredBundle};
pub use registry::MockDiagnosticsRegistry;
pub use result::{RecordingResult, ResultEvent};
