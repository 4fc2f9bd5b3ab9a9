//! Integration tests for statement instrumentation.
//!
//! Every collaborator is an in-process double from `stmtdiag::testing`, so
//! these tests need no external services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test instrumentation
//!
//! # With logs
//! RUST_LOG=stmtdiag=debug cargo test --test instrumentation -- --nocapture
//! ```

mod bundle_tests;
mod common;
mod explain_analyze_tests;
mod lifecycle_tests;
mod stats_tests;
