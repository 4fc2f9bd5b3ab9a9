//! Configuration types.
//!
//! - [`InstrumentationConfig`]: server-wide instrumentation settings
//! - [`TestingKnobs`]: switches for reproducible test output
//! - [`StatsStoreConfig`](crate::stats::StatsStoreConfig) lives with the
//!   store it configures

mod instrumentation;
mod knobs;

pub use instrumentation::{DEFAULT_SPAN_OPERATION, InstrumentationConfig};
pub use knobs::{StatementTraceCallback, TestingKnobs};
