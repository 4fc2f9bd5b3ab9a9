//! Tracing integration for statement instrumentation.
//!
//! This module provides the pieces the controller needs from a tracing
//! system, plus a process-local implementation of each:
//!
//! - [`Tracer`]: starts full-recording spans ([`InProcessTracer`] records in
//!   memory)
//! - [`RecordingSpan`] / [`SpanHandle`]: the owned root span and the cheap
//!   handles execution components record through
//! - [`Recording`]: the immutable result, consumed by aggregation and bundles
//! - [`Telemetry`]: process-wide counters
//!
//! ## Example
//!
//! ```rust
//! use stmtdiag::tracing_support::{InProcessTracer, Tracer};
//!
//! let span = InProcessTracer.start_recording_span("traced statement");
//! let flow = span.handle().child("flow");
//! flow.log("flow started on n1");
//! flow.finish();
//!
//! let recording = span.finish();
//! assert_eq!(recording.len(), 2);
//! ```

mod metrics;
mod span;
mod tracer;

pub use metrics::{
    Counter, STATEMENT_DIAGNOSTICS_COLLECTED, Telemetry, TelemetryConfig, TelemetrySnapshot,
};
pub use span::{
    LogRecord, RecordedSpan, Recording, RecordingSpan, SpanHandle, SpanId, StructuredRecord,
};
pub use tracer::{InProcessTracer, Tracer};
