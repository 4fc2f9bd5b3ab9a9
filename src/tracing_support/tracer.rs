//! The tracing collaborator seam.

use super::RecordingSpan;

/// Starts full-recording spans.
///
/// The instrumentation controller only needs one capability from a tracer:
/// a verbose span that captures every event of one execution and can later be
/// turned into an immutable [`Recording`](super::Recording). Implement this
/// trait to bridge an external tracing system.
pub trait Tracer: Send + Sync {
    /// Starts a new root span in full-recording mode.
    fn start_recording_span(&self, operation: &str) -> RecordingSpan;
}

/// A tracer that records spans in process memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessTracer;

impl Tracer for InProcessTracer {
    fn start_recording_span(&self, operation: &str) -> RecordingSpan {
        let span = RecordingSpan::start(operation);
        tracing::debug!(span_id = %span.span_id(), operation, "started recording span");
        span
    }
}
