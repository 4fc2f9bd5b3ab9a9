//! Full-recording spans and their immutable recordings.

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of one span within a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(u64);

impl SpanId {
    /// Generates a new random span ID.
    pub fn generate() -> Self {
        // zero is reserved for "no span"
        Self(fastrand::u64(1..))
    }

    /// Returns the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A free-form log message attached to a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the message was recorded.
    pub time: DateTime<Utc>,
    /// The message.
    pub message: String,
}

/// A typed payload attached to a span.
///
/// Execution components use these to ship their statistics back to the
/// gateway; the `type_tag` tells consumers how to decode `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Payload type, e.g. `component_stats`.
    pub type_tag: String,
    /// The encoded payload.
    pub payload: serde_json::Value,
}

impl StructuredRecord {
    /// Encodes `value` under `type_tag`.
    pub fn encode<T: Serialize>(type_tag: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self { type_tag: type_tag.into(), payload: serde_json::to_value(value)? })
    }
}

/// One finished span inside a [`Recording`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSpan {
    /// This span's ID.
    pub span_id: SpanId,
    /// The parent span, `None` for the root.
    pub parent_span_id: Option<SpanId>,
    /// The operation name.
    pub operation: String,
    /// Wall-clock start time.
    pub start_time: DateTime<Utc>,
    /// How long the span was open.
    pub duration: Duration,
    /// Span tags.
    pub tags: BTreeMap<String, String>,
    /// Log messages in recording order.
    pub logs: Vec<LogRecord>,
    /// Structured payloads in recording order.
    pub structured: Vec<StructuredRecord>,
}

/// The immutable result of a full-recording span.
///
/// Cloning is cheap; every clone shares the same span list.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    spans: Arc<[RecordedSpan]>,
}

impl Recording {
    /// Builds a recording from already-finished spans.
    pub fn from_spans(spans: Vec<RecordedSpan>) -> Self {
        Self { spans: spans.into() }
    }

    /// Returns the spans, root first.
    pub fn spans(&self) -> &[RecordedSpan] {
        &self.spans
    }

    /// Returns the number of spans.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterates over every structured record carrying `type_tag`.
    pub fn structured<'a>(
        &'a self,
        type_tag: &'a str,
    ) -> impl Iterator<Item = (&'a RecordedSpan, &'a StructuredRecord)> + 'a {
        self.spans.iter().flat_map(move |span| {
            span.structured
                .iter()
                .filter(move |record| record.type_tag == type_tag)
                .map(move |record| (span, record))
        })
    }

    /// Serializes the recording as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*self.spans)?)
    }
}

impl Serialize for Recording {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (*self.spans).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Recording {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        Vec::<RecordedSpan>::deserialize(deserializer).map(Self::from_spans)
    }
}

#[derive(Debug)]
struct OpenSpan {
    span: RecordedSpan,
    started: Instant,
    finished: bool,
}

#[derive(Debug, Default)]
struct SpanBuffer {
    finished: bool,
    spans: Vec<OpenSpan>,
}

impl SpanBuffer {
    fn open(&mut self, operation: &str, parent: Option<SpanId>) -> usize {
        self.spans.push(OpenSpan {
            span: RecordedSpan {
                span_id: SpanId::generate(),
                parent_span_id: parent,
                operation: operation.to_string(),
                start_time: Utc::now(),
                duration: Duration::ZERO,
                tags: BTreeMap::new(),
                logs: Vec::new(),
                structured: Vec::new(),
            },
            started: Instant::now(),
            finished: false,
        });
        self.spans.len() - 1
    }

    fn with_span(&mut self, index: usize, f: impl FnOnce(&mut OpenSpan)) {
        if self.finished {
            return;
        }
        if let Some(span) = self.spans.get_mut(index) {
            f(span);
        }
    }

    fn close(&mut self) -> Recording {
        self.finished = true;
        let spans = self
            .spans
            .drain(..)
            .map(|mut open| {
                if !open.finished {
                    open.span.duration = open.started.elapsed();
                }
                open.span
            })
            .collect();
        Recording::from_spans(spans)
    }
}

/// A handle through which execution components record into a span.
///
/// Handles are cheap to clone and safe to use from many threads. Once the
/// owning [`RecordingSpan`] is finished, every write through any handle is
/// silently dropped, so the recording never changes after it is returned.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    buffer: Arc<Mutex<SpanBuffer>>,
    index: usize,
    span_id: SpanId,
}

impl SpanHandle {
    /// Returns the ID of the span this handle writes to.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Returns `true` while the owning span still accepts writes.
    pub fn is_recording(&self) -> bool {
        !self.buffer.lock().finished
    }

    /// Opens a child span.
    pub fn child(&self, operation: &str) -> SpanHandle {
        let mut buffer = self.buffer.lock();
        let index = buffer.open(operation, Some(self.span_id));
        let span_id = buffer.spans[index].span.span_id;
        if buffer.finished {
            // nothing opened after close is ever returned
            buffer.spans.truncate(index);
        }
        SpanHandle { buffer: Arc::clone(&self.buffer), index, span_id }
    }

    /// Sets a tag on the span.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.buffer.lock().with_span(self.index, |open| {
            open.span.tags.insert(key, value);
        });
    }

    /// Appends a log message to the span.
    pub fn log(&self, message: impl Into<String>) {
        let record = LogRecord { time: Utc::now(), message: message.into() };
        self.buffer.lock().with_span(self.index, |open| open.span.logs.push(record));
    }

    /// Appends a structured payload to the span.
    pub fn record_structured(&self, record: StructuredRecord) {
        self.buffer.lock().with_span(self.index, |open| open.span.structured.push(record));
    }

    /// Encodes `value` and appends it under `type_tag`.
    pub fn record<T: Serialize>(&self, type_tag: &str, value: &T) -> Result<()> {
        self.record_structured(StructuredRecord::encode(type_tag, value)?);
        Ok(())
    }

    /// Marks a child span as finished, fixing its duration.
    pub fn finish(&self) {
        self.buffer.lock().with_span(self.index, |open| {
            if !open.finished {
                open.finished = true;
                open.span.duration = open.started.elapsed();
            }
        });
    }
}

/// A root span that records every event of one statement execution.
///
/// The span is finished exactly once: either explicitly through
/// [`finish`](RecordingSpan::finish), which yields the [`Recording`], or
/// implicitly when dropped on an error path.
#[derive(Debug)]
pub struct RecordingSpan {
    handle: SpanHandle,
}

impl RecordingSpan {
    /// Starts a new root span.
    pub fn start(operation: &str) -> Self {
        let mut buffer = SpanBuffer::default();
        let index = buffer.open(operation, None);
        let span_id = buffer.spans[index].span.span_id;
        Self { handle: SpanHandle { buffer: Arc::new(Mutex::new(buffer)), index, span_id } }
    }

    /// Returns a handle for recording into this span.
    pub fn handle(&self) -> SpanHandle {
        self.handle.clone()
    }

    /// Returns the root span ID.
    pub fn span_id(&self) -> SpanId {
        self.handle.span_id
    }

    /// Stops the span and returns its recording.
    pub fn finish(self) -> Recording {
        self.handle.buffer.lock().close()
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        let mut buffer = self.handle.buffer.lock();
        if !buffer.finished {
            let _ = buffer.close();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_span_finish_returns_recording() {
        let span = RecordingSpan::start("traced statement");
        let handle = span.handle();
        handle.set_tag("node", "1");
        handle.log("starting flow");

        let recording = span.finish();
        assert_eq!(recording.len(), 1);
        let root = &recording.spans()[0];
        assert_eq!(root.operation, "traced statement");
        assert!(root.parent_span_id.is_none());
        assert_eq!(root.tags.get("node").map(String::as_str), Some("1"));
        assert_eq!(root.logs.len(), 1);
    }

    #[test]
    fn test_child_spans_are_recorded() {
        let span = RecordingSpan::start("root");
        let root_id = span.span_id();
        let child = span.handle().child("flow");
        child.record("component_stats", &serde_json::json!({"a": 1})).unwrap();
        child.finish();

        let recording = span.finish();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.spans()[1].parent_span_id, Some(root_id));
        assert_eq!(recording.structured("component_stats").count(), 1);
        assert_eq!(recording.structured("other").count(), 0);
    }

    #[test]
    fn test_writes_after_finish_are_dropped() {
        let span = RecordingSpan::start("root");
        let handle = span.handle();
        let recording = span.finish();

        assert!(!handle.is_recording());
        handle.log("late");
        handle.set_tag("late", "true");
        let late_child = handle.child("late child");
        late_child.log("late");

        assert!(recording.spans()[0].logs.is_empty());
        assert!(recording.spans()[0].tags.is_empty());
        assert_eq!(recording.len(), 1);
    }

    #[test]
    fn test_drop_finishes_span() {
        let span = RecordingSpan::start("root");
        let handle = span.handle();
        assert!(handle.is_recording());
        drop(span);
        assert!(!handle.is_recording());
    }

    #[test]
    fn test_concurrent_handles() {
        let span = RecordingSpan::start("root");
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let handle = span.handle();
                std::thread::spawn(move || {
                    let child = handle.child("worker");
                    child.record("component_stats", &i).unwrap();
                    child.finish();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let recording = span.finish();
        assert_eq!(recording.len(), 9);
        assert_eq!(recording.structured("component_stats").count(), 8);
    }

    #[test]
    fn test_recording_json_roundtrip() {
        let span = RecordingSpan::start("root");
        span.handle().set_tag("k", "v");
        let recording = span.finish();

        let json = recording.to_json().unwrap();
        let parsed: Recording = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, recording);
    }

    #[test]
    fn test_span_id_display_is_hex() {
        let id = SpanId(255);
        assert_eq!(id.to_string(), "00000000000000ff");
        assert_ne!(SpanId::generate().value(), 0);
    }
}
