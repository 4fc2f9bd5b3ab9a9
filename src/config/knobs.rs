//! Test-only behavior switches.

use std::{fmt, sync::Arc};

use crate::tracing_support::Recording;

/// Receives the full recording and raw SQL of every traced statement.
pub type StatementTraceCallback = Arc<dyn Fn(&Recording, &str) + Send + Sync>;

/// Switches that make instrumentation output reproducible or observable in
/// tests. Production servers leave every knob unset.
///
/// ## Example
///
/// ```rust
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// use stmtdiag::TestingKnobs;
///
/// let traced = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&traced);
/// let knobs = TestingKnobs::new()
///     .with_deterministic_explain_analyze()
///     .with_statement_trace(move |_trace, _sql| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// assert!(knobs.deterministic_explain_analyze);
/// ```
#[derive(Clone, Default)]
pub struct TestingKnobs {
    /// Use fixed phase times in EXPLAIN ANALYZE output.
    pub deterministic_explain_analyze: bool,

    /// Forces a trace of every statement and hands it to this callback.
    pub with_statement_trace: Option<StatementTraceCallback>,
}

impl TestingKnobs {
    /// Creates knobs with everything unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables fixed phase times.
    #[must_use]
    pub fn with_deterministic_explain_analyze(mut self) -> Self {
        self.deterministic_explain_analyze = true;
        self
    }

    /// Registers a trace consumer.
    #[must_use]
    pub fn with_statement_trace<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Recording, &str) + Send + Sync + 'static,
    {
        self.with_statement_trace = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for TestingKnobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestingKnobs")
            .field("deterministic_explain_analyze", &self.deterministic_explain_analyze)
            .field("with_statement_trace", &self.with_statement_trace.is_some())
            .finish()
    }
}
