//! A scripted diagnostics registry.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future;
use parking_lot::Mutex;

use crate::{
    diagnostics::{DiagnosticsDecision, DiagnosticsRegistry},
    types::{RequestId, StatementFingerprint},
};

/// A diagnostics registry whose answers are scripted per fingerprint.
///
/// Unscripted fingerprints are not collected. Every call is counted, and
/// completion callbacks handed out are tracked.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::testing::MockDiagnosticsRegistry;
/// use stmtdiag::diagnostics::DiagnosticsRegistry;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = MockDiagnosticsRegistry::new().collect_for("SELECT 1", 7);
///
/// let decision = registry.should_collect_diagnostics(&"SELECT 1".into()).await;
/// assert!(decision.collect);
/// if let Some(done) = decision.on_complete {
///     done();
/// }
///
/// assert_eq!(registry.call_count(), 1);
/// assert_eq!(registry.completed(), vec![7]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDiagnosticsRegistry {
    scripted: Arc<Mutex<HashMap<StatementFingerprint, RequestId>>>,
    calls: Arc<Mutex<Vec<StatementFingerprint>>>,
    completed: Arc<Mutex<Vec<RequestId>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockDiagnosticsRegistry {
    /// Creates a registry that never collects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a collect decision for `fingerprint` under `request_id`.
    ///
    /// The decision is repeated for every execution of the fingerprint.
    #[must_use]
    pub fn collect_for(self, fingerprint: impl Into<StatementFingerprint>, request_id: u64) -> Self {
        self.scripted.lock().insert(fingerprint.into(), RequestId(request_id));
        self
    }

    /// Returns the number of calls.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the fingerprints asked about, in order.
    pub fn calls(&self) -> Vec<StatementFingerprint> {
        self.calls.lock().clone()
    }

    /// Returns the raw IDs of requests whose completion callback ran.
    pub fn completed(&self) -> Vec<u64> {
        self.completed.lock().iter().map(|id| id.0).collect()
    }

    /// Clears recorded calls and completions; scripted answers stay.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.completed.lock().clear();
        self.call_count.store(0, Ordering::SeqCst);
    }
}

impl DiagnosticsRegistry for MockDiagnosticsRegistry {
    fn should_collect_diagnostics<'a>(
        &'a self,
        fingerprint: &'a StatementFingerprint,
    ) -> Pin<Box<dyn Future<Output = DiagnosticsDecision> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(fingerprint.clone());
        let scripted = self.scripted.lock().get(fingerprint).copied();

        let decision = match scripted {
            Some(id) => {
                let completed = Arc::clone(&self.completed);
                DiagnosticsDecision::collect(id, Some(Box::new(move || completed.lock().push(id))))
            },
            None => DiagnosticsDecision::skip(),
        };
        Box::pin(future::ready(decision))
    }
}
