//! Statement diagnostics requests.
//!
//! Operators ask for a diagnostics bundle of "the next execution of
//! statement X". The registry remembers those requests and, when a statement
//! with a matching fingerprint starts, hands the request to exactly one
//! execution.

use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use futures::future;
use parking_lot::Mutex;

use crate::types::{RequestId, StatementFingerprint};

/// Invoked once the bundle for a claimed request has been built.
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// The registry's answer for one execution.
#[derive(Default)]
pub struct DiagnosticsDecision {
    /// Whether this execution should collect a bundle.
    pub collect: bool,
    /// The request being served; unset when `collect` is false.
    pub request_id: RequestId,
    /// Called after the bundle is built.
    pub on_complete: Option<CompletionCallback>,
}

impl DiagnosticsDecision {
    /// A decision not to collect.
    pub fn skip() -> Self {
        Self::default()
    }

    /// A decision to collect for `request_id`.
    pub fn collect(request_id: RequestId, on_complete: Option<CompletionCallback>) -> Self {
        Self { collect: true, request_id, on_complete }
    }
}

impl fmt::Debug for DiagnosticsDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsDecision")
            .field("collect", &self.collect)
            .field("request_id", &self.request_id)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Decides whether an execution should collect a diagnostics bundle.
///
/// This trait is object-safe; the controller holds an
/// `Arc<dyn DiagnosticsRegistry>`.
pub trait DiagnosticsRegistry: Send + Sync {
    /// Returns whether the execution of `fingerprint` starting now should
    /// collect a bundle.
    fn should_collect_diagnostics<'a>(
        &'a self,
        fingerprint: &'a StatementFingerprint,
    ) -> Pin<Box<dyn Future<Output = DiagnosticsDecision> + Send + 'a>>;
}

/// A registry that never asks for bundles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCollect;

impl DiagnosticsRegistry for NeverCollect {
    fn should_collect_diagnostics<'a>(
        &'a self,
        _fingerprint: &'a StatementFingerprint,
    ) -> Pin<Box<dyn Future<Output = DiagnosticsDecision> + Send + 'a>> {
        Box::pin(future::ready(DiagnosticsDecision::skip()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Pending,
    Claimed,
    Completed,
}

#[derive(Debug, Default)]
struct Requests {
    next_id: u64,
    by_fingerprint: HashMap<StatementFingerprint, RequestId>,
    states: HashMap<RequestId, RequestState>,
}

/// An in-process registry of outstanding diagnostics requests.
///
/// Each request is claimed by the first matching execution; later executions
/// of the same statement are not traced unless a new request is made.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::diagnostics::{DiagnosticsRegistry, RequestRegistry};
/// use stmtdiag::StatementFingerprint;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = RequestRegistry::new();
/// let fingerprint = StatementFingerprint::new("SELECT _");
/// let id = registry.insert_request(fingerprint.clone());
///
/// let first = registry.should_collect_diagnostics(&fingerprint).await;
/// assert!(first.collect);
/// assert_eq!(first.request_id, id);
///
/// let second = registry.should_collect_diagnostics(&fingerprint).await;
/// assert!(!second.collect);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestRegistry {
    inner: Arc<Mutex<Requests>>,
}

impl RequestRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a bundle for the next execution of `fingerprint`.
    ///
    /// A pending request for the same fingerprint is reused.
    pub fn insert_request(&self, fingerprint: StatementFingerprint) -> RequestId {
        let mut requests = self.inner.lock();
        if let Some(id) = requests.by_fingerprint.get(&fingerprint) {
            return *id;
        }
        requests.next_id += 1;
        let id = RequestId(requests.next_id);
        requests.by_fingerprint.insert(fingerprint, id);
        requests.states.insert(id, RequestState::Pending);
        tracing::info!(request_id = %id, "statement diagnostics requested");
        id
    }

    /// Returns `true` if `id` has been served.
    pub fn is_completed(&self, id: RequestId) -> bool {
        self.inner.lock().states.get(&id) == Some(&RequestState::Completed)
    }

    /// Returns the number of requests not yet claimed.
    pub fn pending(&self) -> usize {
        self.inner.lock().states.values().filter(|s| **s == RequestState::Pending).count()
    }

    fn claim(&self, fingerprint: &StatementFingerprint) -> Option<RequestId> {
        let mut requests = self.inner.lock();
        let id = requests.by_fingerprint.remove(fingerprint)?;
        requests.states.insert(id, RequestState::Claimed);
        Some(id)
    }
}

impl DiagnosticsRegistry for RequestRegistry {
    fn should_collect_diagnostics<'a>(
        &'a self,
        fingerprint: &'a StatementFingerprint,
    ) -> Pin<Box<dyn Future<Output = DiagnosticsDecision> + Send + 'a>> {
        Box::pin(async move {
            let Some(id) = self.claim(fingerprint) else {
                return DiagnosticsDecision::skip();
            };
            let inner = Arc::clone(&self.inner);
            let on_complete: CompletionCallback = Box::new(move || {
                inner.lock().states.insert(id, RequestState::Completed);
                tracing::debug!(request_id = %id, "statement diagnostics request completed");
            });
            DiagnosticsDecision::collect(id, Some(on_complete))
        })
    }
}
