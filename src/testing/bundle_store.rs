//! An in-memory bundle store.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

use crate::{
    bundle::{BundleStore, DiagnosticsBundle},
    error::{Error, Result},
    types::{BundleId, RequestId, StatementFingerprint},
};

/// One recorded [`BundleStore::insert`] call.
#[derive(Debug, Clone)]
pub struct StoredBundle {
    /// The ID handed back.
    pub id: BundleId,
    /// The fingerprint passed in.
    pub fingerprint: StatementFingerprint,
    /// The statement passed in.
    pub statement: String,
    /// The request passed in.
    pub request_id: RequestId,
    /// The bundle itself.
    pub bundle: DiagnosticsBundle,
}

/// A [`BundleStore`] keeping every bundle in memory.
///
/// IDs are assigned sequentially from 1. Failure can be injected to
/// exercise the error paths.
#[derive(Debug, Clone)]
pub struct InMemoryBundleStore {
    bundles: Arc<RwLock<Vec<StoredBundle>>>,
    next_id: Arc<AtomicU64>,
    fail: Arc<AtomicBool>,
}

impl InMemoryBundleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            bundles: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every following insert fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every stored bundle, in insertion order.
    pub fn bundles(&self) -> Vec<StoredBundle> {
        self.bundles.read().clone()
    }

    /// Returns the number of stored bundles.
    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    /// Returns `true` if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }

    /// Returns the bundles stored for `fingerprint`.
    pub fn bundles_for(&self, fingerprint: &str) -> Vec<StoredBundle> {
        self.bundles
            .read()
            .iter()
            .filter(|stored| stored.fingerprint.as_str() == fingerprint)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryBundleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleStore for InMemoryBundleStore {
    fn insert<'a>(
        &'a self,
        fingerprint: &'a StatementFingerprint,
        statement: &'a str,
        request_id: RequestId,
        bundle: DiagnosticsBundle,
    ) -> Pin<Box<dyn Future<Output = Result<BundleId>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::bundle_storage("injected bundle store failure"));
            }
            let id = BundleId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.bundles.write().push(StoredBundle {
                id,
                fingerprint: fingerprint.clone(),
                statement: statement.to_string(),
                request_id,
                bundle,
            });
            Ok(id)
        })
    }
}
