//! The bundle persistence seam.

use std::{future::Future, pin::Pin};

use super::DiagnosticsBundle;
use crate::{
    error::Result,
    types::{BundleId, RequestId, StatementFingerprint},
};

/// Persists diagnostics bundles.
///
/// This trait is object-safe, so a server can hold an
/// `Arc<dyn BundleStore>` and tests can substitute
/// [`InMemoryBundleStore`](crate::testing::InMemoryBundleStore).
pub trait BundleStore: Send + Sync {
    /// Stores `bundle` and returns its ID.
    ///
    /// `request_id` is unset for bundles collected through
    /// EXPLAIN ANALYZE (DEBUG).
    fn insert<'a>(
        &'a self,
        fingerprint: &'a StatementFingerprint,
        statement: &'a str,
        request_id: RequestId,
        bundle: DiagnosticsBundle,
    ) -> Pin<Box<dyn Future<Output = Result<BundleId>> + Send + 'a>>;
}
