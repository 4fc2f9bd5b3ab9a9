//! Diagnostics bundles and where they are persisted.

mod artifact;
mod store;

pub use artifact::DiagnosticsBundle;
pub use store::BundleStore;

/// Returns the admin UI path serving bundle `id`.
pub fn bundle_locator(admin_url: &str, id: crate::types::BundleId) -> String {
    format!("{}/_admin/v1/stmtbundle/{id}", admin_url.trim_end_matches('/'))
}
