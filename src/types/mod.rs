//! Core identity types.
//!
//! - [`StatementFingerprint`] / [`StatementKey`]: what statistics aggregate on
//! - [`NodeId`]: a cluster node
//! - [`RequestId`] / [`BundleId`]: diagnostics requests and their artifacts

mod fingerprint;
mod ids;

pub use fingerprint::{StatementFingerprint, StatementKey};
pub use ids::{BundleId, NodeId, RequestId};
