//! StatementFingerprint, the aggregation key for statement statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The normalized identity of a statement.
///
/// Two executions of "the same" query with different literals share a
/// fingerprint (e.g. `SELECT * FROM t WHERE k = _`). Fingerprints key the
/// diagnostics registry, the bundle store and the cumulative statement
/// statistics.
///
/// ```rust
/// use stmtdiag::StatementFingerprint;
///
/// let fingerprint = StatementFingerprint::new("SELECT _");
/// assert_eq!(fingerprint.as_str(), "SELECT _");
/// assert_eq!(fingerprint.to_string(), "SELECT _");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementFingerprint(String);

impl StatementFingerprint {
    /// Creates a fingerprint from an already-normalized statement.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the fingerprint text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the fingerprint is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StatementFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatementFingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StatementFingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StatementFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The key of one cumulative statistics record.
///
/// Statements run inside an implicit transaction are tracked separately from
/// the same statement run in an explicit one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatementKey {
    /// The statement fingerprint.
    pub fingerprint: StatementFingerprint,
    /// Whether the statement ran in an implicit transaction.
    pub implicit_txn: bool,
}

impl StatementKey {
    /// Creates a new key.
    pub fn new(fingerprint: impl Into<StatementFingerprint>, implicit_txn: bool) -> Self {
        Self { fingerprint: fingerprint.into(), implicit_txn }
    }
}
