//! The diagnostics bundle artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Result, tracing_support::Recording, types::StatementFingerprint};

/// Everything needed to debug one statement execution after the fact.
///
/// A bundle is built once, at the end of an execution that requested it,
/// and never modified.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::bundle::DiagnosticsBundle;
/// use stmtdiag::tracing_support::RecordingSpan;
///
/// let trace = RecordingSpan::start("traced statement").finish();
/// let bundle = DiagnosticsBundle::builder()
///     .fingerprint("SELECT _")
///     .statement("SELECT 1")
///     .plan("• values\n")
///     .trace(trace)
///     .build();
///
/// assert!(bundle.placeholders.is_empty());
/// assert!(bundle.trace_json()?.starts_with('['));
/// # Ok::<(), stmtdiag::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct DiagnosticsBundle {
    /// The statement's fingerprint.
    #[builder(into)]
    pub fingerprint: StatementFingerprint,
    /// The statement as executed.
    #[builder(into)]
    pub statement: String,
    /// The verbose, unredacted plan.
    #[builder(into)]
    pub plan: String,
    /// The full trace of the execution.
    pub trace: Recording,
    /// Rendered placeholder values, in order.
    #[builder(default)]
    pub placeholders: Vec<String>,
    /// When the bundle was built.
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl DiagnosticsBundle {
    /// Renders the trace for persistence.
    pub fn trace_json(&self) -> Result<String> {
        self.trace.to_json()
    }

    /// Serializes the whole bundle.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tracing_support::RecordingSpan;

    fn bundle() -> DiagnosticsBundle {
        let span = RecordingSpan::start("traced statement");
        span.handle().log("executing");
        DiagnosticsBundle::builder()
            .fingerprint("SELECT * FROM t WHERE k = _")
            .statement("SELECT * FROM t WHERE k = $1")
            .plan("• scan\n")
            .trace(span.finish())
            .placeholders(vec!["$1 = 42".to_string()])
            .build()
    }

    #[test]
    fn test_json_roundtrip() {
        let bundle = bundle();
        let json = bundle.to_json().unwrap();
        let decoded: DiagnosticsBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_trace_json_contains_logs() {
        let json = bundle().trace_json().unwrap();
        assert!(json.contains("executing"));
        assert!(json.contains("traced statement"));
    }
}
