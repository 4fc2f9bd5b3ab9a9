//! Error kind enumeration for categorizing instrumentation errors.

/// How far an error reaches.
///
/// Instrumentation must never abort a statement because a statistic could not
/// be computed. Errors scoped to a [`FailureScope::Statistic`] are logged and
/// their contribution skipped; only [`FailureScope::Statement`] errors are
/// surfaced as the statement's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureScope {
    /// Only the statistic (or artifact) being computed is lost.
    Statistic,
    /// The statement itself fails with this error.
    Statement,
}

/// Categorization of instrumentation errors.
///
/// | ErrorKind        | Scope     | Typical source                        |
/// |------------------|-----------|---------------------------------------|
/// | `Communication`  | Statement | Appending rows to the client result   |
/// | `Cancelled`      | Statement | Parent execution was cancelled        |
/// | `Assertion`      | Statement | Caller broke the lifecycle contract   |
/// | `TraceAnalysis`  | Statistic | Recording could not be interpreted    |
/// | `MalformedStats` | Statistic | Stats payload failed to decode        |
/// | `Render`         | Statistic | Explain plan emission failed          |
/// | `BundleStorage`  | Statistic | Diagnostics bundle persistence failed |
/// | `Internal`       | Statistic | Anything else                         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Writing to the statement result failed; the client connection is
    /// most likely broken.
    #[error("communication error")]
    Communication,

    /// The statement's execution was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A lifecycle contract was violated (double setup, mode change after
    /// setup, duplicate phase timestamp).
    ///
    /// These are programming errors and never expected under correct callers.
    #[error("assertion failed")]
    Assertion,

    /// A trace recording could not be analyzed.
    #[error("trace analysis error")]
    TraceAnalysis,

    /// A component statistics payload was malformed or inconsistent.
    #[error("malformed component stats")]
    MalformedStats,

    /// The explain plan could not be emitted.
    #[error("render error")]
    Render,

    /// Persisting a diagnostics bundle failed.
    #[error("bundle storage error")]
    BundleStorage,

    /// Unexpected internal error.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Returns the reach of errors of this kind.
    ///
    /// ```rust
    /// use stmtdiag::error::{ErrorKind, FailureScope};
    ///
    /// assert_eq!(ErrorKind::Communication.scope(), FailureScope::Statement);
    /// assert_eq!(ErrorKind::Render.scope(), FailureScope::Statistic);
    /// ```
    pub fn scope(&self) -> FailureScope {
        match self {
            ErrorKind::Communication | ErrorKind::Cancelled | ErrorKind::Assertion => {
                FailureScope::Statement
            },
            ErrorKind::TraceAnalysis
            | ErrorKind::MalformedStats
            | ErrorKind::Render
            | ErrorKind::BundleStorage
            | ErrorKind::Internal => FailureScope::Statistic,
        }
    }

    /// Returns `true` if an error of this kind must become the statement's
    /// result.
    pub fn is_statement_fatal(&self) -> bool {
        self.scope() == FailureScope::Statement
    }

    /// Returns a stable snake_case name, suitable for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Communication => "communication",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Assertion => "assertion",
            ErrorKind::TraceAnalysis => "trace_analysis",
            ErrorKind::MalformedStats => "malformed_stats",
            ErrorKind::Render => "render",
            ErrorKind::BundleStorage => "bundle_storage",
            ErrorKind::Internal => "internal",
        }
    }
}
