//! Main error type for statement instrumentation.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use super::{ErrorKind, FailureScope};

/// The primary error type for instrumentation operations.
///
/// ## Error Hierarchy
///
/// ```text
/// Error
/// ├── kind: ErrorKind          (category and failure scope)
/// ├── message: String          (human-readable description)
/// └── source: Option           (underlying cause)
/// ```
///
/// ## Example
///
/// ```rust
/// use stmtdiag::{Error, ErrorKind};
///
/// fn handle(err: Error) -> Result<(), Error> {
///     if err.is_statement_fatal() {
///         return Err(err);
///     }
///     // statistic-only failure: skip the contribution and carry on
///     Ok(())
/// }
///
/// assert!(handle(Error::render("unnamed node")).is_ok());
/// assert!(handle(Error::communication("connection reset")).is_err());
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    /// Creates an error from a kind with a default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::Communication => "failed to write statement result",
            ErrorKind::Cancelled => "statement execution cancelled",
            ErrorKind::Assertion => "instrumentation lifecycle violated",
            ErrorKind::TraceAnalysis => "unable to analyze trace",
            ErrorKind::MalformedStats => "unable to decode component stats",
            ErrorKind::Render => "unable to emit explain plan",
            ErrorKind::BundleStorage => "unable to persist diagnostics bundle",
            ErrorKind::Internal => "internal error",
        };
        Self::new(kind, message)
    }

    /// Returns the error kind for categorization.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the reach of this error.
    #[inline]
    pub fn scope(&self) -> FailureScope {
        self.kind.scope()
    }

    /// Returns `true` if this error must become the statement's result.
    #[inline]
    pub fn is_statement_fatal(&self) -> bool {
        self.kind.is_statement_fatal()
    }

    /// Sets the source error for this error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a communication error.
    pub fn communication(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Communication, message)
    }

    /// Creates a cancelled error.
    pub fn cancelled() -> Self {
        Self::from_kind(ErrorKind::Cancelled)
    }

    /// Creates an assertion error.
    pub fn assertion(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Assertion, message)
    }

    /// Creates a trace analysis error.
    pub fn trace_analysis(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::TraceAnalysis, message)
    }

    /// Creates a malformed stats error.
    pub fn malformed_stats(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::MalformedStats, message)
    }

    /// Creates a render error.
    pub fn render(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    /// Creates a bundle storage error.
    pub fn bundle_storage(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BundleStorage, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::malformed_stats(format!("JSON error: {}", err)).with_source(err)
    }
}
