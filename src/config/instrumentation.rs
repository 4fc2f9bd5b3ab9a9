//! Server-wide instrumentation settings.

use crate::explain::DEFAULT_MAX_PLAN_DEPTH;

/// Span operation name used for traced statements.
pub const DEFAULT_SPAN_OPERATION: &str = "traced statement";

/// Configuration shared by every statement's instrumentation.
///
/// ## Default Values
///
/// - `span_operation`: `"traced statement"`
/// - `admin_url`: `""` (bundle links are then relative)
/// - `max_plan_depth`: 256
///
/// ## Example
///
/// ```rust
/// use stmtdiag::InstrumentationConfig;
///
/// let config = InstrumentationConfig::builder()
///     .admin_url("https://db.example.com:8080")
///     .build();
/// assert_eq!(config.span_operation, "traced statement");
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct InstrumentationConfig {
    /// Operation name of the full-recording span.
    #[builder(into, default = DEFAULT_SPAN_OPERATION.to_string())]
    pub span_operation: String,

    /// Base URL of the admin UI, used in bundle links.
    #[builder(into, default)]
    pub admin_url: String,

    /// Deepest plan the explain renderers accept.
    #[builder(default = DEFAULT_MAX_PLAN_DEPTH)]
    pub max_plan_depth: usize,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InstrumentationConfig {
    /// Sets the admin UI URL.
    #[must_use]
    pub fn with_admin_url(mut self, url: impl Into<String>) -> Self {
        self.admin_url = url.into();
        self
    }
}
