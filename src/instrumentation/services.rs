//! The collaborators shared by every statement's instrumentation.

use std::{fmt, sync::Arc};

use crate::{
    bundle::BundleStore,
    config::{InstrumentationConfig, TestingKnobs},
    diagnostics::{DiagnosticsRegistry, NeverCollect},
    stats::StatementStatsStore,
    tracing_support::{InProcessTracer, Telemetry, Tracer},
};

/// Server-lifetime collaborators injected into each
/// [`InstrumentationHelper`](super::InstrumentationHelper).
///
/// Created once at server start; cloning is cheap and every clone shares the
/// same stores and counters.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use stmtdiag::InstrumentationServices;
/// use stmtdiag::testing::InMemoryBundleStore;
///
/// let bundles = Arc::new(InMemoryBundleStore::new());
/// let services = InstrumentationServices::new(bundles.clone());
/// assert!(services.stats.is_empty());
/// ```
#[derive(Clone)]
pub struct InstrumentationServices {
    /// Starts full-recording spans.
    pub tracer: Arc<dyn Tracer>,
    /// Decides which executions collect diagnostics bundles.
    pub registry: Arc<dyn DiagnosticsRegistry>,
    /// Persists diagnostics bundles.
    pub bundle_store: Arc<dyn BundleStore>,
    /// Cumulative per-fingerprint statistics.
    pub stats: Arc<StatementStatsStore>,
    /// Instrumentation counters.
    pub telemetry: Telemetry,
    /// Instrumentation settings.
    pub config: Arc<InstrumentationConfig>,
    /// Test-only switches.
    pub knobs: TestingKnobs,
}

impl InstrumentationServices {
    /// Creates services around `bundle_store`, with an in-process tracer, a
    /// registry that never requests bundles, and default settings.
    pub fn new(bundle_store: Arc<dyn BundleStore>) -> Self {
        Self {
            tracer: Arc::new(InProcessTracer),
            registry: Arc::new(NeverCollect),
            bundle_store,
            stats: Arc::new(StatementStatsStore::default()),
            telemetry: Telemetry::default(),
            config: Arc::new(InstrumentationConfig::default()),
            knobs: TestingKnobs::default(),
        }
    }

    /// Sets the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Sets the diagnostics registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn DiagnosticsRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the statement statistics store.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<StatementStatsStore>) -> Self {
        self.stats = stats;
        self
    }

    /// Sets the telemetry registry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: InstrumentationConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Sets the testing knobs.
    #[must_use]
    pub fn with_knobs(mut self, knobs: TestingKnobs) -> Self {
        self.knobs = knobs;
        self
    }
}

impl fmt::Debug for InstrumentationServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationServices")
            .field("stats", &self.stats.len())
            .field("telemetry", &self.telemetry.snapshot())
            .field("config", &self.config)
            .field("knobs", &self.knobs)
            .finish_non_exhaustive()
    }
}
