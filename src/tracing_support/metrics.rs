//! Telemetry counters for statement instrumentation.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

/// Name of the counter bumped once per completed diagnostics bundle.
pub const STATEMENT_DIAGNOSTICS_COLLECTED: &str = "sql.diagnostics.statement_diagnostics_collected";

/// Configuration for telemetry collection.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::tracing_support::TelemetryConfig;
///
/// let config = TelemetryConfig::builder().prefix("gateway").build();
/// assert_eq!(config.prefix, "gateway");
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct TelemetryConfig {
    /// Prefix applied to counter names when exported.
    #[builder(into, default = "sql".to_string())]
    pub prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A process-wide telemetry registry.
///
/// Cloning is cheap and every clone shares the same counters, so one
/// registry is created at server start and handed to every statement.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::tracing_support::Telemetry;
///
/// let telemetry = Telemetry::default();
/// telemetry.increment_diagnostics_collected();
/// assert_eq!(telemetry.snapshot().diagnostics_collected, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Debug)]
struct TelemetryInner {
    config: TelemetryConfig,
    diagnostics_collected: AtomicU64,
    bundle_failures: AtomicU64,
    explain_analyze_outputs: AtomicU64,
    flows_analyzed: AtomicU64,
    flows_skipped: AtomicU64,
    plan_render_failures: AtomicU64,
    custom_counters: RwLock<HashMap<String, AtomicU64>>,
}

impl Telemetry {
    /// Creates a new registry with the given configuration.
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                config,
                diagnostics_collected: AtomicU64::new(0),
                bundle_failures: AtomicU64::new(0),
                explain_analyze_outputs: AtomicU64::new(0),
                flows_analyzed: AtomicU64::new(0),
                flows_skipped: AtomicU64::new(0),
                plan_render_failures: AtomicU64::new(0),
                custom_counters: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the telemetry configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    /// Counts one completed diagnostics bundle.
    pub fn increment_diagnostics_collected(&self) {
        self.inner.diagnostics_collected.fetch_add(1, Ordering::Relaxed);
        self.counter(STATEMENT_DIAGNOSTICS_COLLECTED).increment();
    }

    /// Counts one bundle that could not be persisted.
    pub fn increment_bundle_failures(&self) {
        self.inner.bundle_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one EXPLAIN ANALYZE result written in place of the statement's rows.
    pub fn increment_explain_analyze_outputs(&self) {
        self.inner.explain_analyze_outputs.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one distributed sub-flow whose trace was analyzed.
    pub fn increment_flows_analyzed(&self) {
        self.inner.flows_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one distributed sub-flow skipped because analysis failed.
    pub fn increment_flows_skipped(&self) {
        self.inner.flows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one plan tree that could not be rendered.
    pub fn increment_plan_render_failures(&self) {
        self.inner.plan_render_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a named counter, creating it if it doesn't exist.
    pub fn counter(&self, name: &str) -> Counter {
        let counters = self.inner.custom_counters.read();
        if counters.contains_key(name) {
            drop(counters);
            return Counter { name: name.to_string(), telemetry: self.clone() };
        }
        drop(counters);

        let mut counters = self.inner.custom_counters.write();
        counters.entry(name.to_string()).or_insert_with(|| AtomicU64::new(0));

        Counter { name: name.to_string(), telemetry: self.clone() }
    }

    /// Returns a snapshot of current values.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            diagnostics_collected: self.inner.diagnostics_collected.load(Ordering::Relaxed),
            bundle_failures: self.inner.bundle_failures.load(Ordering::Relaxed),
            explain_analyze_outputs: self.inner.explain_analyze_outputs.load(Ordering::Relaxed),
            flows_analyzed: self.inner.flows_analyzed.load(Ordering::Relaxed),
            flows_skipped: self.inner.flows_skipped.load(Ordering::Relaxed),
            plan_render_failures: self.inner.plan_render_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.inner.diagnostics_collected.store(0, Ordering::Relaxed);
        self.inner.bundle_failures.store(0, Ordering::Relaxed);
        self.inner.explain_analyze_outputs.store(0, Ordering::Relaxed);
        self.inner.flows_analyzed.store(0, Ordering::Relaxed);
        self.inner.flows_skipped.store(0, Ordering::Relaxed);
        self.inner.plan_render_failures.store(0, Ordering::Relaxed);
        for counter in self.inner.custom_counters.read().values() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

/// A snapshot of telemetry values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Completed diagnostics bundles.
    pub diagnostics_collected: u64,
    /// Bundles that failed to persist.
    pub bundle_failures: u64,
    /// EXPLAIN ANALYZE results written.
    pub explain_analyze_outputs: u64,
    /// Sub-flows whose traces were analyzed.
    pub flows_analyzed: u64,
    /// Sub-flows skipped after an analysis failure.
    pub flows_skipped: u64,
    /// Plan trees that failed to render.
    pub plan_render_failures: u64,
}

/// A counter that can only be incremented.
#[derive(Debug, Clone)]
pub struct Counter {
    name: String,
    telemetry: Telemetry,
}

impl Counter {
    /// Returns the counter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the exported name, with the configured prefix.
    pub fn qualified_name(&self) -> String {
        let prefix = &self.telemetry.config().prefix;
        if prefix.is_empty() || self.name.starts_with(&format!("{prefix}.")) {
            self.name.clone()
        } else {
            format!("{prefix}.{}", self.name)
        }
    }

    /// Increments the counter by 1.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds the given value to the counter.
    pub fn add(&self, value: u64) {
        let counters = self.telemetry.inner.custom_counters.read();
        if let Some(counter) = counters.get(&self.name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> u64 {
        let counters = self.telemetry.inner.custom_counters.read();
        counters.get(&self.name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}
