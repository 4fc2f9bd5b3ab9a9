//! Common harness for instrumentation integration tests.

use std::sync::{Arc, Once};

use stmtdiag::{
    InstrumentationConfig, InstrumentationHelper, InstrumentationServices, NodeId, TestingKnobs,
    explain::{ExplainPlan, PlanNode},
    stats::{ComponentId, ComponentStats, FlowsMetadata},
    testing::{InMemoryBundleStore, MockDiagnosticsRegistry},
    tracing_support::{SpanHandle, Telemetry},
};
use uuid::Uuid;

static TRACING: Once = Once::new();

/// Installs a log subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Server-lifetime doubles shared by the helpers of one test.
pub struct TestFixture {
    pub bundles: Arc<InMemoryBundleStore>,
    pub registry: Arc<MockDiagnosticsRegistry>,
    pub telemetry: Telemetry,
    pub services: InstrumentationServices,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_registry(MockDiagnosticsRegistry::new())
    }

    pub fn with_registry(registry: MockDiagnosticsRegistry) -> Self {
        init_tracing();
        let bundles = Arc::new(InMemoryBundleStore::new());
        let registry = Arc::new(registry);
        let telemetry = Telemetry::default();
        let services = InstrumentationServices::new(bundles.clone())
            .with_registry(registry.clone())
            .with_telemetry(telemetry.clone())
            .with_config(InstrumentationConfig::builder().admin_url("http://admin:8080").build());
        Self { bundles, registry, telemetry, services }
    }

    #[allow(dead_code)]
    pub fn with_knobs(mut self, knobs: TestingKnobs) -> Self {
        self.services = self.services.with_knobs(knobs);
        self
    }

    pub fn helper(&self) -> InstrumentationHelper {
        InstrumentationHelper::new(self.services.clone())
    }
}

/// A two-operator plan with one literal.
#[allow(dead_code)]
pub fn sample_plan() -> ExplainPlan {
    ExplainPlan::new(
        PlanNode::new("render").with_child(
            PlanNode::new("scan")
                .with_field("table", "kv@primary")
                .with_literal("spans", "/1-/2", "INT8"),
        ),
    )
}

pub fn flow_id() -> Uuid {
    Uuid::from_u128(0xf10)
}

/// Metadata for one sub-plan spread over `nodes`.
#[allow(dead_code)]
pub fn flows_on(nodes: &[u32]) -> FlowsMetadata {
    nodes.iter().fold(FlowsMetadata::new(), |m, n| m.with_flow(NodeId(*n), flow_id()))
}

/// Records a stream on `node` that sent `bytes`, as a remote flow would.
#[allow(dead_code)]
pub fn record_stream(span: &SpanHandle, stream: u32, node: u32, bytes: u64) {
    let mut stats = ComponentStats::new(ComponentId::stream(flow_id(), stream, NodeId(node)));
    stats.net_tx.bytes_sent = bytes;
    stats.net_tx.tuples_sent = bytes / 8;
    let child = span.child("flow");
    stats.record_into(&child).expect("stats encode");
    child.finish();
}
