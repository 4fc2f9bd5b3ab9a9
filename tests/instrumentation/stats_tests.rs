//! Statement statistics fold-in tests.

use stmtdiag::{
    Error, ExecutionSummary, NodeId, OutputMode, StatementKey,
    explain::ExplainFlags,
    stats::{ComponentId, ComponentStats, FlowsMetadata, PhaseTimes},
    testing::RecordingResult,
    tracing_support::SpanHandle,
};

use crate::common::{TestFixture, flow_id, flows_on, record_stream, sample_plan};

const BYTES: u64 = 4096;

async fn run_with_flows(
    fixture: &TestFixture,
    flows: &[FlowsMetadata],
    record: impl FnOnce(&SpanHandle),
) {
    let mut helper = fixture.helper();
    helper
        .set_output_mode(OutputMode::ExplainAnalyzeDebug, ExplainFlags::default())
        .expect("set mode");
    let setup = helper.setup("SELECT _ FROM kv", false).await.expect("setup");
    record(&setup.span.expect("span"));

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    helper
        .finish(
            ExecutionSummary::new("SELECT * FROM kv", &times).with_flows(flows),
            &mut res,
            Ok::<(), Error>(()),
        )
        .await
        .expect("finish");
}

fn key() -> StatementKey {
    StatementKey::new("SELECT _ FROM kv", false)
}

/// Test that bytes sent by every node of every flow are summed
#[tokio::test]
async fn test_network_bytes_summed_across_nodes() {
    let fixture = TestFixture::new();
    let flows = [flows_on(&[1, 2, 3])];
    run_with_flows(&fixture, &flows, |span| {
        for node in 1..=3 {
            record_stream(span, node, node, BYTES);
        }
    })
    .await;

    let entry = fixture.services.stats.get(&key()).expect("entry");
    let stats = entry.lock();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.network_sample_count, 1);
    assert_eq!(stats.bytes_sent_over_network.mean, (3 * BYTES) as f64);
    assert_eq!(fixture.telemetry.snapshot().flows_analyzed, 1);
}

/// Test that a node which sent nothing contributes zero
#[tokio::test]
async fn test_silent_node_contributes_zero() {
    let fixture = TestFixture::new();
    let flows = [flows_on(&[1, 2, 3])];
    run_with_flows(&fixture, &flows, |span| {
        record_stream(span, 1, 1, BYTES);
        record_stream(span, 2, 2, BYTES);
    })
    .await;

    let entry = fixture.services.stats.get(&key()).expect("entry");
    assert_eq!(entry.lock().bytes_sent_over_network.mean, (2 * BYTES) as f64);
}

/// Test that every sub-plan is analyzed separately and summed
#[tokio::test]
async fn test_subflows_are_summed() {
    let fixture = TestFixture::new();
    let other_flow = uuid::Uuid::from_u128(0xf11);
    let flows = [flows_on(&[1]), FlowsMetadata::new().with_flow(NodeId(2), other_flow)];
    run_with_flows(&fixture, &flows, |span| {
        record_stream(span, 1, 1, BYTES);
        let mut stats = ComponentStats::new(ComponentId::stream(other_flow, 1, NodeId(2)));
        stats.net_tx.bytes_sent = 100;
        stats.record_into(span).expect("record");
    })
    .await;

    let entry = fixture.services.stats.get(&key()).expect("entry");
    assert_eq!(entry.lock().bytes_sent_over_network.mean, (BYTES + 100) as f64);
    assert_eq!(fixture.telemetry.snapshot().flows_analyzed, 2);
}

/// Test that a malformed record skips its flow without failing the statement
#[tokio::test]
async fn test_malformed_stats_skip_flow() {
    let fixture = TestFixture::new();
    let flows = [flows_on(&[1])];
    run_with_flows(&fixture, &flows, |span| {
        let mut stats = ComponentStats::new(ComponentId::stream(flow_id(), 1, NodeId(1)));
        stats.net_rx.bytes_received = 10;
        stats.net_tx.bytes_sent = 10;
        stats.record_into(span).expect("record");
    })
    .await;

    let snapshot = fixture.telemetry.snapshot();
    assert_eq!(snapshot.flows_skipped, 1);
    assert_eq!(snapshot.flows_analyzed, 0);
    let entry = fixture.services.stats.get(&key()).expect("entry");
    let stats = entry.lock();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.bytes_sent_over_network.mean, 0.0);
}

/// Test that the redacted plan is sampled and stays stable
#[tokio::test]
async fn test_plan_sampled_for_stats() {
    let fixture = TestFixture::new();
    let mut helper = fixture.helper();
    helper.setup("SELECT _ FROM kv", false).await.expect("setup");
    helper.record_explain_plan(sample_plan());

    let first = helper.plan_for_stats().expect("plan");
    assert_eq!(helper.plan_for_stats(), Some(first.clone()));
    let scan = &first.children[0];
    assert!(scan.attrs.iter().all(|attr| attr.key != "spans" || attr.value == "_"));

    // An armed span is needed for the fold-in.
    let mut armed = fixture.helper();
    armed
        .set_output_mode(OutputMode::ExplainAnalyzeDebug, ExplainFlags::default())
        .expect("set mode");
    armed.setup("SELECT _ FROM kv", false).await.expect("setup");
    assert!(armed.should_build_explain_plan());
    armed.record_explain_plan(sample_plan());

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    armed
        .finish(ExecutionSummary::new("SELECT * FROM kv", &times), &mut res, Ok::<(), Error>(()))
        .await
        .expect("finish");

    let entry = fixture.services.stats.get(&key()).expect("entry");
    assert_eq!(entry.lock().sampled_plan, Some(first));

    let mut next = fixture.helper();
    next.setup("SELECT _ FROM kv", false).await.expect("setup");
    assert!(!next.should_build_explain_plan(), "a fresh sample exists");
}

/// Test that bytes overflowing a 64-bit counter skip the flow, not the statement
#[tokio::test]
async fn test_overflowing_bytes_skip_flow() {
    let fixture = TestFixture::new();
    let half = u64::MAX / 2 + 1;
    let flows = [flows_on(&[1, 2])];
    run_with_flows(&fixture, &flows, |span| {
        record_stream(span, 1, 1, half);
        record_stream(span, 2, 2, half);
    })
    .await;

    let snapshot = fixture.telemetry.snapshot();
    assert_eq!(snapshot.flows_skipped, 1);
    assert_eq!(snapshot.flows_analyzed, 0);
    let entry = fixture.services.stats.get(&key()).expect("entry");
    assert_eq!(entry.lock().bytes_sent_over_network.mean, 0.0);
}

/// Test that a sum overflowing across sub-flows skips the later flow
#[tokio::test]
async fn test_overflow_across_subflows_skips_later_flow() {
    let fixture = TestFixture::new();
    let half = u64::MAX / 2 + 1;
    let other_flow = uuid::Uuid::from_u128(0xf12);
    let flows = [flows_on(&[1]), FlowsMetadata::new().with_flow(NodeId(2), other_flow)];
    run_with_flows(&fixture, &flows, |span| {
        record_stream(span, 1, 1, half);
        let mut stats = ComponentStats::new(ComponentId::stream(other_flow, 1, NodeId(2)));
        stats.net_tx.bytes_sent = half;
        stats.record_into(span).expect("record");
    })
    .await;

    let snapshot = fixture.telemetry.snapshot();
    assert_eq!(snapshot.flows_analyzed, 1);
    assert_eq!(snapshot.flows_skipped, 1);
    let entry = fixture.services.stats.get(&key()).expect("entry");
    assert_eq!(entry.lock().bytes_sent_over_network.mean, half as f64);
}
