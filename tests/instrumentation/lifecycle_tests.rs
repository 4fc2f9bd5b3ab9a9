//! Setup and Finish lifecycle tests.

use std::sync::Arc;

use parking_lot::Mutex;

use stmtdiag::{
    Error, ErrorKind, ExecutionSummary, InstrumentationState, OutputMode, StatementFingerprint,
    TestingKnobs,
    explain::ExplainFlags,
    stats::PhaseTimes,
    testing::{MockDiagnosticsRegistry, RecordingResult},
    tracing_support::{STATEMENT_DIAGNOSTICS_COLLECTED, TelemetrySnapshot},
};

use crate::common::TestFixture;

/// Test that an ordinary statement nobody asked about is never traced
#[tokio::test]
async fn test_untraced_statement_skips_finish() {
    let fixture = TestFixture::new();
    let mut helper = fixture.helper();

    let setup = helper.setup("SELECT _", true).await.expect("setup");
    assert!(!setup.need_finish);
    assert!(setup.span.is_none());
    assert!(!helper.should_collect_bundle());
    assert!(!helper.should_discard_rows());
    assert_eq!(fixture.registry.call_count(), 1);

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    let out = helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Err(Error::cancelled()))
        .await;

    assert_eq!(out.expect_err("input error").kind(), ErrorKind::Cancelled);
    assert!(res.is_untouched());
    assert!(fixture.bundles.is_empty());
    assert!(fixture.services.stats.is_empty());
    assert_eq!(fixture.telemetry.snapshot(), TelemetrySnapshot::default());
    assert_eq!(fixture.registry.call_count(), 1, "finish must not consult the registry");
}

/// Test that EXPLAIN ANALYZE (DEBUG) both collects and discards rows
#[tokio::test]
async fn test_debug_mode_flags() {
    let fixture = TestFixture::new();
    let mut helper = fixture.helper();
    helper
        .set_output_mode(OutputMode::ExplainAnalyzeDebug, ExplainFlags::default())
        .expect("set mode");

    let setup = helper.setup("SELECT _", false).await.expect("setup");
    assert!(setup.need_finish);
    assert!(helper.should_collect_bundle());
    assert!(helper.should_discard_rows());
    assert!(helper.should_build_explain_plan());
    assert_eq!(helper.state(), InstrumentationState::Armed);
    assert_eq!(fixture.registry.call_count(), 0);
}

/// Test a registry-requested bundle for `SELECT 1` end to end
#[tokio::test]
async fn test_registry_request_end_to_end() {
    let fixture =
        TestFixture::with_registry(MockDiagnosticsRegistry::new().collect_for("SELECT _", 7));
    let mut helper = fixture.helper();

    let setup = helper.setup("SELECT _", true).await.expect("setup");
    assert!(setup.need_finish);
    assert!(helper.should_collect_bundle());
    assert!(!helper.should_discard_rows());

    let span = setup.span.expect("span");
    span.log("executing");

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Ok::<(), Error>(()))
        .await
        .expect("finish");

    let stored = fixture.bundles.bundles();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].statement, "SELECT 1");
    assert_eq!(stored[0].request_id.0, 7);
    assert!(!stored[0].bundle.trace.is_empty());
    assert_eq!(fixture.telemetry.snapshot().diagnostics_collected, 1);
    assert_eq!(fixture.registry.completed(), vec![7]);
    assert!(res.is_untouched(), "unmodified output keeps the statement's rows");
    assert!(!span.is_recording());
}

/// Test that a registry request for fingerprint `SELECT 1` yields exactly one
/// insert and one telemetry increment, leaving the result untouched
#[tokio::test]
async fn test_select_one_registry_request() {
    let fixture =
        TestFixture::with_registry(MockDiagnosticsRegistry::new().collect_for("SELECT 1", 1));
    let mut helper = fixture.helper();

    let setup = helper.setup("SELECT 1", true).await.expect("setup");
    assert!(setup.need_finish);

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Ok::<(), Error>(()))
        .await
        .expect("finish");

    assert_eq!(fixture.bundles.len(), 1);
    assert_eq!(fixture.bundles.bundles_for("SELECT 1").len(), 1);
    assert_eq!(fixture.telemetry.snapshot().diagnostics_collected, 1);
    assert_eq!(fixture.telemetry.counter(STATEMENT_DIAGNOSTICS_COLLECTED).value(), 1);
    assert_eq!(fixture.registry.calls(), vec![StatementFingerprint::new("SELECT 1")]);
    assert!(res.is_untouched());
}

/// Test that a registered trace consumer sees the recording and raw SQL
#[tokio::test]
async fn test_statement_trace_callback() {
    let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let knobs = TestingKnobs::new().with_statement_trace(move |trace, sql| {
        sink.lock().push((trace.len(), sql.to_string()));
    });
    let fixture = TestFixture::new().with_knobs(knobs);
    let mut helper = fixture.helper();

    let setup = helper.setup("SELECT _", true).await.expect("setup");
    assert!(setup.need_finish, "a trace consumer arms the span");
    assert!(!helper.should_collect_bundle());
    setup.span.expect("span").child("scan").finish();

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    let summary = ExecutionSummary::new("SELECT 1", &times).with_raw_sql("select 1");
    helper.finish(summary, &mut res, Ok::<(), Error>(())).await.expect("finish");

    let seen = seen.lock();
    assert_eq!(seen.as_slice(), &[(2, "select 1".to_string())]);
    assert!(fixture.bundles.is_empty());
}

/// Test that the trace consumer runs even when execution failed
#[tokio::test]
async fn test_statement_trace_callback_on_error() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let knobs = TestingKnobs::new().with_statement_trace(move |_, _| {
        *counter.lock() += 1;
    });
    let fixture = TestFixture::new().with_knobs(knobs);
    let mut helper = fixture.helper();
    helper.setup("SELECT _", true).await.expect("setup");

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    let out = helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Err(Error::internal("boom")))
        .await;
    assert_eq!(out.expect_err("input error").message(), "boom");
    assert_eq!(*calls.lock(), 1);
}

/// Test that dropping an armed helper closes the span without collecting
#[tokio::test]
async fn test_dropped_helper_closes_span() {
    let fixture =
        TestFixture::with_registry(MockDiagnosticsRegistry::new().collect_for("SELECT _", 3));
    let span = {
        let mut helper = fixture.helper();
        helper.setup("SELECT _", true).await.expect("setup").span.expect("span")
    };

    assert!(!span.is_recording());
    assert!(fixture.bundles.is_empty());
    assert!(fixture.registry.completed().is_empty());
}
