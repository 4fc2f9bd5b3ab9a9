//! Diagnostics bundle tests.

use stmtdiag::{
    Error, ExecutionSummary, OutputMode,
    explain::{ExplainFlags, PlanDistribution, PlanInfo},
    instrumentation::StatementTag,
    stats::PhaseTimes,
    testing::{MockDiagnosticsRegistry, RecordingResult},
};

use crate::common::{TestFixture, sample_plan};

async fn run_debug_mode(fixture: &TestFixture, res: &mut RecordingResult) -> Result<(), Error> {
    let mut helper = fixture.helper();
    helper.set_output_mode(OutputMode::ExplainAnalyzeDebug, ExplainFlags::default())?;
    helper.setup("SELECT _ FROM kv WHERE k = $1", true).await?;
    helper.record_explain_plan(sample_plan());
    helper.record_plan_info(PlanInfo { distribution: PlanDistribution::Local, vectorized: true });

    let times = PhaseTimes::deterministic();
    let placeholders = vec!["'a'".to_string()];
    let summary = ExecutionSummary::new("SELECT * FROM kv WHERE k = $1", &times)
        .with_placeholders(&placeholders);
    helper.finish(summary, res, Ok(())).await
}

/// Test that EXPLAIN ANALYZE (DEBUG) returns a link to the stored bundle
#[tokio::test]
async fn test_debug_mode_returns_link() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new();
    run_debug_mode(&fixture, &mut res).await.expect("finish");

    assert_eq!(res.stmt_type(), Some(StatementTag::ExplainAnalyzeDebug));
    assert_eq!(res.rows(), vec!["Direct link: http://admin:8080/_admin/v1/stmtbundle/1"]);
    assert_eq!(fixture.bundles.len(), 1);
    assert_eq!(fixture.telemetry.snapshot().diagnostics_collected, 1);
    assert_eq!(fixture.telemetry.snapshot().explain_analyze_outputs, 1);
}

/// Test that the stored bundle carries the full plan and the placeholders
#[tokio::test]
async fn test_bundle_contents() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new();
    run_debug_mode(&fixture, &mut res).await.expect("finish");

    let stored = fixture.bundles.bundles_for("SELECT _ FROM kv WHERE k = $1");
    assert_eq!(stored.len(), 1);
    let bundle = &stored[0].bundle;
    assert_eq!(bundle.statement, "SELECT * FROM kv WHERE k = $1");
    assert!(bundle.plan.contains("• render"));
    assert!(bundle.plan.contains("spans: /1-/2:::INT8"), "bundle plans keep values and types");
    assert!(bundle.plan.contains("distribution: local"));
    assert!(bundle.plan.ends_with('\n'));
    assert_eq!(bundle.placeholders, vec!["'a'".to_string()]);
    assert!(!stored[0].request_id.is_set(), "EXPLAIN ANALYZE bundles serve no request");

    let json = bundle.to_json().expect("json");
    assert!(json.contains("traced statement"));
}

/// Test that a storage failure is reported in place of the link
#[tokio::test]
async fn test_bundle_failure_row() {
    let fixture = TestFixture::new();
    fixture.bundles.set_failing(true);
    let mut res = RecordingResult::new();
    run_debug_mode(&fixture, &mut res).await.expect("finish");

    let rows = res.rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("Error generating bundle: "), "got {rows:?}");
    let snapshot = fixture.telemetry.snapshot();
    assert_eq!(snapshot.bundle_failures, 1);
    assert_eq!(snapshot.diagnostics_collected, 0);
}

/// Test that the request is completed even when the bundle cannot be stored
#[tokio::test]
async fn test_request_completed_on_storage_failure() {
    let fixture =
        TestFixture::with_registry(MockDiagnosticsRegistry::new().collect_for("SELECT _", 11));
    fixture.bundles.set_failing(true);
    let mut helper = fixture.helper();
    helper.setup("SELECT _", true).await.expect("setup");

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Ok::<(), Error>(()))
        .await
        .expect("storage failures are not statement errors");

    assert_eq!(fixture.registry.completed(), vec![11]);
    assert!(res.is_untouched());
}

/// Test that a bundle is still collected when execution failed
#[tokio::test]
async fn test_bundle_collected_on_execution_error() {
    let fixture =
        TestFixture::with_registry(MockDiagnosticsRegistry::new().collect_for("SELECT _", 5));
    let mut helper = fixture.helper();
    helper.setup("SELECT _", true).await.expect("setup");

    let times = PhaseTimes::new();
    let mut res = RecordingResult::new();
    let out = helper
        .finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Err(Error::cancelled()))
        .await;

    assert!(out.is_err());
    assert_eq!(fixture.bundles.len(), 1);
    assert_eq!(fixture.bundles.bundles()[0].bundle.plan, "", "no plan was recorded");
}
