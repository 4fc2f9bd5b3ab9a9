//! EXPLAIN ANALYZE (PLAN) output tests.

use stmtdiag::{
    Error, ErrorKind, ExecutionSummary, OutputMode, TestingKnobs,
    explain::{ExplainFlags, OutputBuilder},
    instrumentation::{EXPERIMENTAL_WARNING, StatementTag},
    stats::{PhaseTimes, SessionPhase, format_latency},
    testing::{RecordingResult, ResultEvent},
};

use crate::common::{TestFixture, sample_plan};

async fn run_plan_mode(fixture: &TestFixture, res: &mut RecordingResult) -> Result<(), Error> {
    let mut helper = fixture.helper();
    helper.set_output_mode(OutputMode::ExplainAnalyzePlan, ExplainFlags::default())?;
    helper.setup("SELECT _ FROM kv", true).await?;
    helper.record_explain_plan(sample_plan());

    let times = PhaseTimes::deterministic();
    helper.finish(ExecutionSummary::new("SELECT * FROM kv", &times), res, Ok(())).await
}

/// Test that the result is the plan rows followed by a blank row and the warning
#[tokio::test]
async fn test_plan_rows_then_trailer() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new();
    run_plan_mode(&fixture, &mut res).await.expect("finish");

    let times = PhaseTimes::deterministic();
    let mut builder = OutputBuilder::new(ExplainFlags::default());
    builder.add_field("planning time", format_latency(times.planning_latency()));
    builder.add_field("execution time", format_latency(times.run_latency()));
    builder.emit(&sample_plan(), None).expect("emit");
    let plan_rows = builder.build_string_rows();

    let rows = res.rows();
    assert_eq!(rows.len(), plan_rows.len() + 2);
    assert_eq!(&rows[..plan_rows.len()], plan_rows.as_slice());
    assert_eq!(rows[rows.len() - 2], "");
    assert_eq!(rows[rows.len() - 1], EXPERIMENTAL_WARNING);
    assert_eq!(res.stmt_type(), Some(StatementTag::ExplainAnalyzePlan));
    assert_eq!(res.events()[1], ResultEvent::SetColumns(vec!["info"]));
    assert_eq!(fixture.telemetry.snapshot().explain_analyze_outputs, 1);
}

/// Test that literals are shown without types unless asked for
#[tokio::test]
async fn test_plan_rows_render_literals() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new();
    run_plan_mode(&fixture, &mut res).await.expect("finish");

    let rows = res.rows();
    assert!(rows.iter().any(|row| row.contains("spans: /1-/2")));
    assert!(!rows.iter().any(|row| row.contains(":::")));
}

/// Test that deterministic timings make repeated runs byte-identical
#[tokio::test]
async fn test_deterministic_output_is_repeatable() {
    let fixture = TestFixture::new().with_knobs(TestingKnobs::new().with_deterministic_explain_analyze());

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let mut helper = fixture.helper();
        helper
            .set_output_mode(OutputMode::ExplainAnalyzePlan, ExplainFlags::default())
            .expect("set mode");
        helper.setup("SELECT _ FROM kv", true).await.expect("setup");
        helper.record_explain_plan(sample_plan());

        // Wall-clock phase times are replaced by the knob.
        let mut times = PhaseTimes::new();
        times.record_now(SessionPhase::QueryReceived).expect("record");

        let mut res = RecordingResult::new();
        helper
            .finish(ExecutionSummary::new("SELECT * FROM kv", &times), &mut res, Ok::<(), Error>(()))
            .await
            .expect("finish");
        outputs.push(res.rows());
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0][0], "planning time: 11µs");
    assert_eq!(outputs[0][1], "execution time: 100µs");
}

/// Test that a failing client write replaces an `Ok` outcome
#[tokio::test]
async fn test_write_failure_becomes_the_error() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new().fail_after_rows(1);
    let err = run_plan_mode(&fixture, &mut res).await.expect_err("write failure");

    assert_eq!(err.kind(), ErrorKind::Communication);
    assert_eq!(res.rows().len(), 1);
    assert_eq!(res.row_attempts(), 2, "writing stops at the first failure");
    assert_eq!(fixture.telemetry.snapshot().explain_analyze_outputs, 0);
}

/// Test that a statistic-scoped write failure leaves the statement outcome alone
#[tokio::test]
async fn test_non_communication_write_failure_is_skipped() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new().fail_after_rows_with(1, ErrorKind::Internal);
    run_plan_mode(&fixture, &mut res).await.expect("statement outcome unchanged");

    assert_eq!(res.rows().len(), 1);
    assert_eq!(res.row_attempts(), 2);
    assert_eq!(fixture.telemetry.snapshot().explain_analyze_outputs, 0);
}

/// Test that an execution error takes precedence over the replacement result
#[tokio::test]
async fn test_execution_error_wins() {
    let fixture = TestFixture::new();
    let mut helper = fixture.helper();
    helper
        .set_output_mode(OutputMode::ExplainAnalyzePlan, ExplainFlags::default())
        .expect("set mode");
    helper.setup("SELECT _ FROM kv", true).await.expect("setup");
    helper.record_explain_plan(sample_plan());

    let times = PhaseTimes::deterministic();
    let mut res = RecordingResult::new().fail_after_rows(0);
    let out = helper
        .finish(
            ExecutionSummary::new("SELECT * FROM kv", &times),
            &mut res,
            Err(Error::internal("execution failed")),
        )
        .await;

    assert_eq!(out.expect_err("execution error").message(), "execution failed");
    assert!(res.is_untouched());
}

/// Test that a result already carrying an error gets a header but no rows
#[tokio::test]
async fn test_result_with_error_gets_no_rows() {
    let fixture = TestFixture::new();
    let mut res = RecordingResult::new().with_error(Error::communication("client gone"));
    run_plan_mode(&fixture, &mut res).await.expect("finish");

    assert_eq!(res.stmt_type(), Some(StatementTag::ExplainAnalyzePlan));
    assert!(res.rows().is_empty());
    assert_eq!(res.row_attempts(), 0);
}

/// Test that missing a plan still yields the trailer
#[tokio::test]
async fn test_missing_plan_yields_trailer_only() {
    let fixture = TestFixture::new();
    let mut helper = fixture.helper();
    helper
        .set_output_mode(OutputMode::ExplainAnalyzePlan, ExplainFlags::default())
        .expect("set mode");
    helper.setup("SET x = _", true).await.expect("setup");

    let times = PhaseTimes::deterministic();
    let mut res = RecordingResult::new();
    helper
        .finish(ExecutionSummary::new("SET x = 1", &times), &mut res, Ok::<(), Error>(()))
        .await
        .expect("finish");

    assert_eq!(res.rows(), vec![String::new(), EXPERIMENTAL_WARNING.to_string()]);
}
