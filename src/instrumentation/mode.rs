//! Output modes and what each one implies.

use std::fmt;

use super::result::{CommandResult, EXPERIMENTAL_WARNING, StatementTag, write_text_rows};
use crate::{
    bundle::bundle_locator,
    error::Result,
    explain::{ExplainFlags, ExplainPlan, OutputBuilder, PlanInfo},
    stats::{PhaseTimes, format_latency},
    types::BundleId,
};

/// How the statement's result is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// The statement's own rows.
    #[default]
    Unmodified,
    /// `EXPLAIN ANALYZE (DEBUG)`: collect a bundle, return a link to it.
    ExplainAnalyzeDebug,
    /// `EXPLAIN ANALYZE (PLAN)`: return the plan annotated with timings.
    ExplainAnalyzePlan,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Unmodified => write!(f, "unmodified"),
            OutputMode::ExplainAnalyzeDebug => write!(f, "explain analyze (debug)"),
            OutputMode::ExplainAnalyzePlan => write!(f, "explain analyze (plan)"),
        }
    }
}

/// What happened to the bundle collected during Finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BundleOutcome {
    Stored(BundleId),
    Failed(String),
}

/// Everything a result writer may draw on.
pub(crate) struct ResultInputs<'a> {
    pub plan: Option<&'a ExplainPlan>,
    pub plan_info: Option<&'a PlanInfo>,
    pub explain_flags: ExplainFlags,
    pub phase_times: &'a PhaseTimes,
    pub bundle: Option<&'a BundleOutcome>,
    pub admin_url: &'a str,
    pub max_plan_depth: usize,
}

/// Replaces the statement result; fails only when writing rows fails.
pub(crate) type ResultWriter = fn(&ResultInputs<'_>, &mut dyn CommandResult) -> Result<()>;

/// The flags and result writer implied by an [`OutputMode`].
pub(crate) struct ModeBehavior {
    /// Collect a diagnostics bundle regardless of the registry.
    pub collect_bundle: bool,
    /// Do not send the statement's own rows to the client.
    pub discard_rows: bool,
    /// Ask the diagnostics registry whether to collect a bundle.
    pub consult_registry: bool,
    /// Replaces the statement result in Finish.
    pub writer: Option<ResultWriter>,
}

const UNMODIFIED: ModeBehavior =
    ModeBehavior { collect_bundle: false, discard_rows: false, consult_registry: true, writer: None };

const EXPLAIN_ANALYZE_DEBUG: ModeBehavior = ModeBehavior {
    collect_bundle: true,
    discard_rows: true,
    consult_registry: false,
    writer: Some(write_bundle_result),
};

const EXPLAIN_ANALYZE_PLAN: ModeBehavior = ModeBehavior {
    collect_bundle: false,
    discard_rows: true,
    consult_registry: false,
    writer: Some(write_explain_analyze_result),
};

impl OutputMode {
    pub(crate) fn behavior(self) -> &'static ModeBehavior {
        match self {
            OutputMode::Unmodified => &UNMODIFIED,
            OutputMode::ExplainAnalyzeDebug => &EXPLAIN_ANALYZE_DEBUG,
            OutputMode::ExplainAnalyzePlan => &EXPLAIN_ANALYZE_PLAN,
        }
    }
}

/// The single row pointing the client at the collected bundle.
pub(crate) fn bundle_row(outcome: Option<&BundleOutcome>, admin_url: &str) -> String {
    match outcome {
        Some(BundleOutcome::Stored(id)) => format!("Direct link: {}", bundle_locator(admin_url, *id)),
        Some(BundleOutcome::Failed(message)) => format!("Error generating bundle: {message}"),
        None => "Error generating bundle: no bundle was collected".to_string(),
    }
}

fn write_bundle_result(inputs: &ResultInputs<'_>, res: &mut dyn CommandResult) -> Result<()> {
    let row = bundle_row(inputs.bundle, inputs.admin_url);
    write_text_rows(res, StatementTag::ExplainAnalyzeDebug, [row])
}

/// Renders the EXPLAIN ANALYZE (PLAN) rows, without the trailer.
pub(crate) fn explain_analyze_rows(inputs: &ResultInputs<'_>) -> Vec<String> {
    let Some(plan) = inputs.plan else {
        return Vec::new();
    };
    let mut builder = OutputBuilder::new(inputs.explain_flags).with_max_depth(inputs.max_plan_depth);
    builder.add_field("planning time", format_latency(inputs.phase_times.planning_latency()));
    builder.add_field("execution time", format_latency(inputs.phase_times.run_latency()));
    match builder.emit(plan, inputs.plan_info) {
        Ok(()) => builder.build_string_rows(),
        Err(err) => vec![format!("error emitting plan: {}", err.message())],
    }
}

fn write_explain_analyze_result(
    inputs: &ResultInputs<'_>,
    res: &mut dyn CommandResult,
) -> Result<()> {
    // Skip rendering entirely when nothing can be written.
    if res.err().is_some() {
        return write_text_rows(res, StatementTag::ExplainAnalyzePlan, Vec::new());
    }
    let mut rows = explain_analyze_rows(inputs);
    rows.push(String::new());
    rows.push(EXPERIMENTAL_WARNING.to_string());
    write_text_rows(res, StatementTag::ExplainAnalyzePlan, rows)
}
