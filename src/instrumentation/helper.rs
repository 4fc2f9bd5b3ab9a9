//! The per-statement instrumentation controller.

use std::fmt;

use super::{
    mode::{BundleOutcome, OutputMode, ResultInputs},
    result::CommandResult,
    services::InstrumentationServices,
};
use crate::{
    bundle::DiagnosticsBundle,
    config::StatementTraceCallback,
    diagnostics::CompletionCallback,
    error::{Error, ErrorKind, FailureScope, Result},
    explain::{ExplainFlags, ExplainPlan, ExplainTreeNode, OutputBuilder, PlanInfo},
    stats::{FlowsMetadata, PhaseTimes, TraceAnalyzer},
    tracing_support::{Recording, RecordingSpan, SpanHandle},
    types::{RequestId, StatementFingerprint, StatementKey},
};

/// Where an [`InstrumentationHelper`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstrumentationState {
    /// Created; the output mode is still the default.
    #[default]
    Idle,
    /// An output mode was chosen.
    ModeSelected,
    /// A full-recording span is active; Finish must run.
    Armed,
    /// Nothing further will be collected.
    Finished,
}

/// What [`InstrumentationHelper::setup`] decided.
#[derive(Debug, Clone)]
pub struct SetupOutcome {
    /// Whether [`InstrumentationHelper::finish`] has any work to do.
    pub need_finish: bool,
    /// Handle to the statement's span, to be passed to execution.
    pub span: Option<SpanHandle>,
}

/// What the execution left behind for Finish.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionSummary<'a> {
    /// The statement, as shown in bundles and logs.
    pub statement: &'a str,
    /// The statement text as sent by the client.
    pub raw_sql: &'a str,
    /// Rendered placeholder values.
    pub placeholders: &'a [String],
    /// One entry per distributed sub-plan.
    pub flows: &'a [FlowsMetadata],
    /// Timestamps recorded while running the statement.
    pub phase_times: &'a PhaseTimes,
}

impl<'a> ExecutionSummary<'a> {
    /// Summarizes a local execution of `statement`.
    pub fn new(statement: &'a str, phase_times: &'a PhaseTimes) -> Self {
        Self { statement, raw_sql: statement, placeholders: &[], flows: &[], phase_times }
    }

    /// Sets the client's raw statement text.
    #[must_use]
    pub fn with_raw_sql(mut self, raw_sql: &'a str) -> Self {
        self.raw_sql = raw_sql;
        self
    }

    /// Sets the placeholder values.
    #[must_use]
    pub fn with_placeholders(mut self, placeholders: &'a [String]) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Sets the distributed sub-plans.
    #[must_use]
    pub fn with_flows(mut self, flows: &'a [FlowsMetadata]) -> Self {
        self.flows = flows;
        self
    }
}

/// Gathers diagnostics about one statement execution.
///
/// Typical usage:
///
/// 1. [`set_output_mode`](Self::set_output_mode) for EXPLAIN ANALYZE
///    variants.
/// 2. [`setup`](Self::setup) before execution. When it reports
///    `need_finish`, the returned span handle goes to every execution
///    component.
/// 3. [`record_explain_plan`](Self::record_explain_plan) and
///    [`record_plan_info`](Self::record_plan_info) while planning, if
///    [`should_build_explain_plan`](Self::should_build_explain_plan).
/// 4. [`finish`](Self::finish) after execution.
///
/// A helper belongs to the task running the statement and is never shared.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use stmtdiag::{ExecutionSummary, InstrumentationHelper, InstrumentationServices, OutputMode};
/// use stmtdiag::explain::{ExplainFlags, ExplainPlan, PlanNode};
/// use stmtdiag::stats::PhaseTimes;
/// use stmtdiag::testing::{InMemoryBundleStore, RecordingResult};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), stmtdiag::Error> {
/// let services = InstrumentationServices::new(Arc::new(InMemoryBundleStore::new()));
/// let mut helper = InstrumentationHelper::new(services);
/// helper.set_output_mode(OutputMode::ExplainAnalyzePlan, ExplainFlags::default())?;
///
/// let setup = helper.setup("SELECT _", true).await?;
/// assert!(setup.need_finish && helper.should_discard_rows());
///
/// helper.record_explain_plan(ExplainPlan::new(PlanNode::new("values")));
///
/// let times = PhaseTimes::deterministic();
/// let mut res = RecordingResult::new();
/// helper.finish(ExecutionSummary::new("SELECT 1", &times), &mut res, Ok::<(), stmtdiag::Error>(())).await?;
/// assert_eq!(res.rows().last().map(String::as_str), Some("WARNING: this statement is experimental!"));
/// # Ok(())
/// # }
/// ```
pub struct InstrumentationHelper {
    services: InstrumentationServices,
    state: InstrumentationState,
    mode: OutputMode,
    explain_flags: ExplainFlags,

    fingerprint: StatementFingerprint,
    implicit_txn: bool,

    collect_bundle: bool,
    discard_rows: bool,
    save_plan_for_stats: bool,
    request_id: RequestId,
    on_complete: Option<CompletionCallback>,
    with_statement_trace: Option<StatementTraceCallback>,

    span: Option<RecordingSpan>,

    explain_plan: Option<ExplainPlan>,
    plan_info: Option<PlanInfo>,
}

impl InstrumentationHelper {
    /// Creates a helper for one statement execution.
    pub fn new(services: InstrumentationServices) -> Self {
        Self {
            services,
            state: InstrumentationState::Idle,
            mode: OutputMode::Unmodified,
            explain_flags: ExplainFlags::default(),
            fingerprint: StatementFingerprint::default(),
            implicit_txn: false,
            collect_bundle: false,
            discard_rows: false,
            save_plan_for_stats: false,
            request_id: RequestId::default(),
            on_complete: None,
            with_statement_trace: None,
            span: None,
            explain_plan: None,
            plan_info: None,
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> InstrumentationState {
        self.state
    }

    /// Returns the output mode.
    pub fn output_mode(&self) -> OutputMode {
        self.mode
    }

    /// Returns the fingerprint given to [`setup`](Self::setup).
    pub fn fingerprint(&self) -> &StatementFingerprint {
        &self.fingerprint
    }

    /// Chooses how the statement's result is produced. `flags` shape the
    /// EXPLAIN ANALYZE (PLAN) output.
    ///
    /// Must be called before [`setup`](Self::setup).
    pub fn set_output_mode(&mut self, mode: OutputMode, flags: ExplainFlags) -> Result<()> {
        if matches!(self.state, InstrumentationState::Armed | InstrumentationState::Finished) {
            return Err(Error::assertion(format!(
                "output mode set to {mode} after setup (state {:?})",
                self.state
            )));
        }
        self.mode = mode;
        self.explain_flags = flags;
        self.state = InstrumentationState::ModeSelected;
        Ok(())
    }

    /// Decides what to collect for this execution and, if anything, starts a
    /// full-recording span.
    ///
    /// When the outcome has `need_finish == false` no span exists and
    /// [`finish`](Self::finish) may be skipped.
    pub async fn setup(
        &mut self,
        fingerprint: impl Into<StatementFingerprint>,
        implicit_txn: bool,
    ) -> Result<SetupOutcome> {
        if matches!(self.state, InstrumentationState::Armed | InstrumentationState::Finished) {
            return Err(Error::assertion(format!("setup called twice (state {:?})", self.state)));
        }
        self.fingerprint = fingerprint.into();
        self.implicit_txn = implicit_txn;

        let behavior = self.mode.behavior();
        self.collect_bundle = behavior.collect_bundle;
        self.discard_rows |= behavior.discard_rows;
        if behavior.consult_registry {
            let decision =
                self.services.registry.should_collect_diagnostics(&self.fingerprint).await;
            self.collect_bundle = decision.collect;
            self.request_id = decision.request_id;
            self.on_complete = decision.on_complete;
        }

        self.with_statement_trace = self.services.knobs.with_statement_trace.clone();
        self.save_plan_for_stats = self
            .services
            .stats
            .should_save_logical_plan_description(&self.fingerprint, implicit_txn);

        if !self.collect_bundle
            && self.with_statement_trace.is_none()
            && self.mode == OutputMode::Unmodified
        {
            self.state = InstrumentationState::Finished;
            return Ok(SetupOutcome { need_finish: false, span: None });
        }

        let span = self.services.tracer.start_recording_span(&self.services.config.span_operation);
        let handle = span.handle();
        tracing::debug!(
            fingerprint = %self.fingerprint,
            mode = %self.mode,
            collect_bundle = self.collect_bundle,
            request_id = %self.request_id,
            "tracing statement"
        );
        self.span = Some(span);
        self.state = InstrumentationState::Armed;
        Ok(SetupOutcome { need_finish: true, span: Some(handle) })
    }

    /// Discards the statement's rows (`EXECUTE .. DISCARD ROWS`).
    pub fn set_discard_rows(&mut self) {
        self.discard_rows = true;
    }

    /// Returns `true` if the statement's own rows must not reach the client.
    pub fn should_discard_rows(&self) -> bool {
        self.discard_rows
    }

    /// Returns `true` if a diagnostics bundle is being collected.
    pub fn should_collect_bundle(&self) -> bool {
        self.collect_bundle
    }

    /// Returns `true` if the planner should build an explain plan and hand it
    /// to [`record_explain_plan`](Self::record_explain_plan).
    pub fn should_build_explain_plan(&self) -> bool {
        self.collect_bundle || self.save_plan_for_stats || self.mode == OutputMode::ExplainAnalyzePlan
    }

    /// Records the explain plan. A later call replaces it.
    pub fn record_explain_plan(&mut self, plan: ExplainPlan) {
        self.explain_plan = Some(plan);
    }

    /// Records physical planning facts. A later call replaces them.
    pub fn record_plan_info(&mut self, info: PlanInfo) {
        self.plan_info = Some(info);
    }

    fn builder(&self, flags: ExplainFlags) -> OutputBuilder {
        OutputBuilder::new(flags).with_max_depth(self.services.config.max_plan_depth)
    }

    /// Returns the recorded plan with every literal redacted, for statement
    /// statistics.
    ///
    /// Returns `None` if no plan was recorded or it could not be rendered.
    pub fn plan_for_stats(&self) -> Option<ExplainTreeNode> {
        let plan = self.explain_plan.as_ref()?;
        let mut builder = self.builder(ExplainFlags::redacted());
        if let Err(err) = builder.emit(plan, self.plan_info.as_ref()) {
            self.services.telemetry.increment_plan_render_failures();
            if let Some(err) = route_failure(err, "explain plan tree") {
                tracing::warn!(error = %err, "statement-scoped failure rendering plan for statistics");
            }
            return None;
        }
        builder.build_tree()
    }

    /// Renders the recorded plan with every value and type, for bundles.
    fn plan_string_for_bundle(&self) -> String {
        let Some(plan) = &self.explain_plan else {
            return String::new();
        };
        let mut builder = self.builder(ExplainFlags::bundle());
        match builder.emit(plan, self.plan_info.as_ref()) {
            Ok(()) => builder.build_string(),
            Err(err) => {
                self.services.telemetry.increment_plan_render_failures();
                let text = format!("error emitting plan: {}", err.message());
                if let Some(err) = route_failure(err, "bundle plan") {
                    tracing::warn!(error = %err, "statement-scoped failure rendering plan for bundle");
                }
                text
            },
        }
    }

    /// Stops the span and acts on what it recorded.
    ///
    /// In order: a requested bundle is built and persisted, a registered
    /// trace consumer is called, an EXPLAIN ANALYZE result replaces the
    /// statement's rows, and network statistics are folded into the
    /// statement's cumulative record.
    ///
    /// Returns `ret_err` unchanged, unless it was `Ok` and a
    /// statement-scoped failure (a broken client write) occurred; every other
    /// instrumentation failure is logged and skipped. Does nothing unless
    /// [`setup`](Self::setup) armed a span.
    pub async fn finish<E>(
        &mut self,
        summary: ExecutionSummary<'_>,
        res: &mut dyn CommandResult,
        ret_err: std::result::Result<(), E>,
    ) -> std::result::Result<(), E>
    where
        E: From<Error>,
    {
        if self.state != InstrumentationState::Armed {
            return ret_err;
        }
        self.state = InstrumentationState::Finished;
        let Some(span) = self.span.take() else {
            return ret_err;
        };
        let trace = span.finish();
        let mut ret_err = ret_err;

        let bundle = if self.collect_bundle {
            Some(self.build_bundle(&summary, &trace).await)
        } else {
            None
        };

        if let Some(consumer) = &self.with_statement_trace {
            consumer(&trace, summary.raw_sql);
        }

        let writer = if ret_err.is_ok() { self.mode.behavior().writer } else { None };
        if let Some(writer) = writer {
            let deterministic;
            let phase_times = if self.services.knobs.deterministic_explain_analyze {
                deterministic = PhaseTimes::deterministic();
                &deterministic
            } else {
                summary.phase_times
            };
            let inputs = ResultInputs {
                plan: self.explain_plan.as_ref(),
                plan_info: self.plan_info.as_ref(),
                explain_flags: self.explain_flags,
                phase_times,
                bundle: bundle.as_ref(),
                admin_url: &self.services.config.admin_url,
                max_plan_depth: self.services.config.max_plan_depth,
            };
            match writer(&inputs, res) {
                Ok(()) => self.services.telemetry.increment_explain_analyze_outputs(),
                Err(err) => {
                    if let Some(err) = route_failure(err, "instrumentation result") {
                        tracing::debug!(error = %err, "unable to write instrumentation result");
                        ret_err = Err(err.into());
                    }
                },
            }
        }

        if let Err(err) = self.fold_statement_stats(&summary, &trace)
            && ret_err.is_ok()
        {
            ret_err = Err(err.into());
        }
        ret_err
    }

    async fn build_bundle(
        &mut self,
        summary: &ExecutionSummary<'_>,
        trace: &Recording,
    ) -> BundleOutcome {
        let bundle = DiagnosticsBundle::builder()
            .fingerprint(self.fingerprint.clone())
            .statement(summary.statement)
            .plan(self.plan_string_for_bundle())
            .trace(trace.clone())
            .placeholders(summary.placeholders.to_vec())
            .build();

        let outcome = match self
            .services
            .bundle_store
            .insert(&self.fingerprint, summary.statement, self.request_id, bundle)
            .await
        {
            Ok(id) => {
                tracing::info!(
                    fingerprint = %self.fingerprint,
                    request_id = %self.request_id,
                    bundle_id = %id,
                    "collected statement diagnostics bundle"
                );
                self.services.telemetry.increment_diagnostics_collected();
                BundleOutcome::Stored(id)
            },
            Err(err) => {
                tracing::warn!(
                    fingerprint = %self.fingerprint,
                    request_id = %self.request_id,
                    error = %err,
                    "unable to persist statement diagnostics bundle"
                );
                self.services.telemetry.increment_bundle_failures();
                BundleOutcome::Failed(err.message().to_string())
            },
        };

        if let Some(done) = self.on_complete.take() {
            done();
        }
        outcome
    }

    /// Folds this execution into the statement's cumulative statistics.
    ///
    /// A sub-flow that cannot be analyzed is skipped. Only a statement-scoped
    /// failure is returned, after the fold-in completed.
    fn fold_statement_stats(&self, summary: &ExecutionSummary<'_>, trace: &Recording) -> Result<()> {
        let telemetry = &self.services.telemetry;
        let mut network_bytes_sent = 0u64;
        let mut fatal = None;
        for metadata in summary.flows {
            let mut analyzer = TraceAnalyzer::new(metadata.clone());
            let total = analyzer
                .add_trace(trace)
                .and_then(|()| analyzer.get_total_network_bytes_sent())
                .and_then(|bytes| {
                    network_bytes_sent.checked_add(bytes).ok_or_else(|| {
                        Error::trace_analysis("network bytes sent overflows a 64-bit counter")
                    })
                });
            match total {
                Ok(total) => {
                    network_bytes_sent = total;
                    telemetry.increment_flows_analyzed();
                },
                Err(err) => {
                    telemetry.increment_flows_skipped();
                    if let Some(err) = route_failure(err, summary.statement) {
                        fatal.get_or_insert(err);
                    }
                },
            }
        }

        // Rendered before taking the entry lock.
        let plan_sample = if self.save_plan_for_stats { self.plan_for_stats() } else { None };

        let key = StatementKey::new(self.fingerprint.clone(), self.implicit_txn);
        let entry = self.services.stats.get_or_create(&key);
        let mut stats = entry.lock();
        stats.count += 1;
        stats.record_network_bytes(network_bytes_sent);
        if let Some(plan) = plan_sample {
            stats.record_plan(plan);
        }
        fatal.map_or(Ok(()), Err)
    }
}

/// Logs and drops a statistic-scoped failure; hands a statement-scoped one
/// back to the caller.
fn route_failure(err: Error, context: &str) -> Option<Error> {
    match err.scope() {
        FailureScope::Statistic if err.kind() == ErrorKind::Render => {
            tracing::warn!(context, error = %err, "unable to emit explain plan");
            None
        },
        FailureScope::Statistic => {
            tracing::debug!(context, kind = err.kind().as_str(), error = %err, "skipping statistic");
            None
        },
        FailureScope::Statement => Some(err),
    }
}

impl fmt::Debug for InstrumentationHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationHelper")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("fingerprint", &self.fingerprint)
            .field("collect_bundle", &self.collect_bundle)
            .field("discard_rows", &self.discard_rows)
            .field("save_plan_for_stats", &self.save_plan_for_stats)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}
