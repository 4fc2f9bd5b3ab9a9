//! Prelude module for convenient imports.
//!
//! ```rust
//! use stmtdiag::prelude::*;
//! ```
//!
//! This provides access to:
//! - The instrumentation controller and its collaborators
//! - Error types
//! - Explain plan and statistics types

pub use crate::{
    bundle::{BundleStore, DiagnosticsBundle},
    config::{InstrumentationConfig, TestingKnobs},
    diagnostics::{DiagnosticsDecision, DiagnosticsRegistry},
    error::{Error, ErrorKind, FailureScope, Result},
    explain::{ExplainFlags, ExplainPlan, PlanDistribution, PlanInfo, PlanNode},
    instrumentation::{
        CommandResult, ExecutionSummary, InstrumentationHelper, InstrumentationServices,
        OutputMode, SetupOutcome,
    },
    stats::{ComponentId, ComponentStats, FlowsMetadata, PhaseTimes, SessionPhase, StatementStatsStore},
    tracing_support::{Recording, SpanHandle, Telemetry, Tracer},
    types::{NodeId, StatementFingerprint, StatementKey},
};
