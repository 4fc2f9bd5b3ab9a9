//! Statement-level instrumentation.
//!
//! An [`InstrumentationHelper`] follows one statement from before execution
//! to after it, deciding whether to trace it, collecting a diagnostics
//! bundle when asked to, replacing the result for EXPLAIN ANALYZE variants,
//! and folding execution statistics into the shared statement statistics.
//!
//! ```text
//! Idle ──set_output_mode──▶ ModeSelected
//!   │                           │
//!   └──────────setup────────────┤
//!                               ├──(nothing to collect)──▶ Finished
//!                               └──(span started)──▶ Armed ──finish──▶ Finished
//! ```

mod helper;
mod mode;
mod result;
mod services;

pub use helper::{ExecutionSummary, InstrumentationHelper, InstrumentationState, SetupOutcome};
pub use mode::OutputMode;
pub use result::{CommandResult, EXPERIMENTAL_WARNING, EXPLAIN_PLAN_COLUMNS, ResultColumn, StatementTag};
pub use services::InstrumentationServices;
