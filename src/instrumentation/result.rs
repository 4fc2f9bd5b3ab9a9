//! The statement result write protocol.

use std::fmt;

use crate::error::{Error, Result};

/// The statement type reported to the client after instrumentation
/// replaced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementTag {
    /// `EXPLAIN ANALYZE (DEBUG)`.
    ExplainAnalyzeDebug,
    /// `EXPLAIN ANALYZE (PLAN)`.
    ExplainAnalyzePlan,
}

impl fmt::Display for StatementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementTag::ExplainAnalyzeDebug => write!(f, "EXPLAIN ANALYZE (DEBUG)"),
            StatementTag::ExplainAnalyzePlan => write!(f, "EXPLAIN ANALYZE (PLAN)"),
        }
    }
}

/// A result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultColumn {
    /// Column name.
    pub name: &'static str,
    /// SQL type name.
    pub type_name: &'static str,
}

/// The single text column of every explain-style result.
pub const EXPLAIN_PLAN_COLUMNS: &[ResultColumn] = &[ResultColumn { name: "info", type_name: "STRING" }];

/// Final row of every EXPLAIN ANALYZE (PLAN) result.
pub const EXPERIMENTAL_WARNING: &str = "WARNING: this statement is experimental!";

/// The client-facing result of one statement.
///
/// Instrumentation replaces a result by resetting its statement type,
/// setting its columns once, then appending rows in order. A failing
/// [`add_row`](CommandResult::add_row) means the client connection is
/// broken; no further rows are attempted.
pub trait CommandResult: Send {
    /// Changes the statement type reported to the client.
    fn reset_stmt_type(&mut self, tag: StatementTag);

    /// Sets the result columns.
    fn set_columns(&mut self, columns: &[ResultColumn]);

    /// Returns the error already recorded on this result, if any.
    fn err(&self) -> Option<&Error>;

    /// Appends a row.
    fn add_row(&mut self, row: Vec<String>) -> Result<()>;
}

/// Resets `res` to an explain-style result and appends `rows`, one text
/// column each.
///
/// Rows are not written if the result already carries an error.
pub(crate) fn write_text_rows(
    res: &mut dyn CommandResult,
    tag: StatementTag,
    rows: impl IntoIterator<Item = String>,
) -> Result<()> {
    res.reset_stmt_type(tag);
    res.set_columns(EXPLAIN_PLAN_COLUMNS);
    if res.err().is_some() {
        return Ok(());
    }
    for row in rows {
        res.add_row(vec![row])?;
    }
    Ok(())
}
