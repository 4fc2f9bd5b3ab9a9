//! A statement result that records the write protocol.

use crate::{
    error::{Error, ErrorKind, Result},
    instrumentation::{CommandResult, ResultColumn, StatementTag},
};

/// One call made on a [`RecordingResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEvent {
    /// `reset_stmt_type`.
    ResetStmtType(StatementTag),
    /// `set_columns`, with the column names.
    SetColumns(Vec<&'static str>),
    /// A successful `add_row`.
    AddRow(Vec<String>),
}

/// A [`CommandResult`] recording every call, with injectable failures.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::instrumentation::CommandResult;
/// use stmtdiag::testing::RecordingResult;
///
/// let mut res = RecordingResult::new().fail_after_rows(1);
/// assert!(res.add_row(vec!["first".into()]).is_ok());
/// assert!(res.add_row(vec!["second".into()]).is_err());
/// assert_eq!(res.rows(), vec!["first"]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingResult {
    events: Vec<ResultEvent>,
    err: Option<Error>,
    fail_after_rows: Option<(usize, ErrorKind)>,
    row_attempts: usize,
}

impl RecordingResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `add_row` fail with a communication error once `rows` rows were
    /// accepted.
    #[must_use]
    pub fn fail_after_rows(self, rows: usize) -> Self {
        self.fail_after_rows_with(rows, ErrorKind::Communication)
    }

    /// Makes `add_row` fail with an error of `kind` once `rows` rows were
    /// accepted.
    #[must_use]
    pub fn fail_after_rows_with(mut self, rows: usize, kind: ErrorKind) -> Self {
        self.fail_after_rows = Some((rows, kind));
        self
    }

    /// Starts the result with an error already recorded.
    #[must_use]
    pub fn with_error(mut self, err: Error) -> Self {
        self.err = Some(err);
        self
    }

    /// Returns every call, in order.
    pub fn events(&self) -> &[ResultEvent] {
        &self.events
    }

    /// Returns `true` if nothing was called.
    pub fn is_untouched(&self) -> bool {
        self.events.is_empty() && self.row_attempts == 0
    }

    /// Returns the accepted rows, columns joined by a tab.
    pub fn rows(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ResultEvent::AddRow(row) => Some(row.join("\t")),
                _ => None,
            })
            .collect()
    }

    /// Returns how many times `add_row` was called, including failures.
    pub fn row_attempts(&self) -> usize {
        self.row_attempts
    }

    /// Returns the last statement type set.
    pub fn stmt_type(&self) -> Option<StatementTag> {
        self.events.iter().rev().find_map(|event| match event {
            ResultEvent::ResetStmtType(tag) => Some(*tag),
            _ => None,
        })
    }
}

impl CommandResult for RecordingResult {
    fn reset_stmt_type(&mut self, tag: StatementTag) {
        self.events.push(ResultEvent::ResetStmtType(tag));
    }

    fn set_columns(&mut self, columns: &[ResultColumn]) {
        self.events.push(ResultEvent::SetColumns(columns.iter().map(|c| c.name).collect()));
    }

    fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    fn add_row(&mut self, row: Vec<String>) -> Result<()> {
        self.row_attempts += 1;
        let accepted = self.rows().len();
        if let Some((limit, kind)) = self.fail_after_rows
            && accepted >= limit
        {
            return Err(match kind {
                ErrorKind::Communication => Error::communication("client connection closed"),
                kind => Error::new(kind, "injected row failure"),
            });
        }
        self.events.push(ResultEvent::AddRow(row));
        Ok(())
    }
}
