//! Lifecycle timestamps of one statement execution.

use std::{fmt::Write as _, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named point in a statement's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// The statement arrived at the gateway.
    QueryReceived,
    /// Parsing started.
    StartParse,
    /// Parsing ended.
    EndParse,
    /// Logical planning started.
    StartLogicalPlan,
    /// Logical planning ended.
    EndLogicalPlan,
    /// Execution started.
    StartExecStmt,
    /// Execution ended.
    EndExecStmt,
}

impl SessionPhase {
    /// Every phase, in lifecycle order.
    pub const ALL: [SessionPhase; 7] = [
        SessionPhase::QueryReceived,
        SessionPhase::StartParse,
        SessionPhase::EndParse,
        SessionPhase::StartLogicalPlan,
        SessionPhase::EndLogicalPlan,
        SessionPhase::StartExecStmt,
        SessionPhase::EndExecStmt,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Microsecond offset of this phase in the deterministic table.
    fn deterministic_offset_micros(self) -> i64 {
        match self {
            SessionPhase::QueryReceived | SessionPhase::StartParse => 0,
            SessionPhase::EndParse | SessionPhase::StartLogicalPlan => 1,
            SessionPhase::EndLogicalPlan | SessionPhase::StartExecStmt => 11,
            SessionPhase::EndExecStmt => 111,
        }
    }
}

/// Timestamps recorded for each [`SessionPhase`].
///
/// The first timestamp recorded for a phase is final. Recording it again, or
/// out of lifecycle order with an already recorded phase, is a lifecycle
/// violation.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use stmtdiag::stats::{PhaseTimes, SessionPhase};
///
/// let times = PhaseTimes::deterministic();
/// assert_eq!(times.planning_latency(), Duration::from_micros(11));
/// assert_eq!(times.run_latency(), Duration::from_micros(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimes {
    times: [Option<DateTime<Utc>>; 7],
}

impl PhaseTimes {
    /// Creates an empty set of timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fixed table used for reproducible output.
    pub fn deterministic() -> Self {
        let mut times = Self::new();
        for phase in SessionPhase::ALL {
            times.times[phase.index()] = Some(
                DateTime::<Utc>::UNIX_EPOCH
                    + TimeDelta::microseconds(phase.deterministic_offset_micros()),
            );
        }
        times
    }

    /// Records when `phase` happened.
    pub fn record(&mut self, phase: SessionPhase, time: DateTime<Utc>) -> Result<()> {
        if let Some(existing) = self.times[phase.index()] {
            return Err(Error::assertion(format!(
                "phase {phase:?} already recorded at {existing}"
            )));
        }
        let earlier = SessionPhase::ALL[..phase.index()]
            .iter()
            .filter_map(|p| self.times[p.index()].map(|t| (*p, t)))
            .find(|(_, t)| *t > time);
        if let Some((prior, prior_time)) = earlier {
            return Err(Error::assertion(format!(
                "phase {phase:?} at {time} precedes {prior:?} at {prior_time}"
            )));
        }
        let later = SessionPhase::ALL[phase.index() + 1..]
            .iter()
            .filter_map(|p| self.times[p.index()].map(|t| (*p, t)))
            .find(|(_, t)| *t < time);
        if let Some((next, next_time)) = later {
            return Err(Error::assertion(format!(
                "phase {phase:?} at {time} follows {next:?} at {next_time}"
            )));
        }
        self.times[phase.index()] = Some(time);
        Ok(())
    }

    /// Records `phase` as happening now.
    pub fn record_now(&mut self, phase: SessionPhase) -> Result<()> {
        self.record(phase, Utc::now())
    }

    /// Returns when `phase` happened.
    pub fn get(&self, phase: SessionPhase) -> Option<DateTime<Utc>> {
        self.times[phase.index()]
    }

    fn between(&self, start: SessionPhase, end: SessionPhase) -> Duration {
        match (self.get(start), self.get(end)) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Time from the start of parsing to the end of logical planning.
    pub fn planning_latency(&self) -> Duration {
        self.between(SessionPhase::StartParse, SessionPhase::EndLogicalPlan)
    }

    /// Time spent executing.
    pub fn run_latency(&self) -> Duration {
        self.between(SessionPhase::StartExecStmt, SessionPhase::EndExecStmt)
    }
}

/// Formats a latency rounded to the microsecond, e.g. `11µs`, `1.5ms`,
/// `2m3.5s`.
pub fn format_latency(latency: Duration) -> String {
    let micros = (latency.as_nanos() + 500) / 1_000;
    if micros == 0 {
        return "0s".to_string();
    }
    if micros < 1_000 {
        return format!("{micros}µs");
    }
    if micros < 1_000_000 {
        return format!("{}ms", decimal(micros, 1_000));
    }

    let mut out = String::new();
    let hours = micros / 3_600_000_000;
    let minutes = micros / 60_000_000 % 60;
    let seconds = micros % 60_000_000;
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{}s", decimal(seconds, 1_000_000));
    out
}

fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
