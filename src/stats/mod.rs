//! Execution statistics: what components report, how it is merged, and
//! where it accumulates.
//!
//! - [`ComponentStats`]: one component's record, merged with
//!   [`ComponentStats::union`]
//! - [`TraceAnalyzer`]: rebuilds per-component statistics from a
//!   [`Recording`](crate::tracing_support::Recording) and derives plan-wide
//!   summaries
//! - [`PhaseTimes`]: lifecycle timestamps and the latencies derived from them
//! - [`StatementStatsStore`]: cumulative per-fingerprint statistics shared by
//!   every execution in the process

mod analyzer;
mod component;
mod phase;
mod store;

pub use analyzer::{FlowsMetadata, QueryLevelStats, TraceAnalyzer};
pub use component::{
    COMPONENT_STATS_TAG, ComponentId, ComponentKind, ComponentStats, ExecStats, KvStats,
    NetworkRxStats, NetworkTxStats, OutputStats,
};
pub use phase::{PhaseTimes, SessionPhase, format_latency};
pub use store::{NumericStat, StatementStats, StatementStatsStore, StatsStoreConfig};
