//! Reconstructing per-component statistics from a finished trace.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::component::{COMPONENT_STATS_TAG, ComponentId, ComponentKind, ComponentStats};
use crate::{
    error::{Error, Result},
    tracing_support::Recording,
    types::NodeId,
};

/// The flows making up one distributed sub-plan, one per participating node.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::stats::FlowsMetadata;
/// use stmtdiag::NodeId;
/// use uuid::Uuid;
///
/// let flow = Uuid::new_v4();
/// let metadata = FlowsMetadata::new().with_flow(NodeId(1), flow).with_flow(NodeId(2), flow);
/// assert_eq!(metadata.nodes().count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowsMetadata {
    flows: BTreeMap<NodeId, Uuid>,
}

impl FlowsMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the flow running on `node`.
    #[must_use]
    pub fn with_flow(mut self, node: NodeId, flow_id: Uuid) -> Self {
        self.flows.insert(node, flow_id);
        self
    }

    /// Returns the participating nodes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.flows.keys().copied()
    }

    /// Returns the flow running on `node`.
    pub fn flow_for(&self, node: NodeId) -> Option<Uuid> {
        self.flows.get(&node).copied()
    }

    /// Returns `true` if `component` belongs to one of these flows.
    pub fn contains(&self, component: &ComponentId) -> bool {
        self.flows.values().any(|flow| *flow == component.flow_id)
    }

    /// Returns `true` if no flows are registered.
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Plan-wide summary derived from every component of one sub-plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLevelStats {
    /// Bytes sent between nodes.
    pub network_bytes_sent: u64,
    /// Peak memory of the hungriest node.
    pub max_mem_usage: u64,
    /// Bytes read from the KV layer.
    pub kv_bytes_read: u64,
    /// Rows read from the KV layer.
    pub kv_rows_read: u64,
    /// Time spent waiting on the KV layer.
    pub kv_time: Duration,
}

/// Aggregates the component statistics found in traces of one sub-plan.
///
/// Analysis only runs after every sub-flow has joined, so the analyzer needs
/// no internal synchronization.
#[derive(Debug, Clone)]
pub struct TraceAnalyzer {
    metadata: FlowsMetadata,
    processor_stats: BTreeMap<ComponentId, ComponentStats>,
    stream_stats: BTreeMap<ComponentId, ComponentStats>,
    flow_stats: BTreeMap<ComponentId, ComponentStats>,
}

impl TraceAnalyzer {
    /// Creates an analyzer for the flows in `metadata`.
    pub fn new(metadata: FlowsMetadata) -> Self {
        Self {
            metadata,
            processor_stats: BTreeMap::new(),
            stream_stats: BTreeMap::new(),
            flow_stats: BTreeMap::new(),
        }
    }

    /// Returns the flows this analyzer accepts.
    pub fn metadata(&self) -> &FlowsMetadata {
        &self.metadata
    }

    /// Scans `recording` for component statistics and merges them in.
    ///
    /// Either every entry is applied or, if any payload fails to decode,
    /// none is. Entries for components outside this analyzer's flows are
    /// ignored.
    pub fn add_trace(&mut self, recording: &Recording) -> Result<()> {
        let decoded = recording
            .structured(COMPONENT_STATS_TAG)
            .map(|(span, record)| {
                ComponentStats::from_structured(record).map_err(|err| {
                    Error::trace_analysis(format!(
                        "unable to decode stats in span {} ({})",
                        span.span_id, span.operation
                    ))
                    .with_source(err)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for stats in decoded {
            self.add_component_stats(stats);
        }
        Ok(())
    }

    /// Merges one component's statistics in.
    pub fn add_component_stats(&mut self, stats: ComponentStats) {
        if !self.metadata.contains(&stats.component) {
            tracing::trace!(component = %stats.component, "ignoring stats of unknown flow");
            return;
        }
        let map = match stats.component.kind {
            ComponentKind::Processor => &mut self.processor_stats,
            ComponentKind::Stream => &mut self.stream_stats,
            ComponentKind::Flow => &mut self.flow_stats,
        };
        map.entry(stats.component).and_modify(|existing| existing.union(&stats)).or_insert(stats);
    }

    /// Returns the merged statistics of one component.
    pub fn component_stats(&self, id: &ComponentId) -> Option<&ComponentStats> {
        match id.kind {
            ComponentKind::Processor => self.processor_stats.get(id),
            ComponentKind::Stream => self.stream_stats.get(id),
            ComponentKind::Flow => self.flow_stats.get(id),
        }
    }

    fn all_stats(&self) -> impl Iterator<Item = &ComponentStats> {
        self.processor_stats
            .values()
            .chain(self.stream_stats.values())
            .chain(self.flow_stats.values())
    }

    /// Returns bytes sent over the network, grouped by sending node.
    ///
    /// Every node of the metadata is present; a node whose components sent
    /// nothing reports zero.
    pub fn get_network_bytes_sent(&self) -> Result<BTreeMap<NodeId, u64>> {
        let mut by_node: BTreeMap<NodeId, u64> = self.metadata.nodes().map(|n| (n, 0)).collect();
        for stats in self.all_stats() {
            let bytes = stats.network_bytes_sent()?;
            let total = by_node.entry(stats.component.node_id).or_default();
            *total = checked_sum(*total, bytes, "network bytes sent")?;
        }
        Ok(by_node)
    }

    /// Returns bytes sent over the network by every node together.
    pub fn get_total_network_bytes_sent(&self) -> Result<u64> {
        self.get_network_bytes_sent()?
            .values()
            .try_fold(0, |total, bytes| checked_sum(total, *bytes, "network bytes sent"))
    }

    /// Returns the plan-wide summary.
    pub fn get_query_level_stats(&self) -> Result<QueryLevelStats> {
        let network_bytes_sent = self.get_total_network_bytes_sent()?;

        let mut mem_by_node: BTreeMap<NodeId, u64> = BTreeMap::new();
        for stats in self.processor_stats.values() {
            let mem = mem_by_node.entry(stats.component.node_id).or_default();
            *mem = checked_sum(*mem, stats.exec.max_allocated_mem, "memory usage")?;
        }
        // A flow-level peak supersedes the sum of its processors.
        for stats in self.flow_stats.values() {
            if stats.exec.max_allocated_mem != 0 {
                mem_by_node.insert(stats.component.node_id, stats.exec.max_allocated_mem);
            }
        }

        let mut summary = QueryLevelStats {
            network_bytes_sent,
            max_mem_usage: mem_by_node.values().copied().max().unwrap_or(0),
            ..QueryLevelStats::default()
        };
        for stats in self.processor_stats.values() {
            summary.kv_bytes_read =
                checked_sum(summary.kv_bytes_read, stats.kv.bytes_read, "KV bytes read")?;
            summary.kv_rows_read =
                checked_sum(summary.kv_rows_read, stats.kv.tuples_read, "KV rows read")?;
            summary.kv_time = summary
                .kv_time
                .checked_add(stats.kv.kv_time)
                .ok_or_else(|| Error::trace_analysis("KV time overflows"))?;
        }
        Ok(summary)
    }
}

fn checked_sum(total: u64, value: u64, what: &str) -> Result<u64> {
    total
        .checked_add(value)
        .ok_or_else(|| Error::trace_analysis(format!("{what} overflows a 64-bit counter")))
}
