//! Per-component execution statistics.
//!
//! Every numeric field follows one rule: zero means "not measured", never
//! "measured as zero". Merging two records for the same component therefore
//! fills holes instead of overwriting.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    tracing_support::{SpanHandle, StructuredRecord},
    types::NodeId,
};

/// Structured-record tag under which components ship their statistics.
pub const COMPONENT_STATS_TAG: &str = "component_stats";

const DETERMINISTIC_DURATION: Duration = Duration::from_micros(1);
const DETERMINISTIC_MEMORY: u64 = 10 << 10;
const DETERMINISTIC_BYTES_PER_TUPLE: u64 = 8;

/// What kind of execution component produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// An operator.
    Processor,
    /// A stream between operators, possibly crossing nodes.
    Stream,
    /// A whole flow on one node.
    Flow,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Processor => write!(f, "processor"),
            ComponentKind::Stream => write!(f, "stream"),
            ComponentKind::Flow => write!(f, "flow"),
        }
    }
}

/// Identifies one component of a distributed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId {
    /// The flow the component belongs to.
    pub flow_id: Uuid,
    /// The component kind.
    pub kind: ComponentKind,
    /// Processor or stream ID, unique within the flow (zero for flows).
    pub id: u32,
    /// The node the component ran on.
    pub node_id: NodeId,
}

impl ComponentId {
    /// Identifies a processor.
    pub fn processor(flow_id: Uuid, id: u32, node_id: NodeId) -> Self {
        Self { flow_id, kind: ComponentKind::Processor, id, node_id }
    }

    /// Identifies a stream.
    pub fn stream(flow_id: Uuid, id: u32, node_id: NodeId) -> Self {
        Self { flow_id, kind: ComponentKind::Stream, id, node_id }
    }

    /// Identifies a flow.
    pub fn flow(flow_id: Uuid, node_id: NodeId) -> Self {
        Self { flow_id, kind: ComponentKind::Flow, id: 0, node_id }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {} (flow {})", self.kind, self.id, self.node_id, self.flow_id)
    }
}

fn fill<T: Default + PartialEq + Copy>(dst: &mut T, src: T) {
    if *dst == T::default() {
        *dst = src;
    }
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Statistics of the receiving side of a network stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRxStats {
    /// Round-trip latency to the sending node. Describes one edge, never summed.
    #[serde(skip_serializing_if = "is_default")]
    pub latency: Duration,
    /// Time spent waiting for data.
    #[serde(skip_serializing_if = "is_default")]
    pub wait_time: Duration,
    /// Time spent deserializing received data.
    #[serde(skip_serializing_if = "is_default")]
    pub deserialization_time: Duration,
    /// Tuples received.
    #[serde(skip_serializing_if = "is_default")]
    pub tuples_received: u64,
    /// Bytes received.
    #[serde(skip_serializing_if = "is_default")]
    pub bytes_received: u64,
}

/// Statistics of the sending side of a network stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkTxStats {
    /// Tuples sent.
    #[serde(skip_serializing_if = "is_default")]
    pub tuples_sent: u64,
    /// Bytes sent.
    #[serde(skip_serializing_if = "is_default")]
    pub bytes_sent: u64,
}

/// Statistics of reads from the key-value layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KvStats {
    /// Bytes read.
    #[serde(skip_serializing_if = "is_default")]
    pub bytes_read: u64,
    /// Tuples read.
    #[serde(skip_serializing_if = "is_default")]
    pub tuples_read: u64,
    /// Time spent waiting on KV requests.
    #[serde(skip_serializing_if = "is_default")]
    pub kv_time: Duration,
}

/// Statistics of the component's own execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecStats {
    /// Time spent executing.
    #[serde(skip_serializing_if = "is_default")]
    pub exec_time: Duration,
    /// Peak memory allocated, in bytes.
    #[serde(skip_serializing_if = "is_default")]
    pub max_allocated_mem: u64,
    /// Peak disk allocated, in bytes.
    #[serde(skip_serializing_if = "is_default")]
    pub max_allocated_disk: u64,
}

/// Statistics of what the component emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputStats {
    /// Batches emitted.
    #[serde(skip_serializing_if = "is_default")]
    pub num_batches: u64,
    /// Tuples emitted.
    #[serde(skip_serializing_if = "is_default")]
    pub num_tuples: u64,
}

/// The statistics record of one execution component.
///
/// On the wire this is a tagged record keyed by [`ComponentId`] with up to
/// five optional sub-records; a missing sub-record or field decodes as zero.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::stats::{ComponentId, ComponentStats};
/// use stmtdiag::NodeId;
/// use uuid::Uuid;
///
/// let id = ComponentId::stream(Uuid::new_v4(), 1, NodeId(2));
/// let mut sender = ComponentStats::new(id);
/// sender.net_tx.bytes_sent = 1024;
///
/// let mut other = ComponentStats::new(id);
/// other.net_tx.tuples_sent = 16;
///
/// sender.union(&other);
/// assert_eq!(sender.net_tx.bytes_sent, 1024);
/// assert_eq!(sender.net_tx.tuples_sent, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStats {
    /// The component these statistics describe.
    pub component: ComponentId,
    /// Network receive statistics.
    #[serde(default, skip_serializing_if = "is_default")]
    pub net_rx: NetworkRxStats,
    /// Network transmit statistics.
    #[serde(default, skip_serializing_if = "is_default")]
    pub net_tx: NetworkTxStats,
    /// KV read statistics.
    #[serde(default, skip_serializing_if = "is_default")]
    pub kv: KvStats,
    /// Execution statistics.
    #[serde(default, skip_serializing_if = "is_default")]
    pub exec: ExecStats,
    /// Output statistics.
    #[serde(default, skip_serializing_if = "is_default")]
    pub output: OutputStats,
}

impl ComponentStats {
    /// Creates an empty record for `component`.
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            net_rx: NetworkRxStats::default(),
            net_tx: NetworkTxStats::default(),
            kv: KvStats::default(),
            exec: ExecStats::default(),
            output: OutputStats::default(),
        }
    }

    /// Returns `true` if nothing was measured.
    pub fn is_empty(&self) -> bool {
        is_default(&self.net_rx)
            && is_default(&self.net_tx)
            && is_default(&self.kv)
            && is_default(&self.exec)
            && is_default(&self.output)
    }

    /// Merges another record for the same component into this one.
    ///
    /// A field already measured here is kept; a field not measured here takes
    /// the other record's value. The component ID is not changed.
    pub fn union(&mut self, other: &ComponentStats) {
        fill(&mut self.net_rx.latency, other.net_rx.latency);
        fill(&mut self.net_rx.wait_time, other.net_rx.wait_time);
        fill(&mut self.net_rx.deserialization_time, other.net_rx.deserialization_time);
        fill(&mut self.net_rx.tuples_received, other.net_rx.tuples_received);
        fill(&mut self.net_rx.bytes_received, other.net_rx.bytes_received);

        fill(&mut self.net_tx.tuples_sent, other.net_tx.tuples_sent);
        fill(&mut self.net_tx.bytes_sent, other.net_tx.bytes_sent);

        fill(&mut self.kv.bytes_read, other.kv.bytes_read);
        fill(&mut self.kv.tuples_read, other.kv.tuples_read);
        fill(&mut self.kv.kv_time, other.kv.kv_time);

        fill(&mut self.exec.exec_time, other.exec.exec_time);
        fill(&mut self.exec.max_allocated_mem, other.exec.max_allocated_mem);
        fill(&mut self.exec.max_allocated_disk, other.exec.max_allocated_disk);

        fill(&mut self.output.num_batches, other.output.num_batches);
        fill(&mut self.output.num_tuples, other.output.num_tuples);
    }

    /// Returns the bytes this component put on the network.
    ///
    /// Only one side of a stream reports byte counts; a record claiming both
    /// received and sent bytes is inconsistent.
    pub fn network_bytes_sent(&self) -> Result<u64> {
        if self.net_rx.bytes_received != 0 && self.net_tx.bytes_sent != 0 {
            return Err(Error::malformed_stats(format!(
                "{}: both bytes received and bytes sent are set",
                self.component
            )));
        }
        Ok(self.net_tx.bytes_sent)
    }

    /// Replaces every measured value that varies between runs with a fixed
    /// one, keeping "measured" and "not measured" apart.
    pub fn make_deterministic(&mut self) {
        fn time(value: &mut Duration) {
            if !value.is_zero() {
                *value = DETERMINISTIC_DURATION;
            }
        }
        fn memory(value: &mut u64) {
            if *value != 0 {
                *value = DETERMINISTIC_MEMORY;
            }
        }

        time(&mut self.net_rx.latency);
        time(&mut self.net_rx.wait_time);
        time(&mut self.net_rx.deserialization_time);
        if self.net_rx.bytes_received != 0 {
            self.net_rx.bytes_received =
                DETERMINISTIC_BYTES_PER_TUPLE * self.net_rx.tuples_received;
        }
        if self.net_tx.bytes_sent != 0 {
            self.net_tx.bytes_sent = DETERMINISTIC_BYTES_PER_TUPLE * self.net_tx.tuples_sent;
        }
        time(&mut self.kv.kv_time);
        time(&mut self.exec.exec_time);
        memory(&mut self.exec.max_allocated_mem);
        memory(&mut self.exec.max_allocated_disk);
    }

    /// Encodes this record for a span.
    pub fn to_structured(&self) -> Result<StructuredRecord> {
        StructuredRecord::encode(COMPONENT_STATS_TAG, self)
    }

    /// Decodes a record shipped in a span.
    pub fn from_structured(record: &StructuredRecord) -> Result<Self> {
        if record.type_tag != COMPONENT_STATS_TAG {
            return Err(Error::malformed_stats(format!(
                "unexpected structured record type {:?}",
                record.type_tag
            )));
        }
        Ok(serde_json::from_value(record.payload.clone())?)
    }

    /// Ships this record through `span`.
    pub fn record_into(&self, span: &SpanHandle) -> Result<()> {
        span.record_structured(self.to_structured()?);
        Ok(())
    }
}
