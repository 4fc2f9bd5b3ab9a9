//! The explain plan as recorded from the planner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The value of a plan field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Structural text, such as a table or index name. Never redacted.
    Text(String),
    /// A constant taken from the statement.
    Literal {
        /// The rendered constant.
        value: String,
        /// The SQL type name.
        type_name: String,
    },
}

/// One `key: value` attribute of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanField {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: FieldValue,
    /// Only shown in verbose output.
    #[serde(default)]
    pub verbose_only: bool,
}

/// An operator of the explain plan.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::explain::PlanNode;
///
/// let scan = PlanNode::new("scan")
///     .with_field("table", "kv@primary")
///     .with_literal("limit", "10", "INT8");
/// let plan = PlanNode::new("render").with_child(scan);
/// assert_eq!(plan.children.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanNode {
    /// Operator name, e.g. `scan` or `hash join`.
    pub name: String,
    /// Operator attributes, in display order.
    pub fields: Vec<PlanField>,
    /// Input operators.
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Creates a node with no attributes or inputs.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), children: Vec::new() }
    }

    /// Adds a structural attribute.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(PlanField {
            key: key.into(),
            value: FieldValue::Text(value.into()),
            verbose_only: false,
        });
        self
    }

    /// Adds an attribute that is only shown in verbose output.
    #[must_use]
    pub fn with_verbose_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(PlanField {
            key: key.into(),
            value: FieldValue::Text(value.into()),
            verbose_only: true,
        });
        self
    }

    /// Adds an attribute holding a constant from the statement.
    #[must_use]
    pub fn with_literal(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.fields.push(PlanField {
            key: key.into(),
            value: FieldValue::Literal { value: value.into(), type_name: type_name.into() },
            verbose_only: false,
        });
        self
    }

    /// Adds an input operator.
    #[must_use]
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A recorded explain plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainPlan {
    /// The top operator.
    pub root: PlanNode,
}

impl ExplainPlan {
    /// Wraps a plan tree.
    pub fn new(root: PlanNode) -> Self {
        Self { root }
    }
}

impl From<PlanNode> for ExplainPlan {
    fn from(root: PlanNode) -> Self {
        Self::new(root)
    }
}

/// How widely a plan was distributed across the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDistribution {
    /// Ran on the gateway only.
    #[default]
    Local,
    /// Some operators ran remotely.
    PartiallyDistributed,
    /// Every operator that could run remotely did.
    FullyDistributed,
}

impl fmt::Display for PlanDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDistribution::Local => write!(f, "local"),
            PlanDistribution::PartiallyDistributed => write!(f, "partial"),
            PlanDistribution::FullyDistributed => write!(f, "full"),
        }
    }
}

/// Physical planning facts recorded alongside the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanInfo {
    /// How the plan was distributed.
    pub distribution: PlanDistribution,
    /// Whether the vectorized engine ran the plan.
    pub vectorized: bool,
}
