//! Explain plans and their renderings.
//!
//! One recorded [`ExplainPlan`] is rendered three ways:
//!
//! | Use                     | Flags                      | Output                      |
//! |-------------------------|----------------------------|-----------------------------|
//! | Statement statistics    | [`ExplainFlags::redacted`] | [`ExplainTreeNode`]         |
//! | Diagnostics bundle      | [`ExplainFlags::bundle`]   | single string               |
//! | EXPLAIN ANALYZE (PLAN)  | default                    | display rows                |

mod output;
mod plan;

pub use output::{DEFAULT_MAX_PLAN_DEPTH, ExplainAttr, ExplainFlags, ExplainTreeNode, OutputBuilder};
pub use plan::{ExplainPlan, FieldValue, PlanDistribution, PlanField, PlanInfo, PlanNode};
