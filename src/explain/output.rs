//! Rendering an [`ExplainPlan`] as text, rows, or a structured tree.

use serde::{Deserialize, Serialize};

use super::plan::{ExplainPlan, FieldValue, PlanInfo, PlanNode};
use crate::error::{Error, Result};

/// Default limit on plan nesting accepted by [`OutputBuilder`].
pub const DEFAULT_MAX_PLAN_DEPTH: usize = 256;

const REDACTED: &str = "_";

/// Controls what an [`OutputBuilder`] shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExplainFlags {
    /// Show verbose-only attributes.
    pub verbose: bool,
    /// Annotate literals with their type (verbose output only).
    pub show_types: bool,
    /// Replace every literal with `_`.
    pub hide_values: bool,
}

impl ExplainFlags {
    /// Flags for plans persisted with statement statistics: literals never
    /// leave the process.
    pub fn redacted() -> Self {
        Self { hide_values: true, ..Self::default() }
    }

    /// Flags for diagnostics bundles: every value and type.
    pub fn bundle() -> Self {
        Self { verbose: true, show_types: true, hide_values: false }
    }
}

/// A rendered attribute of an [`ExplainTreeNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainAttr {
    /// Attribute name.
    pub key: String,
    /// Rendered value.
    pub value: String,
}

/// A rendered plan node, stored with statement statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainTreeNode {
    /// Operator name.
    pub name: String,
    /// Rendered attributes.
    pub attrs: Vec<ExplainAttr>,
    /// Rendered inputs.
    pub children: Vec<ExplainTreeNode>,
}

/// Accumulates top-level fields and one plan, then renders them.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::explain::{ExplainFlags, ExplainPlan, OutputBuilder, PlanNode};
///
/// let plan = ExplainPlan::new(PlanNode::new("scan").with_literal("limit", "10", "INT8"));
///
/// let mut builder = OutputBuilder::new(ExplainFlags::redacted());
/// builder.add_field("planning time", "11µs");
/// builder.emit(&plan, None)?;
///
/// assert_eq!(builder.build_string_rows(), vec![
///     "planning time: 11µs".to_string(),
///     String::new(),
///     "• scan".to_string(),
///     "  limit: _".to_string(),
/// ]);
/// # Ok::<(), stmtdiag::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OutputBuilder {
    flags: ExplainFlags,
    max_depth: usize,
    fields: Vec<ExplainAttr>,
    tree: Option<ExplainTreeNode>,
}

impl OutputBuilder {
    /// Creates a builder with the given flags.
    pub fn new(flags: ExplainFlags) -> Self {
        Self { flags, max_depth: DEFAULT_MAX_PLAN_DEPTH, fields: Vec::new(), tree: None }
    }

    /// Sets the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Adds a top-level field shown above the plan.
    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push(ExplainAttr { key: key.into(), value: value.into() });
    }

    /// Renders `plan` with this builder's flags.
    ///
    /// Fails if a node has no name or the plan nests deeper than the limit;
    /// the builder is left unchanged on failure.
    pub fn emit(&mut self, plan: &ExplainPlan, info: Option<&PlanInfo>) -> Result<()> {
        let tree = self.render_node(&plan.root, 1)?;
        if let Some(info) = info {
            self.add_field("distribution", info.distribution.to_string());
            self.add_field("vectorized", info.vectorized.to_string());
        }
        self.tree = Some(tree);
        Ok(())
    }

    fn render_node(&self, node: &PlanNode, depth: usize) -> Result<ExplainTreeNode> {
        if depth > self.max_depth {
            return Err(Error::render(format!("plan deeper than {} levels", self.max_depth)));
        }
        if node.name.is_empty() {
            return Err(Error::render(format!("unnamed plan node at depth {depth}")));
        }

        let attrs = node
            .fields
            .iter()
            .filter(|field| self.flags.verbose || !field.verbose_only)
            .map(|field| ExplainAttr { key: field.key.clone(), value: self.render_value(&field.value) })
            .collect();
        let children = node
            .children
            .iter()
            .map(|child| self.render_node(child, depth + 1))
            .collect::<Result<_>>()?;

        Ok(ExplainTreeNode { name: node.name.clone(), attrs, children })
    }

    fn render_value(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Literal { .. } if self.flags.hide_values => REDACTED.to_string(),
            FieldValue::Literal { value, type_name } if self.flags.verbose && self.flags.show_types => {
                format!("{value}:::{type_name}")
            },
            FieldValue::Literal { value, .. } => value.clone(),
        }
    }

    /// Returns the rendered plan tree, if a plan was emitted.
    pub fn build_tree(&self) -> Option<ExplainTreeNode> {
        self.tree.clone()
    }

    /// Returns the output as display lines: top-level fields, a blank line,
    /// then the plan drawn as a tree.
    pub fn build_string_rows(&self) -> Vec<String> {
        let mut rows: Vec<String> =
            self.fields.iter().map(|field| format!("{}: {}", field.key, field.value)).collect();
        if let Some(tree) = &self.tree {
            if !rows.is_empty() {
                rows.push(String::new());
            }
            draw(tree, "", "", &mut rows);
        }
        rows
    }

    /// Returns the output as a single string.
    pub fn build_string(&self) -> String {
        let mut out = self.build_string_rows().join("\n");
        out.push('\n');
        out
    }
}

fn draw(node: &ExplainTreeNode, head: &str, indent: &str, rows: &mut Vec<String>) {
    rows.push(format!("{head}• {}", node.name));

    let bar = if node.children.is_empty() { " " } else { "│" };
    for attr in &node.attrs {
        rows.push(format!("{indent}{bar} {}: {}", attr.key, attr.value));
    }

    let last = node.children.len().saturating_sub(1);
    for (i, child) in node.children.iter().enumerate() {
        rows.push(format!("{indent}│"));
        let (connector, continuation) = if i == last { ("└── ", "    ") } else { ("├── ", "│   ") };
        draw(child, &format!("{indent}{connector}"), &format!("{indent}{continuation}"), rows);
    }
}
