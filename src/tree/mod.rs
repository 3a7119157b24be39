//! Rule-tree engine.
//!
//! A [`ValidationTreeBuilder`] collects rules in three buckets (every file,
//! common files only, line files only) and named subtrees. [`ValidationTree`]
//! is the frozen result: evaluating it runs the attached rules against the
//! current node, then re-enters every subtree once per node its selector
//! matches.

pub mod builder;
pub mod rule;
pub mod validation_tree;

use std::sync::Arc;

use crate::context::TreeContext;

pub use builder::ValidationTreeBuilder;
pub use rule::{FnRule, PathRule, PathRuleKind, TreeRule};
pub use validation_tree::ValidationTree;

/// Decides whether a subtree runs for a matched node
pub type ExecutionPredicate = Arc<dyn Fn(&TreeContext<'_>) -> bool + Send + Sync>;
