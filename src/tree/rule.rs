//! Rules that can be attached to a validation tree.

use std::fmt;
use std::sync::Arc;

use crate::context::TreeContext;
use crate::error::QueryError;
use crate::report::{ValidationIssue, ValidationRule};
use crate::xml::{Node, NodePath};

/// A check evaluated against the node a tree context is scoped to
pub trait TreeRule: Send + Sync {
    fn rule(&self) -> &ValidationRule;

    fn validate(&self, context: &TreeContext<'_>) -> Vec<ValidationIssue>;

    fn code(&self) -> &str {
        &self.rule().code
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRuleKind {
    /// Every node matched by the query is a violation
    NotExist,
    /// The context node is a violation when the query matches nothing
    MustExist,
}

/// Rule backed by a compiled query
#[derive(Debug, Clone)]
pub struct PathRule {
    rule: ValidationRule,
    query: NodePath,
    kind: PathRuleKind,
}

impl PathRule {
    pub fn new(rule: ValidationRule, query: &str, kind: PathRuleKind) -> Result<Self, QueryError> {
        Ok(Self {
            rule,
            query: NodePath::parse(query)?,
            kind,
        })
    }

    pub fn not_exist(rule: ValidationRule, query: &str) -> Result<Self, QueryError> {
        Self::new(rule, query, PathRuleKind::NotExist)
    }

    pub fn must_exist(rule: ValidationRule, query: &str) -> Result<Self, QueryError> {
        Self::new(rule, query, PathRuleKind::MustExist)
    }

    pub fn query(&self) -> &NodePath {
        &self.query
    }

    pub fn kind(&self) -> PathRuleKind {
        self.kind
    }

    fn issue_at(&self, context: &TreeContext<'_>, node: Node<'_>) -> ValidationIssue {
        let location = context.file.location_of(node);
        let subject = location
            .object_id
            .clone()
            .unwrap_or_else(|| node.local_name().to_string());
        ValidationIssue::new(&self.rule, location).with_arguments([subject])
    }
}

impl TreeRule for PathRule {
    fn rule(&self) -> &ValidationRule {
        &self.rule
    }

    fn validate(&self, context: &TreeContext<'_>) -> Vec<ValidationIssue> {
        match self.kind {
            PathRuleKind::NotExist => self
                .query
                .select(context.node)
                .into_iter()
                .map(|node| self.issue_at(context, node))
                .collect(),
            PathRuleKind::MustExist => {
                if self.query.matches_any(context.node) {
                    Vec::new()
                } else {
                    vec![self.issue_at(context, context.node)]
                }
            }
        }
    }
}

type RuleFn = dyn Fn(&ValidationRule, &TreeContext<'_>) -> Vec<ValidationIssue> + Send + Sync;

/// Rule implemented by a closure, for checks a query cannot express
#[derive(Clone)]
pub struct FnRule {
    rule: ValidationRule,
    check: Arc<RuleFn>,
}

impl FnRule {
    pub fn new<F>(rule: ValidationRule, check: F) -> Self
    where
        F: Fn(&ValidationRule, &TreeContext<'_>) -> Vec<ValidationIssue> + Send + Sync + 'static,
    {
        Self {
            rule,
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("rule", &self.rule).finish()
    }
}

impl TreeRule for FnRule {
    fn rule(&self) -> &ValidationRule {
        &self.rule
    }

    fn validate(&self, context: &TreeContext<'_>) -> Vec<ValidationIssue> {
        (self.check)(&self.rule, context)
    }
}
