use std::fmt;
use std::sync::Arc;

use crate::context::TreeContext;
use crate::report::{ValidationIssue, ValidationRule};
use crate::tree::{ExecutionPredicate, TreeRule};
use crate::xml::NodePath;

/// Immutable rule tree, shared read-only across validations.
///
/// Each subtree is entered once per node its selector matches, and only when
/// its execution predicate holds for that node.
pub struct ValidationTree {
    pub(crate) name: String,
    pub(crate) selector: NodePath,
    pub(crate) predicate: ExecutionPredicate,
    pub(crate) rules: Vec<Arc<dyn TreeRule>>,
    pub(crate) children: Vec<ValidationTree>,
}

impl ValidationTree {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &NodePath {
        &self.selector
    }

    pub fn children(&self) -> &[ValidationTree] {
        &self.children
    }

    /// Issues of every rule, in pre-order
    pub fn validate(&self, context: &TreeContext<'_>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.collect(context, None, &mut issues);
        issues
    }

    /// Issues of the rule with the given code only
    pub fn validate_rule(&self, context: &TreeContext<'_>, code: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.collect(context, Some(code), &mut issues);
        issues
    }

    fn collect(
        &self,
        context: &TreeContext<'_>,
        code: Option<&str>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for rule in &self.rules {
            if code.is_none_or(|code| rule.code() == code) {
                issues.extend(rule.validate(context));
            }
        }

        for child in &self.children {
            for node in child.selector.select(context.node) {
                let scoped = context.at(node);
                if (child.predicate)(&scoped) {
                    child.collect(&scoped, code, issues);
                }
            }
        }
    }

    /// Every rule in the tree, in pre-order
    pub fn rules(&self) -> Vec<&ValidationRule> {
        let mut rules: Vec<&ValidationRule> = self.rules.iter().map(|rule| rule.rule()).collect();
        for child in &self.children {
            rules.extend(child.rules());
        }
        rules
    }

    /// Remove a rule from this tree and every subtree; true if any was removed
    pub fn remove_rule(&mut self, code: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.code() != code);
        let mut removed = self.rules.len() != before;
        for child in &mut self.children {
            removed |= child.remove_rule(code);
        }
        removed
    }
}

impl fmt::Debug for ValidationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.rules.iter().map(|rule| rule.code()).collect();
        f.debug_struct("ValidationTree")
            .field("name", &self.name)
            .field("selector", &self.selector.as_str())
            .field("rules", &codes)
            .field("children", &self.children)
            .finish()
    }
}
