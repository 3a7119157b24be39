use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::context::TreeContext;
use crate::error::{IntegrationError, IntegrationResult};
use crate::tree::{ExecutionPredicate, TreeRule, ValidationTree};
use crate::xml::NodePath;

const SELF_SELECTOR: &str = ".";

/// Mutable description of a [`ValidationTree`].
///
/// Rules are keyed by code and subtrees by name. Registering an existing key
/// replaces the previous entry; nothing is merged.
pub struct ValidationTreeBuilder {
    name: String,
    selector: String,
    predicate: ExecutionPredicate,
    rules: IndexMap<String, Arc<dyn TreeRule>>,
    common_file_rules: IndexMap<String, Arc<dyn TreeRule>>,
    line_file_rules: IndexMap<String, Arc<dyn TreeRule>>,
    subtrees: IndexMap<String, ValidationTreeBuilder>,
}

impl ValidationTreeBuilder {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            predicate: always(),
            rules: IndexMap::new(),
            common_file_rules: IndexMap::new(),
            line_file_rules: IndexMap::new(),
            subtrees: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Only enter this subtree for nodes where `predicate` holds
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TreeContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Rule run for every file
    pub fn add_rule(&mut self, rule: impl TreeRule + 'static) -> &mut Self {
        self.insert(Bucket::Always, Arc::new(rule), true)
    }

    pub fn add_common_file_rule(&mut self, rule: impl TreeRule + 'static) -> &mut Self {
        self.insert(Bucket::CommonFile, Arc::new(rule), true)
    }

    pub fn add_line_file_rule(&mut self, rule: impl TreeRule + 'static) -> &mut Self {
        self.insert(Bucket::LineFile, Arc::new(rule), true)
    }

    /// Swap in a new definition for an existing code, keeping its bucket.
    /// Unknown codes are added to the always bucket.
    pub fn replace_rule(&mut self, rule: impl TreeRule + 'static) -> &mut Self {
        let bucket = if self.line_file_rules.contains_key(rule.code()) {
            Bucket::LineFile
        } else if self.common_file_rules.contains_key(rule.code()) {
            Bucket::CommonFile
        } else {
            Bucket::Always
        };
        self.insert(bucket, Arc::new(rule), false)
    }

    fn insert(&mut self, bucket: Bucket, rule: Arc<dyn TreeRule>, loud: bool) -> &mut Self {
        let code = rule.code().to_string();
        let replaced = self.remove_local_rule(&code);
        if replaced && loud {
            warn!(
                tree = %self.name,
                code = %code,
                "rule registered twice, replacing the earlier definition"
            );
        }
        let target = match bucket {
            Bucket::Always => &mut self.rules,
            Bucket::CommonFile => &mut self.common_file_rules,
            Bucket::LineFile => &mut self.line_file_rules,
        };
        target.insert(code, rule);
        self
    }

    fn remove_local_rule(&mut self, code: &str) -> bool {
        let always = self.rules.shift_remove(code).is_some();
        let common = self.common_file_rules.shift_remove(code).is_some();
        let line = self.line_file_rules.shift_remove(code).is_some();
        always || common || line
    }

    /// Remove a rule from this builder and every registered subtree
    pub fn remove_rule(&mut self, code: &str) -> bool {
        let mut removed = self.remove_local_rule(code);
        for subtree in self.subtrees.values_mut() {
            removed |= subtree.remove_rule(code);
        }
        removed
    }

    pub fn add_subtree(&mut self, subtree: ValidationTreeBuilder) -> &mut Self {
        let name = subtree.name.clone();
        if self.subtrees.insert(name.clone(), subtree).is_some() {
            warn!(
                tree = %self.name,
                subtree = %name,
                "subtree registered twice, replacing the earlier definition"
            );
        }
        self
    }

    pub fn remove_subtree(&mut self, name: &str) -> Option<ValidationTreeBuilder> {
        self.subtrees.shift_remove(name)
    }

    pub fn subtree_mut(&mut self, name: &str) -> Option<&mut ValidationTreeBuilder> {
        self.subtrees.get_mut(name)
    }

    /// Subtree evaluated at `selector`, registered under the selector as its
    /// name when there is none yet
    pub fn subtree_with_selector(&mut self, selector: &str) -> &mut ValidationTreeBuilder {
        let index = match self
            .subtrees
            .values()
            .position(|subtree| subtree.selector == selector)
        {
            Some(index) => index,
            None => {
                self.subtrees
                    .insert_full(selector.to_string(), Self::new(selector, selector))
                    .0
            }
        };
        &mut self.subtrees[index]
    }

    /// Compile selectors and freeze the tree
    pub fn build(&self) -> IntegrationResult<ValidationTree> {
        let selector = NodePath::parse(&self.selector).map_err(|e| IntegrationError::TreeBuild {
            tree: self.name.clone(),
            details: e.to_string(),
        })?;

        let mut children = Vec::new();
        for (suffix, rules, predicate) in [
            ("always", &self.rules, always()),
            ("common file", &self.common_file_rules, common_file()),
            ("line file", &self.line_file_rules, line_file()),
        ] {
            if !rules.is_empty() {
                children.push(ValidationTree {
                    name: format!("{} ({})", self.name, suffix),
                    selector: NodePath::current(),
                    predicate,
                    rules: rules.values().cloned().collect(),
                    children: Vec::new(),
                });
            }
        }

        for subtree in self.subtrees.values() {
            children.push(subtree.build()?);
        }

        Ok(ValidationTree {
            name: self.name.clone(),
            selector,
            predicate: Arc::clone(&self.predicate),
            rules: Vec::new(),
            children,
        })
    }
}

impl Default for ValidationTreeBuilder {
    fn default() -> Self {
        Self::new("root", SELF_SELECTOR)
    }
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Always,
    CommonFile,
    LineFile,
}

fn always() -> ExecutionPredicate {
    Arc::new(any_file)
}

fn common_file() -> ExecutionPredicate {
    Arc::new(is_common_file)
}

fn line_file() -> ExecutionPredicate {
    Arc::new(is_line_file)
}

fn any_file(_: &TreeContext<'_>) -> bool {
    true
}

fn is_common_file(context: &TreeContext<'_>) -> bool {
    context.is_common_file()
}

fn is_line_file(context: &TreeContext<'_>) -> bool {
    !context.is_common_file()
}
