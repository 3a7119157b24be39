use std::sync::Arc;

use tracing::debug;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::report::{ValidationIssue, ValidationRule};
use crate::tree::ValidationTree;
use crate::validators::XmlValidator;

/// Runs a rule tree from the document node
#[derive(Debug, Clone)]
pub struct TreeValidator {
    tree: Arc<ValidationTree>,
}

impl TreeValidator {
    pub fn new(tree: Arc<ValidationTree>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ValidationTree {
        &self.tree
    }
}

impl XmlValidator for TreeValidator {
    fn name(&self) -> &str {
        "rule tree"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        self.tree.rules().into_iter().cloned().collect()
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        let issues = self.tree.validate(&context.tree_context());
        debug!(
            filename = %context.filename,
            tree = %self.tree.name(),
            issues = issues.len(),
            "evaluated rule tree"
        );
        Ok(issues)
    }
}
