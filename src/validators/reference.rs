//! Resolution of references against local ids, shared ids and pluggable
//! external validators.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::id::IdVersion;
use crate::repository::NetexIdRepository;
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const UNRESOLVED_REFERENCE_RULE_CODE: &str = "NETEX_ID_5";

/// Vouches for references that are known to exist outside the dataset.
///
/// Returns the subset of `references` it accepts; the input is never changed.
pub trait ExternalReferenceValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, references: &IndexSet<IdVersion>) -> IndexSet<IdVersion>;
}

pub struct NetexReferenceValidator {
    repository: Arc<dyn NetexIdRepository>,
    external_validators: Vec<Arc<dyn ExternalReferenceValidator>>,
    rule: ValidationRule,
}

impl NetexReferenceValidator {
    pub fn new(
        repository: Arc<dyn NetexIdRepository>,
        external_validators: Vec<Arc<dyn ExternalReferenceValidator>>,
    ) -> Self {
        Self {
            repository,
            external_validators,
            rule: ValidationRule::new(
                UNRESOLVED_REFERENCE_RULE_CODE,
                "Unresolved reference",
                "Unresolved reference to external reference data {}",
                Severity::Error,
            ),
        }
    }

    /// References that nothing can vouch for
    fn unresolved(&self, context: &XmlValidationContext) -> IndexSet<IdVersion> {
        // First occurrence wins for equal (id, version)
        let mut remaining: IndexSet<IdVersion> = context.local_refs.iter().cloned().collect();
        if remaining.is_empty() {
            return remaining;
        }

        let local_ids: HashSet<&IdVersion> = context.local_ids.iter().collect();
        remaining.retain(|reference| !local_ids.contains(reference));
        if remaining.is_empty() {
            return remaining;
        }

        let shared_ids = self.repository.shared_netex_ids(&context.report_id);
        remaining.retain(|reference| !shared_ids.contains(&reference.id));

        for external in &self.external_validators {
            if remaining.is_empty() {
                break;
            }
            let vouched = external.validate(&remaining);
            if !vouched.is_empty() {
                debug!(
                    filename = %context.filename,
                    validator = external.name(),
                    resolved = vouched.len(),
                    "external references accepted"
                );
                remaining.retain(|reference| !vouched.contains(reference));
            }
        }
        remaining
    }
}

impl XmlValidator for NetexReferenceValidator {
    fn name(&self) -> &str {
        "reference resolution"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        let issues = self
            .unresolved(context)
            .iter()
            .map(|reference| {
                ValidationIssue::new(&self.rule, reference.location())
                    .with_arguments([reference.to_string()])
            })
            .collect();

        // Published after resolution: a common file never resolves its own references
        if context.is_common_file() {
            let ids: HashSet<String> = context.local_ids.iter().map(|id| id.id.clone()).collect();
            self.repository.add_shared_netex_ids(&context.report_id, &ids);
        }

        Ok(issues)
    }
}
