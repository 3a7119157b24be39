use std::collections::HashSet;
use std::sync::Arc;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::extract::DEFAULT_IGNORED_ELEMENTS;
use crate::repository::NetexIdRepository;
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const DUPLICATE_ID_RULE_CODE: &str = "NETEX_ID_1";

/// Entities that are legitimately repeated in several files of a dataset
const REPEATABLE_ELEMENTS: &[&str] = &[
    "Block",
    "RoutePoint",
    "PointProjection",
    "ScheduledStopPoint",
    "PassengerStopAssignment",
    "NoticeAssignment",
];

/// Reports ids already declared by another file of the dataset
pub struct NetexIdUniquenessValidator {
    repository: Arc<dyn NetexIdRepository>,
    ignored_elements: HashSet<String>,
    rule: ValidationRule,
}

impl NetexIdUniquenessValidator {
    pub fn new(repository: Arc<dyn NetexIdRepository>) -> Self {
        Self {
            repository,
            ignored_elements: DEFAULT_IGNORED_ELEMENTS
                .iter()
                .chain(REPEATABLE_ELEMENTS)
                .map(|name| name.to_string())
                .collect(),
            rule: ValidationRule::new(
                DUPLICATE_ID_RULE_CODE,
                "Duplicate NeTEx id",
                "Duplicate element identifier {} across files",
                Severity::Error,
            ),
        }
    }
}

impl XmlValidator for NetexIdUniquenessValidator {
    fn name(&self) -> &str {
        "id uniqueness"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        let candidates: Vec<_> = context
            .local_ids
            .iter()
            .filter(|id| !self.ignored_elements.contains(&id.element_name))
            .collect();
        let ids: HashSet<String> = candidates.iter().map(|id| id.id.clone()).collect();

        let duplicates = self.repository.duplicate_netex_ids(
            &context.report_id,
            &context.filename,
            &ids,
        );
        if duplicates.is_empty() {
            return Ok(Vec::new());
        }

        let mut reported = HashSet::new();
        Ok(candidates
            .into_iter()
            .filter(|id| duplicates.contains(&id.id) && reported.insert(id.id.clone()))
            .map(|id| ValidationIssue::new(&self.rule, id.location()).with_arguments([&id.id]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::IdExtractor;
    use crate::repository::InMemoryNetexIdRepository;
    use crate::xml::Document;

    fn context(filename: &str, content: &str) -> XmlValidationContext {
        let document = Document::parse(content.as_bytes()).unwrap();
        let extractor = IdExtractor::default();
        let ids = extractor.local_ids(&document, filename);
        XmlValidationContext::new("X", "r", filename, document, false).with_ids(ids, Vec::new())
    }

    #[test]
    fn test_duplicate_reported_for_second_file_only() {
        let validator = NetexIdUniquenessValidator::new(Arc::new(InMemoryNetexIdRepository::new()));
        let a = context("a.xml", r#"<lines><Line id="X:Y:1" version="1"/></lines>"#);
        let b = context("b.xml", r#"<lines><Line id="X:Y:1" version="1"/></lines>"#);

        assert!(validator.validate(&a).unwrap().is_empty());
        let issues = validator.validate(&b).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.filename, "b.xml");
        assert_eq!(issues[0].location.object_id.as_deref(), Some("X:Y:1"));
        assert_eq!(issues[0].rule.code, DUPLICATE_ID_RULE_CODE);
    }

    #[test]
    fn test_repeatable_elements_are_ignored() {
        let validator = NetexIdUniquenessValidator::new(Arc::new(InMemoryNetexIdRepository::new()));
        let content = r#"<points><ScheduledStopPoint id="X:ScheduledStopPoint:1" version="1"/></points>"#;

        assert!(validator.validate(&context("a.xml", content)).unwrap().is_empty());
        assert!(validator.validate(&context("b.xml", content)).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_reported_once_per_id() {
        let validator = NetexIdUniquenessValidator::new(Arc::new(InMemoryNetexIdRepository::new()));
        validator
            .validate(&context("a.xml", r#"<lines><Line id="X:Line:1"/></lines>"#))
            .unwrap();
        let issues = validator
            .validate(&context(
                "b.xml",
                r#"<lines><Line id="X:Line:1" version="1"/><Line id="X:Line:1" version="2"/></lines>"#,
            ))
            .unwrap();
        assert_eq!(issues.len(), 1);
    }
}
