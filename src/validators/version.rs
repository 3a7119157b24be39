use std::collections::HashSet;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const MISSING_VERSION_ON_ID_RULE_CODE: &str = "NETEX_ID_8";
pub const MISSING_VERSION_ON_REF_RULE_CODE: &str = "NETEX_ID_9";

/// Every declared id must carry a version
pub struct VersionOnLocalIdsValidator {
    rule: ValidationRule,
}

impl Default for VersionOnLocalIdsValidator {
    fn default() -> Self {
        Self {
            rule: ValidationRule::new(
                MISSING_VERSION_ON_ID_RULE_CODE,
                "Missing version on id",
                "Missing version attribute on element {} with id {}",
                Severity::Error,
            ),
        }
    }
}

impl XmlValidator for VersionOnLocalIdsValidator {
    fn name(&self) -> &str {
        "version on local ids"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        Ok(context
            .local_ids
            .iter()
            .filter(|id| id.version.is_none())
            .map(|id| {
                ValidationIssue::new(&self.rule, id.location())
                    .with_arguments([&id.element_name, &id.id])
            })
            .collect())
    }
}

/// References to an entity of the same file should name its version
pub struct VersionOnRefToLocalIdsValidator {
    rule: ValidationRule,
}

impl Default for VersionOnRefToLocalIdsValidator {
    fn default() -> Self {
        Self {
            rule: ValidationRule::new(
                MISSING_VERSION_ON_REF_RULE_CODE,
                "Missing version on reference to local id",
                "Missing version attribute on reference {} to local id {}",
                Severity::Warning,
            ),
        }
    }
}

impl XmlValidator for VersionOnRefToLocalIdsValidator {
    fn name(&self) -> &str {
        "version on references to local ids"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        let local_ids: HashSet<&str> = context.local_ids.iter().map(|id| id.id.as_str()).collect();
        Ok(context
            .local_refs
            .iter()
            .filter(|reference| reference.version.is_none())
            .filter(|reference| local_ids.contains(reference.id.as_str()))
            .map(|reference| {
                ValidationIssue::new(&self.rule, reference.location())
                    .with_arguments([&reference.element_name, &reference.id])
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::IdExtractor;
    use crate::xml::Document;

    const CONTENT: &str = r#"<PublicationDelivery>
  <ServiceFrame id="X:ServiceFrame:1">
    <routePoints>
      <RoutePoint id="X:RoutePoint:1" version="1"/>
      <RoutePoint id="X:RoutePoint:2"/>
    </routePoints>
    <routes>
      <Route id="X:Route:1" version="1">
        <RoutePointRef ref="X:RoutePoint:1"/>
        <RoutePointRef ref="X:RoutePoint:2" version="1"/>
        <LineRef ref="X:Line:1"/>
      </Route>
    </routes>
  </ServiceFrame>
</PublicationDelivery>"#;

    fn context() -> XmlValidationContext {
        let document = Document::parse(CONTENT.as_bytes()).unwrap();
        let extractor = IdExtractor::default();
        let ids = extractor.local_ids(&document, "line.xml");
        let refs = extractor.local_references(&document, "line.xml");
        XmlValidationContext::new("X", "r", "line.xml", document, false).with_ids(ids, refs)
    }

    #[test]
    fn test_missing_version_on_local_id() {
        let issues = VersionOnLocalIdsValidator::default()
            .validate(&context())
            .unwrap();
        // Frames are not entities
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].arguments, vec!["RoutePoint", "X:RoutePoint:2"]);
        assert_eq!(issues[0].location.line, Some(5));
    }

    #[test]
    fn test_missing_version_on_reference_to_local_id() {
        let issues = VersionOnRefToLocalIdsValidator::default()
            .validate(&context())
            .unwrap();
        // X:Line:1 is not declared in this file
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.object_id.as_deref(), Some("X:RoutePoint:1"));
        assert_eq!(issues[0].rule.severity, Severity::Warning);
    }
}
