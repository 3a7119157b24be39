//! Structural check of reference targets.
//!
//! A reference element `XxxRef` (or `DefaultXxxRef`) is expected to point at
//! an id of the form `codespace:Xxx:localId`.

use std::collections::{HashMap, HashSet};

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::id::NetexId;
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const INVALID_TYPE_RULE_CODE: &str = "NETEX_ID_6";
pub const INVALID_STRUCTURE_RULE_CODE: &str = "NETEX_ID_7";

const DEFAULT_PREFIX: &str = "Default";
const REFERENCE_SUFFIX: &str = "Ref";

/// Reference elements that may point at another entity type than their name says
const ALLOWED_SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("LineRef", &["FlexibleLine"]),
    ("JourneyPatternRef", &["ServiceJourneyPattern"]),
    ("FromPointRef", &["ScheduledStopPoint"]),
    ("ToPointRef", &["ScheduledStopPoint"]),
    ("ProjectedPointRef", &["ScheduledStopPoint", "RoutePoint"]),
    ("ProjectToPointRef", &["ScheduledStopPoint", "RoutePoint"]),
    (
        "NoticedObjectRef",
        &[
            "Line",
            "FlexibleLine",
            "ServiceJourney",
            "JourneyPattern",
            "ServiceJourneyPattern",
            "StopPointInJourneyPattern",
            "TimetabledPassingTime",
        ],
    ),
    ("FromJourneyRef", &["ServiceJourney"]),
    ("ToJourneyRef", &["ServiceJourney"]),
    ("VehicleJourneyRef", &["ServiceJourney"]),
    ("JourneyRef", &["ServiceJourney", "DatedServiceJourney", "DeadRun"]),
    ("OrganisationRef", &["Operator", "Authority"]),
    ("RepresentedByGroupRef", &["Network", "GroupOfLines"]),
];

pub struct ReferenceToValidEntityTypeValidator {
    substitutions: HashMap<String, HashSet<String>>,
    invalid_type: ValidationRule,
    invalid_structure: ValidationRule,
}

impl Default for ReferenceToValidEntityTypeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceToValidEntityTypeValidator {
    pub fn new() -> Self {
        let substitutions = ALLOWED_SUBSTITUTIONS
            .iter()
            .map(|(element, types)| {
                (
                    element.to_string(),
                    types.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self {
            substitutions,
            invalid_type: ValidationRule::new(
                INVALID_TYPE_RULE_CODE,
                "Invalid reference target type",
                "Reference {} points to {}, which has an invalid entity type",
                Severity::Error,
            ),
            invalid_structure: ValidationRule::new(
                INVALID_STRUCTURE_RULE_CODE,
                "Invalid id structure",
                "Reference {} points to {}, which is not of the form codespace:Type:localId",
                Severity::Error,
            ),
        }
    }

    /// Also accept `entity_type` as a target of `element`
    pub fn allow(mut self, element: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.substitutions
            .entry(element.into())
            .or_default()
            .insert(entity_type.into());
        self
    }

    fn is_allowed(&self, element: &str, entity_type: &str) -> bool {
        expected_type(element) == Some(entity_type)
            || self
                .substitutions
                .get(element)
                .is_some_and(|types| types.contains(entity_type))
    }
}

/// `Xxx` for `XxxRef` and `DefaultXxxRef`
fn expected_type(element: &str) -> Option<&str> {
    let name = element.strip_suffix(REFERENCE_SUFFIX)?;
    Some(name.strip_prefix(DEFAULT_PREFIX).unwrap_or(name))
}

impl XmlValidator for ReferenceToValidEntityTypeValidator {
    fn name(&self) -> &str {
        "reference entity type"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.invalid_type.clone(), self.invalid_structure.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        for reference in &context.local_refs {
            let rule = match NetexId::parse(&reference.id) {
                None => &self.invalid_structure,
                Some(id) if !self.is_allowed(&reference.element_name, id.entity_type) => {
                    &self.invalid_type
                }
                Some(_) => continue,
            };
            issues.push(
                ValidationIssue::new(rule, reference.location())
                    .with_arguments([&reference.element_name, &reference.id]),
            );
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdVersion;
    use crate::xml::Document;

    fn context(refs: &[(&str, &str)]) -> XmlValidationContext {
        let local_refs = refs
            .iter()
            .enumerate()
            .map(|(line, (element, id))| {
                IdVersion::new(*id, None)
                    .with_element(*element, Vec::new())
                    .with_location("line.xml", line as u32 + 1, 1)
            })
            .collect();
        let document = Document::parse(b"<PublicationDelivery/>").unwrap();
        XmlValidationContext::new("X", "r", "line.xml", document, false)
            .with_ids(Vec::new(), local_refs)
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.rule.code.as_str()).collect()
    }

    #[test]
    fn test_matching_types_pass() {
        let validator = ReferenceToValidEntityTypeValidator::new();
        let file = context(&[
            ("QuayRef", "NSR:Quay:1"),
            ("DefaultCodespaceRef", "X:Codespace:x"),
            ("LineRef", "X:FlexibleLine:1"),
            ("FromPointRef", "X:ScheduledStopPoint:1"),
        ]);
        assert!(validator.validate(&file).unwrap().is_empty());
    }

    #[test]
    fn test_type_mismatch_and_invalid_structure() {
        let validator = ReferenceToValidEntityTypeValidator::new();
        let file = context(&[
            ("QuayRef", "NSR:StopPlace:1"),
            ("OperatorRef", "X:Operator"),
            ("LineRef", "X:Line:1:2"),
        ]);
        let issues = validator.validate(&file).unwrap();
        assert_eq!(
            codes(&issues),
            vec![
                INVALID_TYPE_RULE_CODE,
                INVALID_STRUCTURE_RULE_CODE,
                INVALID_STRUCTURE_RULE_CODE
            ]
        );
        assert_eq!(issues[0].arguments, vec!["QuayRef", "NSR:StopPlace:1"]);
    }

    #[test]
    fn test_custom_substitution() {
        let validator = ReferenceToValidEntityTypeValidator::new().allow("QuayRef", "StopPlace");
        let file = context(&[("QuayRef", "NSR:StopPlace:1")]);
        assert!(validator.validate(&file).unwrap().is_empty());
    }

    #[test]
    fn test_expected_type() {
        assert_eq!(expected_type("QuayRef"), Some("Quay"));
        assert_eq!(expected_type("DefaultCodespaceRef"), Some("Codespace"));
        assert_eq!(expected_type("Quay"), None);
    }
}
