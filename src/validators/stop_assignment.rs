use std::collections::HashSet;
use std::sync::Arc;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::id::DataLocation;
use crate::repository::CommonDataRepository;
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const UNASSIGNED_STOP_POINT_RULE_CODE: &str = "PASSENGER_STOP_ASSIGNMENT_3";

/// Every stop point served by a journey pattern of a line file must be
/// assigned to a quay or a flexible stop place, in the same file or in a
/// common file of the dataset.
pub struct StopAssignmentValidator {
    repository: Arc<dyn CommonDataRepository>,
    rule: ValidationRule,
}

impl StopAssignmentValidator {
    pub fn new(repository: Arc<dyn CommonDataRepository>) -> Self {
        Self {
            repository,
            rule: ValidationRule::new(
                UNASSIGNED_STOP_POINT_RULE_CODE,
                "Missing stop assignment",
                "Scheduled stop point {} is not assigned to a quay or a flexible stop place",
                Severity::Error,
            ),
        }
    }

    fn is_assigned(&self, context: &XmlValidationContext, stop_point: &str) -> IntegrationResult<bool> {
        if context.index.is_stop_point_assigned(stop_point) {
            return Ok(true);
        }
        let report_id = context.report_id.as_str();
        Ok(self
            .repository
            .quay_id_for_scheduled_stop_point(stop_point, report_id)?
            .is_some()
            || self
                .repository
                .flexible_stop_place_id_for_scheduled_stop_point(stop_point, report_id)?
                .is_some())
    }
}

impl XmlValidator for StopAssignmentValidator {
    fn name(&self) -> &str {
        "stop assignments"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        if context.is_common_file() {
            return Ok(Vec::new());
        }

        let mut checked = HashSet::new();
        let mut issues = Vec::new();
        for (pattern_id, pattern) in &context.index.journey_patterns {
            for stop_point in &pattern.stop_points {
                if !checked.insert(stop_point.as_str()) || self.is_assigned(context, stop_point)? {
                    continue;
                }
                let location = DataLocation::new(
                    Some(pattern_id.clone()),
                    &context.filename,
                    pattern.position.line,
                    pattern.position.column,
                );
                issues.push(ValidationIssue::new(&self.rule, location).with_arguments([stop_point]));
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntegrationError;
    use crate::model::NetexEntitiesIndex;
    use crate::repository::InMemoryCommonDataRepository;
    use crate::xml::Document;

    const LINE: &str = r#"<PublicationDelivery>
  <journeyPatterns>
    <JourneyPattern id="X:JourneyPattern:1" version="1">
      <pointsInSequence>
        <StopPointInJourneyPattern id="X:StopPointInJourneyPattern:1" order="1">
          <ScheduledStopPointRef ref="X:ScheduledStopPoint:1"/>
        </StopPointInJourneyPattern>
        <StopPointInJourneyPattern id="X:StopPointInJourneyPattern:2" order="2">
          <ScheduledStopPointRef ref="X:ScheduledStopPoint:2"/>
        </StopPointInJourneyPattern>
        <StopPointInJourneyPattern id="X:StopPointInJourneyPattern:3" order="3">
          <ScheduledStopPointRef ref="X:ScheduledStopPoint:3"/>
        </StopPointInJourneyPattern>
      </pointsInSequence>
    </JourneyPattern>
  </journeyPatterns>
  <stopAssignments>
    <PassengerStopAssignment id="X:PassengerStopAssignment:3" version="1" order="1">
      <ScheduledStopPointRef ref="X:ScheduledStopPoint:3"/>
      <QuayRef ref="NSR:Quay:3"/>
    </PassengerStopAssignment>
  </stopAssignments>
</PublicationDelivery>"#;

    fn line_context() -> XmlValidationContext {
        let document = Document::parse(LINE.as_bytes()).unwrap();
        XmlValidationContext::new("X", "r", "line.xml", document, false)
    }

    #[test]
    fn test_assignments_from_common_data_and_local_file() {
        let repository = Arc::new(InMemoryCommonDataRepository::new());
        let mut common = NetexEntitiesIndex::default();
        common
            .passenger_stop_assignments
            .insert("X:ScheduledStopPoint:1".to_string(), "NSR:Quay:1".to_string());
        common.flexible_stop_assignments.insert(
            "X:ScheduledStopPoint:2".to_string(),
            "NSR:FlexibleStopPlace:2".to_string(),
        );
        repository.collect("r", &common);

        let validator = StopAssignmentValidator::new(repository);
        assert!(validator.validate(&line_context()).unwrap().is_empty());
    }

    #[test]
    fn test_unassigned_stop_point() {
        let repository = Arc::new(InMemoryCommonDataRepository::new());
        repository.register("r");

        let validator = StopAssignmentValidator::new(repository);
        let issues = validator.validate(&line_context()).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].arguments, vec!["X:ScheduledStopPoint:1"]);
        assert_eq!(
            issues[0].location.object_id.as_deref(),
            Some("X:JourneyPattern:1")
        );
        assert_eq!(issues[0].location.line, Some(3));
    }

    #[test]
    fn test_common_data_not_collected() {
        let validator = StopAssignmentValidator::new(Arc::new(InMemoryCommonDataRepository::new()));
        assert!(matches!(
            validator.validate(&line_context()),
            Err(IntegrationError::CommonDataNotCollected { .. })
        ));
    }
}
