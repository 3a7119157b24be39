use std::sync::Arc;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::id::DataLocation;
use crate::repository::{CommonDataRepository, FromToScheduledStopPointId};
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::validators::XmlValidator;

pub const INCONSISTENT_SERVICE_LINK_RULE_CODE: &str = "SERVICE_LINK_2";

/// The n-th service link of a journey pattern must connect its n-th and
/// (n+1)-th stop points.
///
/// Links declared neither in the file nor in the common files are skipped;
/// unresolved references are reported elsewhere.
pub struct ServiceLinkValidator {
    repository: Arc<dyn CommonDataRepository>,
    rule: ValidationRule,
}

impl ServiceLinkValidator {
    pub fn new(repository: Arc<dyn CommonDataRepository>) -> Self {
        Self {
            repository,
            rule: ValidationRule::new(
                INCONSISTENT_SERVICE_LINK_RULE_CODE,
                "Service link does not match journey pattern",
                "Service link {} connects {}, expected {}",
                Severity::Error,
            ),
        }
    }

    fn endpoints(
        &self,
        context: &XmlValidationContext,
        service_link: &str,
    ) -> IntegrationResult<Option<FromToScheduledStopPointId>> {
        if let Some(link) = context.index.service_links.get(service_link) {
            return Ok(Some(FromToScheduledStopPointId::new(
                &link.from_point,
                &link.to_point,
            )));
        }
        self.repository
            .from_to_scheduled_stop_point_id_for_service_link(service_link, &context.report_id)
    }
}

impl XmlValidator for ServiceLinkValidator {
    fn name(&self) -> &str {
        "service links"
    }

    fn rules(&self) -> Vec<ValidationRule> {
        vec![self.rule.clone()]
    }

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>> {
        if context.is_common_file() {
            return Ok(Vec::new());
        }

        let mut issues = Vec::new();
        for (pattern_id, pattern) in &context.index.journey_patterns {
            let legs = pattern.stop_points.windows(2);
            for (service_link, leg) in pattern.service_links.iter().zip(legs) {
                let Some(actual) = self.endpoints(context, service_link)? else {
                    continue;
                };
                let expected = FromToScheduledStopPointId::new(&leg[0], &leg[1]);
                if actual == expected {
                    continue;
                }
                let location = DataLocation::new(
                    Some(pattern_id.clone()),
                    &context.filename,
                    pattern.position.line,
                    pattern.position.column,
                );
                issues.push(ValidationIssue::new(&self.rule, location).with_arguments([
                    service_link.clone(),
                    format!("{} -> {}", actual.from, actual.to),
                    format!("{} -> {}", expected.from, expected.to),
                ]));
            }
        }
        Ok(issues)
    }
}
