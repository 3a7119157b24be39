//! Conversion of raw issues into report entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::report::{Severity, ValidationIssue, ValidationReportEntry, format_template};

/// Turns a [`ValidationIssue`] into a finalized [`ValidationReportEntry`]
pub trait ValidationReportEntryFactory: Send + Sync {
    fn create_entry(&self, issue: &ValidationIssue) -> ValidationReportEntry;
}

/// Uses the rule's own name, message and severity
#[derive(Debug, Default, Clone)]
pub struct DefaultEntryFactory;

impl ValidationReportEntryFactory for DefaultEntryFactory {
    fn create_entry(&self, issue: &ValidationIssue) -> ValidationReportEntry {
        ValidationReportEntry::new(
            &issue.rule.name,
            issue.rule.format_message(&issue.arguments),
            issue.rule.severity,
            &issue.location,
        )
    }
}

/// Per-rule replacement of name, message template or severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub name: Option<String>,
    pub message: Option<String>,
    pub severity: Option<Severity>,
}

/// Applies configured overrides keyed by rule code
#[derive(Debug, Clone, Default)]
pub struct ConfigurableEntryFactory {
    overrides: HashMap<String, RuleOverride>,
}

impl ConfigurableEntryFactory {
    pub fn new(overrides: HashMap<String, RuleOverride>) -> Self {
        debug!(overrides = overrides.len(), "configured rule overrides");
        Self { overrides }
    }
}

impl ValidationReportEntryFactory for ConfigurableEntryFactory {
    fn create_entry(&self, issue: &ValidationIssue) -> ValidationReportEntry {
        let Some(rule_override) = self.overrides.get(&issue.rule.code) else {
            return DefaultEntryFactory.create_entry(issue);
        };

        let name = rule_override.name.as_deref().unwrap_or(&issue.rule.name);
        let template = rule_override
            .message
            .as_deref()
            .unwrap_or(&issue.rule.message);
        let severity = rule_override.severity.unwrap_or(issue.rule.severity);

        ValidationReportEntry::new(
            name,
            format_template(template, &issue.arguments),
            severity,
            &issue.location,
        )
    }
}
