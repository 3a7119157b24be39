//! Diagnostic model: rules, raw issues, finalized entries and the report.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::DataLocation;

/// Severity of a report entry, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// ERROR and CRITICAL entries fail a dataset
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity '{}'", s)),
        }
    }
}

/// A check, identified by its stable code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub code: String,
    pub name: String,
    /// Message template; each `{}` is replaced by the next issue argument
    pub message: String,
    pub severity: Severity,
}

impl ValidationRule {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn format_message(&self, arguments: &[String]) -> String {
        format_template(&self.message, arguments)
    }
}

/// Fill `{}` placeholders positionally; missing arguments become empty strings.
pub fn format_template(template: &str, arguments: &[String]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut arguments = arguments.iter();
    let mut rest = template;
    while let Some(position) = rest.find("{}") {
        output.push_str(&rest[..position]);
        if let Some(argument) = arguments.next() {
            output.push_str(argument);
        }
        rest = &rest[position + 2..];
    }
    output.push_str(rest);
    output
}

/// Raw emission from a single check, before any configuration overrides
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub rule: ValidationRule,
    pub location: DataLocation,
    pub arguments: Vec<String>,
}

impl ValidationIssue {
    pub fn new(rule: &ValidationRule, location: DataLocation) -> Self {
        Self {
            rule: rule.clone(),
            location,
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }
}

/// Finalized diagnostic as it appears in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReportEntry {
    pub name: String,
    pub message: String,
    pub severity: Severity,
    pub object_id: Option<String>,
    pub filename: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ValidationReportEntry {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        location: &DataLocation,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            severity,
            object_id: location.object_id.clone(),
            filename: location.filename.clone(),
            line: location.line,
            column: location.column,
        }
    }
}

/// Accumulating report for one dataset run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub codespace: String,
    pub report_id: String,
    pub creation_timestamp: DateTime<Utc>,
    entries: Vec<ValidationReportEntry>,
    count_per_rule_name: BTreeMap<String, usize>,
}

impl ValidationReport {
    pub fn new(codespace: impl Into<String>, report_id: impl Into<String>) -> Self {
        Self {
            codespace: codespace.into(),
            report_id: report_id.into(),
            creation_timestamp: Utc::now(),
            entries: Vec::new(),
            count_per_rule_name: BTreeMap::new(),
        }
    }

    pub fn add_entry(&mut self, entry: ValidationReportEntry) {
        *self
            .count_per_rule_name
            .entry(entry.name.clone())
            .or_insert(0) += 1;
        self.entries.push(entry);
    }

    pub fn add_entries<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = ValidationReportEntry>,
    {
        for entry in entries {
            self.add_entry(entry);
        }
    }

    /// Append another report's entries (e.g. a per-file report into the dataset report)
    pub fn merge(&mut self, other: ValidationReport) {
        self.add_entries(other.entries);
    }

    pub fn entries(&self) -> &[ValidationReportEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ValidationReportEntry> {
        self.entries
    }

    pub fn count_per_rule_name(&self) -> &BTreeMap<String, usize> {
        &self.count_per_rule_name
    }

    pub fn count_for(&self, rule_name: &str) -> usize {
        self.count_per_rule_name
            .get(rule_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|entry| entry.severity.is_error())
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }
}
