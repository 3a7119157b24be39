//! Report formatting for the terminal.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::dataset::DatasetResults;
use crate::error::Result;
use crate::report::{Severity, ValidationReport, ValidationReportEntry, ValidationRule};

pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn severity_label(&self, severity: Severity) -> String {
        let color = match severity {
            Severity::Info => "36",
            Severity::Warning => "33",
            Severity::Error => "31",
            Severity::Critical => "1;31",
        };
        self.colorize(&format!("{:<8}", severity.to_string()), color)
    }

    pub fn format_results(&self, results: &DatasetResults) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&results.report)?),
            OutputFormat::Summary => Ok(self.format_summary(results)),
            OutputFormat::Human => Ok(self.format_human(results)),
        }
    }

    fn format_human(&self, results: &DatasetResults) -> String {
        let report = &results.report;
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            let errors = errors_of(report);
            for entry in report.entries().iter().filter(|entry| entry.severity.is_error()) {
                output.push_str(&self.format_entry(entry));
                output.push('\n');
            }
            if errors > 0 {
                output.push_str(&format!("Errors: {}\n", errors));
            }
            return output;
        }

        let min_severity = if self.verbosity >= VerbosityLevel::Verbose {
            Severity::Info
        } else {
            Severity::Warning
        };

        let mut by_file: BTreeMap<&str, Vec<&ValidationReportEntry>> = BTreeMap::new();
        for entry in report.entries() {
            if entry.severity >= min_severity {
                by_file.entry(&entry.filename).or_default().push(entry);
            }
        }
        for (filename, entries) in by_file {
            output.push_str(&format!("{}\n", filename));
            for entry in entries {
                output.push_str("  ");
                output.push_str(&self.format_entry(entry));
                output.push('\n');
            }
        }
        if !output.is_empty() {
            output.push('\n');
        }

        output.push_str(&self.format_summary(results));
        output
    }

    pub fn format_entry(&self, entry: &ValidationReportEntry) -> String {
        let position = match (entry.line, entry.column) {
            (Some(line), Some(column)) => format!("{}:{}", line, column),
            (Some(line), None) => line.to_string(),
            _ => "-".to_string(),
        };
        let mut formatted = format!(
            "{} {:>9}  {}: {}",
            self.severity_label(entry.severity),
            position,
            entry.name,
            entry.message
        );
        if self.verbosity >= VerbosityLevel::Verbose
            && let Some(object_id) = &entry.object_id
        {
            formatted.push_str(&format!(" [{}]", object_id));
        }
        formatted
    }

    fn format_summary(&self, results: &DatasetResults) -> String {
        let report = &results.report;
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Codespace: {}\n", report.codespace));
        output.push_str(&format!(
            "  Files: {} ({} common, {} line)\n",
            results.total_files(),
            results.common_files,
            results.line_files
        ));

        for severity in [
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Info,
        ] {
            let count = report.count_by_severity(severity);
            if count > 0 {
                output.push_str(&format!(
                    "  {} {}\n",
                    self.severity_label(severity),
                    count
                ));
            }
        }

        if self.format == OutputFormat::Summary || self.verbosity >= VerbosityLevel::Verbose {
            if !report.count_per_rule_name().is_empty() {
                output.push_str("  Per rule:\n");
            }
            for (name, count) in report.count_per_rule_name() {
                output.push_str(&format!("    {:>6}  {}\n", count, name));
            }
        }

        let verdict = if report.has_error() {
            self.colorize("✗ INVALID", "31")
        } else {
            self.colorize("✓ VALID", "32")
        };
        output.push_str(&format!(
            "  Result: {} ({})\n",
            verdict,
            format_duration(results.duration)
        ));
        output
    }

    /// Rule catalog listing for `--list-rules`
    pub fn format_rules(&self, rules: &[ValidationRule]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(rules)?);
        }
        let width = rules.iter().map(|rule| rule.code.len()).max().unwrap_or(0);
        Ok(rules
            .iter()
            .map(|rule| {
                format!(
                    "{:<width$}  {}  {}\n",
                    rule.code,
                    self.severity_label(rule.severity),
                    rule.name,
                    width = width
                )
            })
            .collect())
    }
}

fn errors_of(report: &ValidationReport) -> usize {
    report.count_by_severity(Severity::Error) + report.count_by_severity(Severity::Critical)
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
