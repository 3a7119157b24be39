//! Built-in rule catalog and loading of additional rules from TOML.
//!
//! A catalog file lists rules as `[[rules]]` tables:
//!
//! ```toml
//! [[rules]]
//! code = "LINE_9"
//! name = "Line missing private code"
//! message = "Line {} has no PrivateCode"
//! severity = "WARNING"
//! context = "//lines/Line"
//! query = "PrivateCode"
//! kind = "must_exist"
//! file_class = "line"
//! ```
//!
//! Rules with a `context` other than `.` join the subtree with that selector,
//! which is created on first use.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::TreeContext;
use crate::error::{CatalogError, QueryError};
use crate::report::{Severity, ValidationIssue, ValidationRule};
use crate::tree::{FnRule, PathRule, PathRuleKind, ValidationTreeBuilder};

static RULE_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

fn rule_code_regex() -> &'static Regex {
    RULE_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)*$").expect("Failed to compile rule code regex")
    })
}

pub const ROOT_TREE: &str = "root";
pub const ROOT_CONTEXT: &str = ".";

/// Subtree contexts of the built-in catalog
pub const LINES_CONTEXT: &str = "//lines/*";
pub const SERVICE_JOURNEYS_CONTEXT: &str = "//vehicleJourneys/ServiceJourney";
pub const SERVICE_LINKS_CONTEXT: &str = "//serviceLinks/ServiceLink";
pub const STOP_ASSIGNMENTS_CONTEXT: &str = "//stopAssignments/PassengerStopAssignment";
pub const AUTHORITIES_CONTEXT: &str = "//organisations/Authority";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    #[default]
    All,
    Common,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    NotExist,
    MustExist,
}

impl From<RuleKind> for PathRuleKind {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::NotExist => PathRuleKind::NotExist,
            RuleKind::MustExist => PathRuleKind::MustExist,
        }
    }
}

/// One `[[rules]]` entry of a catalog file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub code: String,
    pub name: String,
    pub message: String,
    pub severity: String,
    #[serde(default = "default_context")]
    pub context: String,
    pub query: String,
    #[serde(default)]
    pub kind: RuleKind,
    #[serde(default)]
    pub file_class: FileClass,
}

fn default_context() -> String {
    ROOT_CONTEXT.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleCatalog {
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RuleCatalog {
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&content)?;
        info!(path = %path.display(), rules = catalog.rules.len(), "loaded rule catalog");
        Ok(catalog)
    }

    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    /// Add every rule to `builder`. A code that already exists anywhere in the
    /// tree is replaced, so a catalog can customize the built-in rules.
    pub fn apply_to(&self, builder: &mut ValidationTreeBuilder) -> Result<(), CatalogError> {
        for definition in &self.rules {
            let rule = definition.to_path_rule()?;
            if builder.remove_rule(&definition.code) {
                debug!(code = %definition.code, "catalog overrides rule");
            }

            let target = if definition.context == ROOT_CONTEXT {
                &mut *builder
            } else {
                builder.subtree_with_selector(&definition.context)
            };

            match definition.file_class {
                FileClass::All => target.add_rule(rule),
                FileClass::Common => target.add_common_file_rule(rule),
                FileClass::Line => target.add_line_file_rule(rule),
            };
        }
        Ok(())
    }
}

impl RuleDefinition {
    fn to_path_rule(&self) -> Result<PathRule, CatalogError> {
        if !rule_code_regex().is_match(&self.code) {
            return Err(CatalogError::InvalidCode {
                code: self.code.clone(),
            });
        }
        let severity: Severity = self.severity.parse().map_err(|_| CatalogError::InvalidSeverity {
            code: self.code.clone(),
            value: self.severity.clone(),
        })?;

        let rule = ValidationRule::new(&self.code, &self.name, &self.message, severity);
        PathRule::new(rule, &self.query, self.kind.into()).map_err(|source| {
            CatalogError::InvalidQuery {
                code: self.code.clone(),
                source,
            }
        })
    }
}

fn rule(code: &str, name: &str, message: &str, severity: Severity) -> ValidationRule {
    ValidationRule::new(code, name, message, severity)
}

/// The built-in rules
pub fn default_tree_builder() -> Result<ValidationTreeBuilder, QueryError> {
    let mut root = ValidationTreeBuilder::new(ROOT_TREE, ROOT_CONTEXT);
    root.add_rule(PathRule::must_exist(
        rule(
            "PUBLICATION_DELIVERY_1",
            "Missing PublicationDelivery",
            "The document root must be PublicationDelivery",
            Severity::Critical,
        ),
        "PublicationDelivery",
    )?)
    .add_rule(PathRule::not_exist(
        rule(
            "VERSION_NON_NUMERIC",
            "Non-numeric version",
            "Version 'any' is not allowed on {}",
            Severity::Warning,
        ),
        "//*[@version='any']",
    )?)
    .add_common_file_rule(PathRule::not_exist(
        rule(
            "COMMON_FILE_1",
            "Timetable frame in common file",
            "Common files must not contain TimetableFrame {}",
            Severity::Error,
        ),
        "//TimetableFrame",
    )?)
    .add_line_file_rule(PathRule::must_exist(
        rule(
            "LINE_FILE_1",
            "Line file without line",
            "A line file must contain a Line or FlexibleLine",
            Severity::Error,
        ),
        LINES_CONTEXT,
    )?);

    let mut lines = ValidationTreeBuilder::new("lines", LINES_CONTEXT);
    lines
        .add_rule(PathRule::must_exist(
            rule("LINE_2", "Line missing Name", "Line {} has no Name", Severity::Error),
            "Name",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "LINE_3",
                "Line missing PublicCode",
                "Line {} has no PublicCode",
                Severity::Warning,
            ),
            "PublicCode",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "LINE_4",
                "Line missing TransportMode",
                "Line {} has no TransportMode",
                Severity::Error,
            ),
            "TransportMode",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "LINE_5",
                "Line missing Network or GroupOfLines",
                "Line {} has no RepresentedByGroupRef",
                Severity::Warning,
            ),
            "RepresentedByGroupRef",
        )?);

    let mut service_journeys =
        ValidationTreeBuilder::new("service journeys", SERVICE_JOURNEYS_CONTEXT);
    service_journeys
        .add_rule(PathRule::must_exist(
            rule(
                "SERVICE_JOURNEY_3",
                "ServiceJourney missing passing times",
                "ServiceJourney {} has no passingTimes",
                Severity::Error,
            ),
            "passingTimes",
        )?)
        .add_rule(PathRule::not_exist(
            rule(
                "SERVICE_JOURNEY_4",
                "Passing time without arrival or departure",
                "TimetabledPassingTime {} has neither ArrivalTime nor DepartureTime",
                Severity::Error,
            ),
            "passingTimes/TimetabledPassingTime[not(ArrivalTime)][not(DepartureTime)]",
        )?)
        .add_rule(FnRule::new(
            rule(
                "SERVICE_JOURNEY_10",
                "ServiceJourney missing journey pattern",
                "ServiceJourney {} references no JourneyPattern",
                Severity::Error,
            ),
            missing_journey_pattern,
        ));

    let mut service_links = ValidationTreeBuilder::new("service links", SERVICE_LINKS_CONTEXT);
    service_links
        .add_rule(PathRule::must_exist(
            rule(
                "SERVICE_LINK_1",
                "ServiceLink missing FromPointRef",
                "ServiceLink {} has no FromPointRef",
                Severity::Error,
            ),
            "FromPointRef",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "SERVICE_LINK_3",
                "ServiceLink missing ToPointRef",
                "ServiceLink {} has no ToPointRef",
                Severity::Error,
            ),
            "ToPointRef",
        )?);

    let mut stop_assignments =
        ValidationTreeBuilder::new("stop assignments", STOP_ASSIGNMENTS_CONTEXT);
    stop_assignments
        .add_rule(PathRule::must_exist(
            rule(
                "PASSENGER_STOP_ASSIGNMENT_1",
                "Stop assignment missing ScheduledStopPointRef",
                "PassengerStopAssignment {} has no ScheduledStopPointRef",
                Severity::Error,
            ),
            "ScheduledStopPointRef",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "PASSENGER_STOP_ASSIGNMENT_2",
                "Stop assignment missing QuayRef",
                "PassengerStopAssignment {} has no QuayRef",
                Severity::Error,
            ),
            "QuayRef",
        )?);

    let mut authorities = ValidationTreeBuilder::new("authorities", AUTHORITIES_CONTEXT);
    authorities
        .add_rule(PathRule::must_exist(
            rule(
                "AUTHORITY_1",
                "Authority missing Name",
                "Authority {} has no Name",
                Severity::Error,
            ),
            "Name",
        )?)
        .add_rule(PathRule::must_exist(
            rule(
                "AUTHORITY_2",
                "Authority missing ContactDetails",
                "Authority {} has no ContactDetails",
                Severity::Warning,
            ),
            "ContactDetails",
        )?);

    root.add_subtree(lines)
        .add_subtree(service_journeys)
        .add_subtree(service_links)
        .add_subtree(stop_assignments)
        .add_subtree(authorities);
    Ok(root)
}

fn missing_journey_pattern(rule: &ValidationRule, context: &TreeContext<'_>) -> Vec<ValidationIssue> {
    let node = context.node;
    if node.child("JourneyPatternRef").is_some() || node.child("ServiceJourneyPatternRef").is_some()
    {
        return Vec::new();
    }
    let location = context.file.location_of(node);
    let subject = location.object_id.clone().unwrap_or_default();
    vec![ValidationIssue::new(rule, location).with_arguments([subject])]
}

/// Built-in catalog, optionally extended from a file, minus disabled codes
pub fn load_tree_builder(
    catalog_file: Option<&Path>,
    disabled: &[String],
) -> crate::error::Result<ValidationTreeBuilder> {
    let mut builder = default_tree_builder()?;
    if let Some(path) = catalog_file {
        RuleCatalog::from_file(path)?.apply_to(&mut builder)?;
    }
    for code in disabled {
        if !builder.remove_rule(code) {
            debug!(code = %code, "disabled rule is not in the catalog");
        }
    }
    Ok(builder)
}
