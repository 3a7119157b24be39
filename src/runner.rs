//! Per-file orchestration.
//!
//! A file goes through four phases: parsing, schema gates, extraction of
//! local ids and references, then every registered validator in order.
//! Each phase can end the file early; only integration errors are returned
//! as `Err`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::XmlValidationContext;
use crate::entry_factory::{DefaultEntryFactory, ValidationReportEntryFactory};
use crate::error::Result;
use crate::extract::IdExtractor;
use crate::repository::{CommonDataRepository, NetexIdRepository};
use crate::report::{ValidationIssue, ValidationReport, ValidationRule};
use crate::tree::ValidationTree;
use crate::validators::schema::{parse_failure, schema_rule};
use crate::validators::{
    ExternalReferenceValidator, NetexIdUniquenessValidator, NetexReferenceValidator,
    ReferenceToValidEntityTypeValidator, SchemaGate, ServiceLinkValidator,
    StopAssignmentValidator, TreeValidator, VersionOnLocalIdsValidator,
    VersionOnRefToLocalIdsValidator, XmlValidator,
};
use crate::xml::Document;

/// Files whose name starts with this prefix declare shared data
pub const DEFAULT_COMMON_FILE_PREFIX: &str = "_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Do not run schema gates (well-formedness is still required)
    pub skip_schema: bool,
    /// Stop after the schema gates
    pub skip_validators: bool,
}

pub struct NetexValidatorsRunner {
    extractor: IdExtractor,
    schema_gates: Vec<Arc<dyn SchemaGate>>,
    validators: Vec<Arc<dyn XmlValidator>>,
    common_data_repository: Option<Arc<dyn CommonDataRepository>>,
    entry_factory: Arc<dyn ValidationReportEntryFactory>,
    common_file_prefix: String,
    disabled_rules: HashSet<String>,
}

impl NetexValidatorsRunner {
    pub fn builder() -> NetexValidatorsRunnerBuilder {
        NetexValidatorsRunnerBuilder::default()
    }

    /// Whether a file declares shared data, judged by its base name
    pub fn is_common_file(&self, filename: &str) -> bool {
        Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&self.common_file_prefix))
    }

    pub fn validators(&self) -> &[Arc<dyn XmlValidator>] {
        &self.validators
    }

    /// Every rule the runner can report, by code, in registration order
    pub fn rules(&self) -> Vec<ValidationRule> {
        let mut seen = HashSet::new();
        std::iter::once(schema_rule())
            .chain(self.validators.iter().flat_map(|validator| validator.rules()))
            .filter(|rule| !self.disabled_rules.contains(&rule.code))
            .filter(|rule| seen.insert(rule.code.clone()))
            .collect()
    }

    pub fn validate(
        &self,
        codespace: &str,
        report_id: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<ValidationReport> {
        self.validate_with_options(
            codespace,
            report_id,
            filename,
            content,
            ValidationOptions::default(),
        )
    }

    pub fn validate_with_options(
        &self,
        codespace: &str,
        report_id: &str,
        filename: &str,
        content: &[u8],
        options: ValidationOptions,
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::new(codespace, report_id);

        let document = match Document::parse(content) {
            Ok(document) => document,
            Err(e) => {
                warn!(filename, error = %e, "file is not well-formed XML");
                self.append(&mut report, [parse_failure(filename, &e)]);
                return Ok(report);
            }
        };

        if !options.skip_schema && !self.schema_gates.is_empty() {
            let before = report.len();
            for gate in &self.schema_gates {
                self.append(&mut report, gate.check(filename, content));
            }
            let failed = report.entries()[before..]
                .iter()
                .any(|entry| entry.severity.is_error());
            if failed {
                debug!(filename, "schema gate failed, skipping validators");
                return Ok(report);
            }
        }

        if options.skip_validators {
            return Ok(report);
        }

        let common_file = self.is_common_file(filename);
        let local_ids = self.extractor.local_ids(&document, filename);
        let local_refs = self.extractor.local_references(&document, filename);
        debug!(
            filename,
            common_file,
            ids = local_ids.len(),
            references = local_refs.len(),
            "extracted identifiers"
        );

        let context =
            XmlValidationContext::new(codespace, report_id, filename, document, common_file)
                .with_ids(local_ids, local_refs);

        if common_file && let Some(repository) = &self.common_data_repository {
            repository.collect(report_id, &context.index);
        }

        for validator in &self.validators {
            let issues = validator.validate(&context)?;
            debug!(
                filename,
                validator = validator.name(),
                issues = issues.len(),
                "validator finished"
            );
            self.append(&mut report, issues);
        }

        Ok(report)
    }

    fn append(&self, report: &mut ValidationReport, issues: impl IntoIterator<Item = ValidationIssue>) {
        report.add_entries(
            issues
                .into_iter()
                .filter(|issue| !self.disabled_rules.contains(&issue.rule.code))
                .map(|issue| self.entry_factory.create_entry(&issue)),
        );
    }
}

pub struct NetexValidatorsRunnerBuilder {
    extractor: IdExtractor,
    schema_gates: Vec<Arc<dyn SchemaGate>>,
    validators: Vec<Arc<dyn XmlValidator>>,
    common_data_repository: Option<Arc<dyn CommonDataRepository>>,
    entry_factory: Arc<dyn ValidationReportEntryFactory>,
    common_file_prefix: String,
    disabled_rules: HashSet<String>,
}

impl Default for NetexValidatorsRunnerBuilder {
    fn default() -> Self {
        Self {
            extractor: IdExtractor::default(),
            schema_gates: Vec::new(),
            validators: Vec::new(),
            common_data_repository: None,
            entry_factory: Arc::new(DefaultEntryFactory),
            common_file_prefix: DEFAULT_COMMON_FILE_PREFIX.to_string(),
            disabled_rules: HashSet::new(),
        }
    }
}

impl NetexValidatorsRunnerBuilder {
    pub fn with_extractor(mut self, extractor: IdExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_schema_gate(mut self, gate: Arc<dyn SchemaGate>) -> Self {
        self.schema_gates.push(gate);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn XmlValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Repository fed with the tables of every common file
    pub fn with_common_data_repository(mut self, repository: Arc<dyn CommonDataRepository>) -> Self {
        self.common_data_repository = Some(repository);
        self
    }

    pub fn with_entry_factory(mut self, factory: Arc<dyn ValidationReportEntryFactory>) -> Self {
        self.entry_factory = factory;
        self
    }

    pub fn with_common_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.common_file_prefix = prefix.into();
        self
    }

    /// Drop issues of these rule codes, whichever validator emits them
    pub fn with_disabled_rules<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_rules.extend(codes.into_iter().map(Into::into));
        self
    }

    /// The standard validator chain over a rule tree and the two repositories
    pub fn with_default_validators(
        self,
        tree: Arc<ValidationTree>,
        id_repository: Arc<dyn NetexIdRepository>,
        common_data_repository: Arc<dyn CommonDataRepository>,
        external_validators: Vec<Arc<dyn ExternalReferenceValidator>>,
    ) -> Self {
        self.with_validator(Arc::new(TreeValidator::new(tree)))
            .with_validator(Arc::new(NetexIdUniquenessValidator::new(
                id_repository.clone(),
            )))
            .with_validator(Arc::new(NetexReferenceValidator::new(
                id_repository,
                external_validators,
            )))
            .with_validator(Arc::new(ReferenceToValidEntityTypeValidator::new()))
            .with_validator(Arc::new(VersionOnLocalIdsValidator::default()))
            .with_validator(Arc::new(VersionOnRefToLocalIdsValidator::default()))
            .with_validator(Arc::new(StopAssignmentValidator::new(
                common_data_repository.clone(),
            )))
            .with_validator(Arc::new(ServiceLinkValidator::new(
                common_data_repository.clone(),
            )))
            .with_common_data_repository(common_data_repository)
    }

    pub fn build(self) -> NetexValidatorsRunner {
        debug!(
            validators = self.validators.len(),
            schema_gates = self.schema_gates.len(),
            "built validators runner"
        );
        NetexValidatorsRunner {
            extractor: self.extractor,
            schema_gates: self.schema_gates,
            validators: self.validators,
            common_data_repository: self.common_data_repository,
            entry_factory: self.entry_factory,
            common_file_prefix: self.common_file_prefix,
            disabled_rules: self.disabled_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IntegrationError, ValidationError};
    use crate::id::DataLocation;
    use crate::report::Severity;
    use crate::repository::{InMemoryCommonDataRepository, InMemoryNetexIdRepository};
    use crate::validators::schema::SCHEMA_RULE_CODE;

    struct RejectAll;

    impl SchemaGate for RejectAll {
        fn name(&self) -> &str {
            "reject all"
        }

        fn check(&self, filename: &str, _content: &[u8]) -> Vec<ValidationIssue> {
            vec![
                ValidationIssue::new(&schema_rule(), DataLocation::file(filename))
                    .with_arguments(["rejected"]),
            ]
        }
    }

    struct Counting(ValidationRule);

    impl XmlValidator for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn rules(&self) -> Vec<ValidationRule> {
            vec![self.0.clone()]
        }

        fn validate(
            &self,
            context: &XmlValidationContext,
        ) -> crate::error::IntegrationResult<Vec<ValidationIssue>> {
            Ok(context
                .local_ids
                .iter()
                .map(|id| ValidationIssue::new(&self.0, id.location()).with_arguments([&id.id]))
                .collect())
        }
    }

    fn counting() -> Arc<dyn XmlValidator> {
        Arc::new(Counting(ValidationRule::new(
            "COUNT",
            "Count",
            "Saw {}",
            Severity::Info,
        )))
    }

    const LINE: &[u8] = br#"<PublicationDelivery><lines><Line id="X:Line:1" version="1"/></lines></PublicationDelivery>"#;

    #[test]
    fn test_malformed_file_yields_schema_entry_only() {
        let runner = NetexValidatorsRunner::builder()
            .with_validator(counting())
            .build();
        let report = runner
            .validate("X", "r", "line.xml", b"<PublicationDelivery><lines>")
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].name, schema_rule().name);
        assert!(report.has_error());
    }

    #[test]
    fn test_failed_schema_gate_stops_file() {
        let runner = NetexValidatorsRunner::builder()
            .with_schema_gate(Arc::new(RejectAll))
            .with_validator(counting())
            .build();

        let report = runner.validate("X", "r", "line.xml", LINE).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].message, "rejected");

        let options = ValidationOptions {
            skip_schema: true,
            ..ValidationOptions::default()
        };
        let report = runner
            .validate_with_options("X", "r", "line.xml", LINE, options)
            .unwrap();
        assert_eq!(report.count_for("Count"), 1);
    }

    #[test]
    fn test_skip_validators() {
        let runner = NetexValidatorsRunner::builder()
            .with_validator(counting())
            .build();
        let options = ValidationOptions {
            skip_validators: true,
            ..ValidationOptions::default()
        };
        let report = runner
            .validate_with_options("X", "r", "line.xml", LINE, options)
            .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_common_file_prefix() {
        let runner = NetexValidatorsRunner::builder().build();
        assert!(runner.is_common_file("_common.xml"));
        assert!(runner.is_common_file("dataset/_X_shared_data.xml"));
        assert!(!runner.is_common_file("_dir/line.xml"));

        let runner = NetexValidatorsRunner::builder()
            .with_common_file_prefix("shared-")
            .build();
        assert!(runner.is_common_file("shared-stops.xml"));
        assert!(!runner.is_common_file("_common.xml"));
    }

    #[test]
    fn test_integration_error_aborts_file() {
        let ids = Arc::new(InMemoryNetexIdRepository::new());
        let common = Arc::new(InMemoryCommonDataRepository::new());
        let tree = Arc::new(
            crate::tree::ValidationTreeBuilder::default()
                .build()
                .unwrap(),
        );
        let runner = NetexValidatorsRunner::builder()
            .with_default_validators(tree, ids, common, Vec::new())
            .build();

        let content = br#"<PublicationDelivery>
  <JourneyPattern id="X:JourneyPattern:1" version="1">
    <pointsInSequence>
      <StopPointInJourneyPattern id="X:StopPointInJourneyPattern:1" version="1" order="1">
        <ScheduledStopPointRef ref="X:ScheduledStopPoint:1" version="1"/>
      </StopPointInJourneyPattern>
    </pointsInSequence>
  </JourneyPattern>
</PublicationDelivery>"#;
        let result = runner.validate("X", "r", "line.xml", content);
        assert!(matches!(
            result,
            Err(ValidationError::Integration(
                IntegrationError::CommonDataNotCollected { .. }
            ))
        ));
    }

    #[test]
    fn test_disabled_rules_are_dropped() {
        let runner = NetexValidatorsRunner::builder()
            .with_validator(counting())
            .with_disabled_rules(["COUNT"])
            .build();
        assert!(runner.validate("X", "r", "line.xml", LINE).unwrap().is_empty());
        assert!(runner.rules().iter().all(|rule| rule.code != "COUNT"));
    }

    #[test]
    fn test_rules_are_listed_once() {
        let runner = NetexValidatorsRunner::builder()
            .with_validator(counting())
            .with_validator(counting())
            .build();
        let codes: Vec<_> = runner.rules().into_iter().map(|rule| rule.code).collect();
        assert_eq!(codes, vec![SCHEMA_RULE_CODE.to_string(), "COUNT".to_string()]);
    }
}
