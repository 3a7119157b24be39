//! Structural gate run before any other validator.
//!
//! Well-formedness is checked by parsing the document. Gates registered on
//! the runner add further checks on the raw bytes, such as XSD validation.

use crate::error::DocumentError;
use crate::id::DataLocation;
use crate::report::{Severity, ValidationIssue, ValidationRule};

pub const SCHEMA_RULE_CODE: &str = "NETEX_SCHEMA";

pub fn schema_rule() -> ValidationRule {
    ValidationRule::new(
        SCHEMA_RULE_CODE,
        "NeTEx schema validation",
        "{}",
        Severity::Error,
    )
}

/// Issue for a file that could not be parsed
pub fn parse_failure(filename: &str, error: &DocumentError) -> ValidationIssue {
    let location = match error.position() {
        Some((line, column)) => DataLocation::new(None, filename, line, column),
        None => DataLocation::file(filename),
    };
    ValidationIssue::new(&schema_rule(), location).with_arguments([error.to_string()])
}

/// Pass/fail check on the raw content of a file
pub trait SchemaGate: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, filename: &str, content: &[u8]) -> Vec<ValidationIssue>;
}

#[cfg(feature = "xsd")]
pub use xsd::XsdSchemaGate;

#[cfg(feature = "xsd")]
mod xsd {
    use std::path::Path;

    use tracing::{debug, warn};

    use super::{SchemaGate, schema_rule};
    use crate::error::{Result, ValidationError};
    use crate::id::DataLocation;
    use crate::libxml2::{LibXml2Wrapper, SchemaValidation, XmlSchemaPtr};
    use crate::report::ValidationIssue;

    /// Validates files against one XSD through libxml2
    pub struct XsdSchemaGate {
        wrapper: LibXml2Wrapper,
        schema: XmlSchemaPtr,
    }

    impl XsdSchemaGate {
        pub fn from_file(path: &Path) -> Result<Self> {
            let wrapper = LibXml2Wrapper::new();
            let schema = wrapper
                .parse_schema_file(path)
                .map_err(|e| ValidationError::SchemaGate {
                    details: format!("{}: {}", path.display(), e),
                })?;
            debug!(schema = %path.display(), "loaded XSD");
            Ok(Self { wrapper, schema })
        }
    }

    impl SchemaGate for XsdSchemaGate {
        fn name(&self) -> &str {
            "xsd"
        }

        fn check(&self, filename: &str, content: &[u8]) -> Vec<ValidationIssue> {
            let rule = schema_rule();
            match self.wrapper.validate_memory(&self.schema, filename, content) {
                Ok(SchemaValidation::Valid) => Vec::new(),
                Ok(SchemaValidation::Invalid(errors)) => errors
                    .into_iter()
                    .map(|error| {
                        let location = match error.line {
                            Some(line) => DataLocation::new(None, filename, line, 0),
                            None => DataLocation::file(filename),
                        };
                        ValidationIssue::new(&rule, location).with_arguments([error.message])
                    })
                    .collect(),
                Err(e) => {
                    warn!(filename, error = %e, "XSD validation could not run");
                    vec![
                        ValidationIssue::new(&rule, DataLocation::file(filename))
                            .with_arguments([e.to_string()]),
                    ]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_location() {
        let error = DocumentError::Malformed {
            line: 4,
            column: 2,
            details: "mismatched tag".to_string(),
        };
        let issue = parse_failure("line.xml", &error);
        assert_eq!(issue.rule.code, SCHEMA_RULE_CODE);
        assert_eq!(issue.location.line, Some(4));
        assert!(issue.arguments[0].contains("mismatched tag"));

        let issue = parse_failure("line.xml", &DocumentError::MissingRoot);
        assert_eq!(issue.location.line, None);
    }
}
