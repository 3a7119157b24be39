//! File-level validators run by the orchestrator, in registration order.

pub mod entity_type;
pub mod id_uniqueness;
pub mod ignorers;
pub mod reference;
pub mod schema;
pub mod service_link;
pub mod stop_assignment;
pub mod tree_validator;
pub mod version;

use crate::context::XmlValidationContext;
use crate::error::IntegrationResult;
use crate::report::{ValidationIssue, ValidationRule};

pub use entity_type::ReferenceToValidEntityTypeValidator;
pub use id_uniqueness::NetexIdUniquenessValidator;
pub use ignorers::{
    BlockJourneyReferencesIgnorer, ExternalCodespaceIgnorer, InterchangeJourneyReferencesIgnorer,
};
pub use reference::{ExternalReferenceValidator, NetexReferenceValidator};
pub use schema::SchemaGate;
pub use service_link::ServiceLinkValidator;
pub use stop_assignment::StopAssignmentValidator;
pub use tree_validator::TreeValidator;
pub use version::{VersionOnLocalIdsValidator, VersionOnRefToLocalIdsValidator};

/// A check over a whole parsed file.
///
/// Data problems are returned as issues; an `Err` is a sequencing or
/// integration bug and aborts the file.
pub trait XmlValidator: Send + Sync {
    fn name(&self) -> &str;

    /// Rules this validator can emit
    fn rules(&self) -> Vec<ValidationRule>;

    fn validate(&self, context: &XmlValidationContext) -> IntegrationResult<Vec<ValidationIssue>>;
}
