//! Narrow domain exceptions to reference resolution.

use std::collections::HashSet;

use indexmap::IndexSet;

use crate::id::{IdVersion, NetexId};
use crate::validators::ExternalReferenceValidator;

/// Blocks may reference journeys of other line files
#[derive(Debug, Default, Clone)]
pub struct BlockJourneyReferencesIgnorer;

const BLOCK_JOURNEY_REFERENCES: &[&str] = &[
    "ServiceJourneyRef",
    "VehicleJourneyRef",
    "JourneyRef",
    "DeadRunRef",
];

impl ExternalReferenceValidator for BlockJourneyReferencesIgnorer {
    fn name(&self) -> &str {
        "block journey references"
    }

    fn validate(&self, references: &IndexSet<IdVersion>) -> IndexSet<IdVersion> {
        references
            .iter()
            .filter(|reference| {
                BLOCK_JOURNEY_REFERENCES.contains(&reference.element_name.as_str())
                    && (reference.id.contains("ServiceJourney") || reference.id.contains("DeadRun"))
                    && reference.nearest_entity_ancestor() == Some("Block")
            })
            .cloned()
            .collect()
    }
}

/// Interchanges may connect to journeys of other line files
#[derive(Debug, Default, Clone)]
pub struct InterchangeJourneyReferencesIgnorer;

impl ExternalReferenceValidator for InterchangeJourneyReferencesIgnorer {
    fn name(&self) -> &str {
        "interchange journey references"
    }

    fn validate(&self, references: &IndexSet<IdVersion>) -> IndexSet<IdVersion> {
        references
            .iter()
            .filter(|reference| {
                matches!(
                    reference.element_name.as_str(),
                    "FromJourneyRef" | "ToJourneyRef"
                ) && NetexId::entity_type_of(&reference.id) == Some("ServiceJourney")
                    && reference.nearest_entity_ancestor() == Some("ServiceJourneyInterchange")
            })
            .cloned()
            .collect()
    }
}

/// References into codespaces maintained outside the dataset, such as a
/// national stop register
#[derive(Debug, Clone)]
pub struct ExternalCodespaceIgnorer {
    codespaces: HashSet<String>,
}

impl ExternalCodespaceIgnorer {
    pub fn new<I, S>(codespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codespaces: codespaces.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExternalReferenceValidator for ExternalCodespaceIgnorer {
    fn name(&self) -> &str {
        "external codespaces"
    }

    fn validate(&self, references: &IndexSet<IdVersion>) -> IndexSet<IdVersion> {
        references
            .iter()
            .filter(|reference| {
                NetexId::parse(&reference.id)
                    .is_some_and(|id| self.codespaces.contains(id.codespace))
            })
            .cloned()
            .collect()
    }
}
