//! Extraction of declared ids and references from a parsed document.

use std::collections::HashSet;

use crate::id::IdVersion;
use crate::xml::{Document, Node};

/// Frame wrappers carry ids but are containers rather than entities
pub const DEFAULT_IGNORED_ELEMENTS: &[&str] = &[
    "CompositeFrame",
    "ResourceFrame",
    "ServiceFrame",
    "ServiceCalendarFrame",
    "SiteFrame",
    "TimetableFrame",
    "VehicleScheduleFrame",
];

const REFERENCE_SUFFIX: &str = "Ref";

#[derive(Debug, Clone)]
pub struct IdExtractor {
    ignored_elements: HashSet<String>,
}

impl Default for IdExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_ELEMENTS.iter().copied())
    }
}

impl IdExtractor {
    pub fn new<I, S>(ignored_elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_elements: ignored_elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Every element carrying an `id` attribute, in document order
    pub fn local_ids(&self, document: &Document, filename: &str) -> Vec<IdVersion> {
        document
            .elements()
            .filter(|node| !self.ignored_elements.contains(node.local_name()))
            .filter_map(|node| {
                let id = node.id()?;
                Some(occurrence(node, id, node.attribute("version"), filename))
            })
            .collect()
    }

    /// Every `*Ref` element carrying a `ref` attribute, in document order
    pub fn local_references(&self, document: &Document, filename: &str) -> Vec<IdVersion> {
        document
            .elements()
            .filter(|node| node.local_name().ends_with(REFERENCE_SUFFIX))
            .filter_map(|node| {
                let reference = node.attribute("ref")?;
                let version = node
                    .attribute("version")
                    .or_else(|| node.attribute("versionRef"));
                Some(occurrence(node, reference, version, filename))
            })
            .collect()
    }
}

fn occurrence(node: Node<'_>, id: &str, version: Option<&str>, filename: &str) -> IdVersion {
    let parents = node
        .ancestors()
        .map(|ancestor| ancestor.local_name().to_string())
        .collect();
    IdVersion::new(id, version.map(str::to_string))
        .with_element(node.local_name(), parents)
        .with_location(filename, node.line(), node.column())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE_FILE: &str = r#"<PublicationDelivery>
  <dataObjects>
    <CompositeFrame id="TST:CompositeFrame:1" version="1">
      <frames>
        <ServiceFrame id="TST:ServiceFrame:1" version="1">
          <lines>
            <Line id="TST:Line:1" version="2">
              <OperatorRef ref="TST:Operator:1" version="1"/>
            </Line>
          </lines>
          <routes>
            <Route id="TST:Route:1">
              <LineRef ref="TST:Line:1" versionRef="2"/>
            </Route>
          </routes>
        </ServiceFrame>
      </frames>
    </CompositeFrame>
  </dataObjects>
</PublicationDelivery>"#;

    #[test]
    fn test_local_ids_skip_frames() {
        let document = Document::parse(LINE_FILE.as_bytes()).unwrap();
        let ids = IdExtractor::default().local_ids(&document, "line.xml");

        let names: Vec<_> = ids.iter().map(|id| id.id.as_str()).collect();
        assert_eq!(names, vec!["TST:Line:1", "TST:Route:1"]);
        assert_eq!(ids[0].version.as_deref(), Some("2"));
        assert_eq!(ids[1].version, None);
        assert_eq!(ids[0].element_name, "Line");
        assert_eq!(ids[0].parent_element_names[0], "lines");
        assert_eq!(ids[0].filename, "line.xml");
        assert_eq!(ids[0].line, 7);
    }

    #[test]
    fn test_local_references() {
        let document = Document::parse(LINE_FILE.as_bytes()).unwrap();
        let refs = IdExtractor::default().local_references(&document, "line.xml");

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "TST:Operator:1");
        assert_eq!(refs[0].element_name, "OperatorRef");
        assert_eq!(refs[0].nearest_entity_ancestor(), Some("Line"));
        assert_eq!(refs[1].id, "TST:Line:1");
        assert_eq!(refs[1].version.as_deref(), Some("2"));
    }

    #[test]
    fn test_custom_ignore_list() {
        let document = Document::parse(LINE_FILE.as_bytes()).unwrap();
        let ids = IdExtractor::new(["Route"]).local_ids(&document, "line.xml");
        assert!(ids.iter().any(|id| id.element_name == "ServiceFrame"));
        assert!(!ids.iter().any(|id| id.element_name == "Route"));
    }
}
