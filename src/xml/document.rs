//! Navigable XML node tree with source positions.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::DocumentError;

const DOCUMENT_INDEX: usize = 0;

#[derive(Debug)]
struct NodeData {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<usize>,
    children: Vec<usize>,
    line: u32,
    column: u32,
}

impl NodeData {
    fn new(name: String, parent: Option<usize>, line: u32, column: u32) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            text: String::new(),
            parent,
            children: Vec::new(),
            line,
            column,
        }
    }
}

/// Parsed document. Node 0 is the document node; the root element is its only
/// element child. Element and attribute names are stored as local names.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Document {
    pub fn parse(content: &[u8]) -> Result<Self, DocumentError> {
        let lines = LineIndex::new(content);
        let mut reader = Reader::from_reader(content);
        let mut nodes = vec![NodeData::new(String::new(), None, 1, 1)];
        let mut open = vec![DOCUMENT_INDEX];

        loop {
            let before = reader.buffer_position();
            let event = reader.read_event().map_err(|e| {
                let (line, column) = lines.position(reader.buffer_position());
                DocumentError::Malformed {
                    line,
                    column,
                    details: e.to_string(),
                }
            })?;

            match event {
                Event::Start(start) => {
                    let index = push_element(&mut nodes, &open, &start, &lines, content, before)?;
                    open.push(index);
                }
                Event::Empty(start) => {
                    push_element(&mut nodes, &open, &start, &lines, content, before)?;
                }
                Event::End(end) => {
                    if open.len() <= 1 {
                        let (line, _) = lines.position(before);
                        return Err(DocumentError::UnbalancedEndTag {
                            name: String::from_utf8_lossy(end.local_name().as_ref()).into_owned(),
                            line,
                        });
                    }
                    open.pop();
                }
                Event::Text(text) => {
                    let current = current_index(&open);
                    if current != DOCUMENT_INDEX {
                        let value = text.unescape().map_err(|e| {
                            malformed(&lines, reader.buffer_position(), e.to_string())
                        })?;
                        nodes[current].text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    let current = current_index(&open);
                    if current != DOCUMENT_INDEX {
                        nodes[current].text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if open.len() > 1 {
            let unclosed = &nodes[current_index(&open)];
            return Err(DocumentError::Malformed {
                line: unclosed.line,
                column: unclosed.column,
                details: format!("element <{}> is never closed", unclosed.name),
            });
        }

        if nodes[DOCUMENT_INDEX].children.is_empty() {
            return Err(DocumentError::MissingRoot);
        }

        Ok(Self { nodes })
    }

    /// The document node, parent of the root element
    pub fn document_node(&self) -> Node<'_> {
        Node {
            document: self,
            index: DOCUMENT_INDEX,
        }
    }

    pub fn root_element(&self) -> Option<Node<'_>> {
        self.document_node().children().next()
    }

    /// Every element in document order
    pub fn elements(&self) -> impl Iterator<Item = Node<'_>> {
        (1..self.nodes.len()).map(move |index| Node {
            document: self,
            index,
        })
    }
}

fn current_index(open: &[usize]) -> usize {
    open.last().copied().unwrap_or(DOCUMENT_INDEX)
}

fn malformed(lines: &LineIndex, offset: usize, details: String) -> DocumentError {
    let (line, column) = lines.position(offset);
    DocumentError::Malformed {
        line,
        column,
        details,
    }
}

fn push_element(
    nodes: &mut Vec<NodeData>,
    open: &[usize],
    start: &BytesStart<'_>,
    lines: &LineIndex,
    content: &[u8],
    before: usize,
) -> Result<usize, DocumentError> {
    let parent = current_index(open);
    if parent == DOCUMENT_INDEX && !nodes[DOCUMENT_INDEX].children.is_empty() {
        return Err(malformed(
            lines,
            before,
            "document has more than one root element".to_string(),
        ));
    }

    // The reader may already have consumed the opening '<'.
    let upto = (before + 1).min(content.len());
    let tag_start = content[..upto]
        .iter()
        .rposition(|&b| b == b'<')
        .unwrap_or(before);
    let (line, column) = lines.position(tag_start);

    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut node = NodeData::new(name, Some(parent), line, column);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| malformed(lines, tag_start, e.to_string()))?;
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| malformed(lines, tag_start, e.to_string()))?
            .into_owned();
        node.attributes.push((key, value));
    }

    let index = nodes.len();
    nodes.push(node);
    nodes[parent].children.push(index);
    Ok(index)
}

/// Maps byte offsets to 1-based line and column numbers
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &[u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(offset, _)| offset + 1),
        );
        Self { line_starts }
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        (line as u32, (offset - line_start + 1) as u32)
    }
}

/// Cheap handle to one node of a [`Document`]
#[derive(Clone, Copy)]
pub struct Node<'a> {
    document: &'a Document,
    index: usize,
}

impl<'a> Node<'a> {
    fn data(&self) -> &'a NodeData {
        &self.document.nodes[self.index]
    }

    fn at(&self, index: usize) -> Node<'a> {
        Node {
            document: self.document,
            index,
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn is_document(&self) -> bool {
        self.index == DOCUMENT_INDEX
    }

    /// Local element name; empty for the document node
    pub fn local_name(&self) -> &'a str {
        &self.data().name
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Shorthand for the `id` attribute
    pub fn id(&self) -> Option<&'a str> {
        self.attribute("id")
    }

    /// Text content directly inside this element, trimmed
    pub fn text(&self) -> &'a str {
        self.data().text.trim()
    }

    pub fn line(&self) -> u32 {
        self.data().line
    }

    pub fn column(&self) -> u32 {
        self.data().column
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|index| self.at(index))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let document = self.document;
        self.data().children.iter().map(move |&index| Node { document, index })
    }

    pub fn child(&self, name: &str) -> Option<Node<'a>> {
        self.children().find(|child| child.local_name() == name)
    }

    /// Ancestor elements, nearest first; the document node is not included
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
            .filter(|node| !node.is_document())
    }

    /// Descendant elements in document order, excluding this node
    pub fn descendants(&self) -> Vec<Node<'a>> {
        let mut found = Vec::new();
        let mut stack: Vec<Node<'a>> = self.children().collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            found.push(node);
            let first = stack.len();
            stack.extend(node.children());
            stack[first..].reverse();
        }
        found
    }

    /// `id` of this node or of the nearest ancestor carrying one
    pub fn nearest_id(&self) -> Option<&'a str> {
        self.id().or_else(|| self.ancestors().find_map(|node| node.id()))
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.document, other.document) && self.index == other.index
    }
}

impl Eq for Node<'_> {}

impl std::hash::Hash for Node<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.document, state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.local_name())
            .field("line", &self.line())
            .field("column", &self.column())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PublicationDelivery xmlns="http://www.netex.org.uk/netex" version="1.13">
  <dataObjects>
    <Line id="TST:Line:1" version="1">
      <Name>Express &amp; more</Name>
    </Line>
    <Line id="TST:Line:2" version="1"/>
  </dataObjects>
</PublicationDelivery>"#;

    #[test]
    fn test_parse_structure() {
        let document = Document::parse(SAMPLE.as_bytes()).unwrap();
        let root = document.root_element().unwrap();
        assert_eq!(root.local_name(), "PublicationDelivery");
        assert_eq!(root.attribute("version"), Some("1.13"));
        assert!(root.attribute("xmlns").is_none());

        let lines: Vec<_> = root
            .child("dataObjects")
            .unwrap()
            .children()
            .map(|line| line.id().unwrap())
            .collect();
        assert_eq!(lines, vec!["TST:Line:1", "TST:Line:2"]);
    }

    #[test]
    fn test_positions_are_one_based() {
        let document = Document::parse(SAMPLE.as_bytes()).unwrap();
        let root = document.root_element().unwrap();
        assert_eq!((root.line(), root.column()), (2, 1));

        let first_line = root.child("dataObjects").unwrap().child("Line").unwrap();
        assert_eq!((first_line.line(), first_line.column()), (4, 5));

        let empty_line = document
            .elements()
            .find(|node| node.id() == Some("TST:Line:2"))
            .unwrap();
        assert_eq!(empty_line.line(), 7);
    }

    #[test]
    fn test_text_is_unescaped() {
        let document = Document::parse(SAMPLE.as_bytes()).unwrap();
        let name = document
            .elements()
            .find(|node| node.local_name() == "Name")
            .unwrap();
        assert_eq!(name.text(), "Express & more");
        assert_eq!(name.nearest_id(), Some("TST:Line:1"));
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let document = Document::parse(SAMPLE.as_bytes()).unwrap();
        let name = document
            .elements()
            .find(|node| node.local_name() == "Name")
            .unwrap();
        let ancestors: Vec<_> = name.ancestors().map(|node| node.local_name()).collect();
        assert_eq!(ancestors, vec!["Line", "dataObjects", "PublicationDelivery"]);

        let root = document.root_element().unwrap();
        let descendants: Vec<_> = root
            .descendants()
            .iter()
            .map(|node| node.local_name())
            .collect();
        assert_eq!(descendants, vec!["dataObjects", "Line", "Name", "Line"]);
    }

    #[test]
    fn test_malformed_document() {
        let result = Document::parse(b"<a><b></a>");
        assert!(matches!(result, Err(DocumentError::Malformed { .. })));

        let result = Document::parse(b"<a><b>");
        assert!(matches!(result, Err(DocumentError::Malformed { .. })));

        let result = Document::parse(b"   ");
        assert!(matches!(result, Err(DocumentError::MissingRoot)));
    }
}
