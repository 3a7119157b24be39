//! Per-file validation context and the node-scoped view used by rule trees.

use crate::id::{DataLocation, IdVersion};
use crate::model::NetexEntitiesIndex;
use crate::xml::{Document, Node};

/// Everything validators know about the file being validated
#[derive(Debug)]
pub struct XmlValidationContext {
    pub codespace: String,
    pub report_id: String,
    pub filename: String,
    pub document: Document,
    pub local_ids: Vec<IdVersion>,
    pub local_refs: Vec<IdVersion>,
    pub index: NetexEntitiesIndex,
    common_file: bool,
}

impl XmlValidationContext {
    pub fn new(
        codespace: impl Into<String>,
        report_id: impl Into<String>,
        filename: impl Into<String>,
        document: Document,
        common_file: bool,
    ) -> Self {
        let index = NetexEntitiesIndex::from_document(&document);
        Self {
            codespace: codespace.into(),
            report_id: report_id.into(),
            filename: filename.into(),
            document,
            local_ids: Vec::new(),
            local_refs: Vec::new(),
            index,
            common_file,
        }
    }

    pub fn with_ids(mut self, local_ids: Vec<IdVersion>, local_refs: Vec<IdVersion>) -> Self {
        self.local_ids = local_ids;
        self.local_refs = local_refs;
        self
    }

    pub fn is_common_file(&self) -> bool {
        self.common_file
    }

    /// Context for the rule tree, positioned at the document node
    pub fn tree_context(&self) -> TreeContext<'_> {
        TreeContext {
            node: self.document.document_node(),
            file: self,
        }
    }

    pub fn location_of(&self, node: Node<'_>) -> DataLocation {
        DataLocation::new(
            node.nearest_id().map(str::to_string),
            &self.filename,
            node.line(),
            node.column(),
        )
    }
}

/// The file context re-scoped to one node of its document
#[derive(Debug, Clone, Copy)]
pub struct TreeContext<'a> {
    pub node: Node<'a>,
    pub file: &'a XmlValidationContext,
}

impl<'a> TreeContext<'a> {
    pub fn at(&self, node: Node<'a>) -> TreeContext<'a> {
        TreeContext {
            node,
            file: self.file,
        }
    }

    pub fn is_common_file(&self) -> bool {
        self.file.is_common_file()
    }
}
