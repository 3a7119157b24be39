//! Identifier and source-location value types.
//!
//! NeTEx entities are identified by colon-delimited strings of the form
//! `codespace:Type:localId`. An [`IdVersion`] is one occurrence of such an id
//! (a declaration or a reference) in a file; its identity is the `(id, version)`
//! pair alone.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Position of a diagnostic in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataLocation {
    pub object_id: Option<String>,
    pub filename: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl DataLocation {
    pub fn new(
        object_id: Option<String>,
        filename: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            object_id,
            filename: filename.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Location covering a whole file
    pub fn file(filename: impl Into<String>) -> Self {
        Self {
            object_id: None,
            filename: filename.into(),
            line: None,
            column: None,
        }
    }
}

/// One occurrence of a NeTEx id, either declared (`id` attribute) or
/// referenced (`ref` attribute of a `*Ref` element).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdVersion {
    pub id: String,
    pub version: Option<String>,
    pub element_name: String,
    /// Ancestor element names, nearest first
    pub parent_element_names: Vec<String>,
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl IdVersion {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            id: id.into(),
            version,
            element_name: String::new(),
            parent_element_names: Vec::new(),
            filename: String::new(),
            line: 0,
            column: 0,
        }
    }

    pub fn with_element(
        mut self,
        element_name: impl Into<String>,
        parent_element_names: Vec<String>,
    ) -> Self {
        self.element_name = element_name.into();
        self.parent_element_names = parent_element_names;
        self
    }

    pub fn with_location(mut self, filename: impl Into<String>, line: u32, column: u32) -> Self {
        self.filename = filename.into();
        self.line = line;
        self.column = column;
        self
    }

    /// Nearest ancestor that is a NeTEx entity rather than a collection wrapper.
    ///
    /// NeTEx collections (`journeys`, `members`, ...) are lower camel case while
    /// entities are upper camel case.
    pub fn nearest_entity_ancestor(&self) -> Option<&str> {
        self.parent_element_names
            .iter()
            .map(String::as_str)
            .find(|name| name.starts_with(|c: char| c.is_ascii_uppercase()))
    }

    pub fn location(&self) -> DataLocation {
        DataLocation::new(Some(self.id.clone()), &self.filename, self.line, self.column)
    }
}

impl PartialEq for IdVersion {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for IdVersion {}

impl Hash for IdVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for IdVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} (version {})", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Structured view of a `codespace:Type:localId` string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetexId<'a> {
    pub codespace: &'a str,
    pub entity_type: &'a str,
    pub local_id: &'a str,
}

impl<'a> NetexId<'a> {
    pub const SEPARATOR: char = ':';

    /// Split an id into its three segments; `None` unless there are exactly three.
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut segments = id.split(Self::SEPARATOR);
        let codespace = segments.next()?;
        let entity_type = segments.next()?;
        let local_id = segments.next()?;
        if segments.next().is_some() {
            return None;
        }
        Some(Self {
            codespace,
            entity_type,
            local_id,
        })
    }

    /// Entity type segment of an id, if the id is well-formed
    pub fn entity_type_of(id: &'a str) -> Option<&'a str> {
        Self::parse(id).map(|netex_id| netex_id.entity_type)
    }
}
