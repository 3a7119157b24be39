//! Document query capability: parsing bytes into a node tree and selecting
//! nodes with compiled path queries.

pub mod document;
pub mod query;

pub use document::{Document, Node};
pub use query::NodePath;
