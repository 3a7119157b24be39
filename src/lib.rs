//! # netex-validator
//!
//! Validation of NeTEx datasets: a configurable rule tree evaluated per file,
//! id uniqueness and reference resolution across the files of a dataset, and
//! an orchestrator that validates shared (common) files before line files.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod dataset;
pub mod entry_factory;
pub mod error;
pub mod extract;
pub mod file_discovery;
pub mod id;
#[cfg(feature = "xsd")]
pub mod libxml2;
pub mod logging;
pub mod model;
pub mod output;
pub mod report;
pub mod repository;
pub mod runner;
pub mod tree;
pub mod validators;
pub mod xml;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use context::XmlValidationContext;
pub use dataset::{DatasetConfig, DatasetFile, DatasetResults, DatasetValidator};
pub use error::{IntegrationError, ValidationError};
pub use file_discovery::FileDiscovery;
pub use id::{DataLocation, IdVersion};
pub use output::Output;
pub use report::{Severity, ValidationIssue, ValidationReport, ValidationReportEntry, ValidationRule};
pub use repository::{CommonDataRepository, NetexIdRepository};
pub use runner::{NetexValidatorsRunner, ValidationOptions};
pub use tree::{ValidationTree, ValidationTreeBuilder};
