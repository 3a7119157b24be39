use std::path::PathBuf;

use thiserror::Error;

/// Main error type for everything that is not a data diagnostic.
///
/// Rule violations never surface here: they are collected as report entries.
/// An `Err` means the validation run itself could not be carried out.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("Rule catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema gate error: {details}")]
    SchemaGate { details: String },

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while turning bytes into a navigable document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Malformed XML at line {line}, column {column}: {details}")]
    Malformed {
        line: u32,
        column: u32,
        details: String,
    },

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Unbalanced end tag </{name}> at line {line}")]
    UnbalancedEndTag { name: String, line: u32 },
}

impl DocumentError {
    /// Source position of the failure, when known
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            DocumentError::Malformed { line, column, .. } => Some((*line, *column)),
            DocumentError::UnbalancedEndTag { line, .. } => Some((*line, 1)),
            DocumentError::MissingRoot => None,
        }
    }
}

/// Errors raised while compiling a node query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Empty query")]
    Empty,

    #[error("Invalid query '{query}' at offset {offset}: {details}")]
    Syntax {
        query: String,
        offset: usize,
        details: String,
    },
}

/// Programming or sequencing errors between the core and its collaborators.
///
/// These are never retried and never reported as diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("Common data has not been collected for report {report_id}")]
    CommonDataNotCollected { report_id: String },

    #[error("Cannot decode cached value '{value}': {details}")]
    Decode { value: String, details: String },

    #[error("Rule tree build failed for '{tree}': {details}")]
    TreeBuild { tree: String, details: String },
}

/// Errors raised while loading a rule catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read rule catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule catalog format: {0}")]
    Format(#[from] toml::de::Error),

    #[error("Invalid rule code '{code}'")]
    InvalidCode { code: String },

    #[error("Invalid severity '{value}' for rule {code}")]
    InvalidSeverity { code: String, value: String },

    #[error("Invalid query for rule {code}: {source}")]
    InvalidQuery {
        code: String,
        #[source]
        source: QueryError,
    },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// LibXML2-specific error types for the XSD gate
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: null pointer returned")]
    SchemaParseFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("File validation failed with code {code}: {file}")]
    ValidationFailed { code: i32, file: PathBuf },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Schema validation internal error: {details}")]
    InternalError { details: String },
}

impl From<ConfigError> for ValidationError {
    fn from(err: ConfigError) -> Self {
        ValidationError::Config(err.to_string())
    }
}

impl From<LibXml2Error> for ValidationError {
    fn from(err: LibXml2Error) -> Self {
        ValidationError::SchemaGate {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Integration result type alias
pub type IntegrationResult<T> = std::result::Result<T, IntegrationError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
