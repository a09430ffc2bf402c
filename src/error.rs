//! Error types for session assembly and data movement
//!
//! Every variant names the source (or destination) it concerns so a failure
//! in a multi-source configuration can be traced without reading logs.

use crate::engine::EngineError;
use crate::models::directive::DirectiveKind;

/// Error type for quackpipe operations
#[derive(Debug, thiserror::Error)]
pub enum QuackError {
    /// No handler is registered for the source's kind
    #[error("Unknown source type '{kind}' for source '{source_name}'")]
    UnknownSourceType { source_name: String, kind: String },

    /// Malformed or contradictory source descriptor
    #[error("Invalid configuration for source '{source_name}': {message}")]
    InvalidSourceConfig {
        source_name: String,
        message: String,
    },

    /// Two or more descriptors share a name
    #[error("Duplicate source names: {}", names.join(", "))]
    DuplicateSourceName { names: Vec<String> },

    /// The secret provider has no bundle with this name
    #[error("Secret bundle '{bundle}' for source '{source_name}' not found")]
    SecretNotFound { source_name: String, bundle: String },

    /// The secret provider failed while resolving a bundle
    #[error("Secret provider failed for bundle '{bundle}' of source '{source_name}': {message}")]
    SecretProvider {
        source_name: String,
        bundle: String,
        message: String,
    },

    /// A move targeted a destination configured as read-only
    #[error("Cannot write to destination '{destination}' because it is configured as read-only")]
    ReadOnlyDestination { destination: String },

    /// The destination cannot honour the requested write mode
    #[error("Destination '{destination}' does not support {mode} mode")]
    UnsupportedMode { destination: String, mode: String },

    /// Query result columns do not match the destination table
    #[error(
        "Schema mismatch writing to '{destination}.{table}': missing columns [{}], unexpected columns [{}]",
        missing.join(", "),
        unexpected.join(", ")
    )]
    SchemaMismatch {
        destination: String,
        table: String,
        /// Destination columns absent from the query result
        missing: Vec<String>,
        /// Query result columns absent from the destination
        unexpected: Vec<String>,
    },

    /// The engine rejected a directive while a session was being assembled
    #[error("Failed to execute {directive} directive for source '{source_name}': {message}")]
    DirectiveExecution {
        source_name: String,
        directive: DirectiveKind,
        message: String,
    },

    /// A source referenced by name is not configured
    #[error("Source '{name}' not found in the provided configuration")]
    SourceNotFound { name: String },

    /// A session was requested without any sources
    #[error("Cannot build a session with no sources defined")]
    NoSources,

    /// Configuration document could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Engine failure outside session assembly
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl QuackError {
    /// Shorthand for [`QuackError::InvalidSourceConfig`]
    pub fn invalid(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        QuackError::InvalidSourceConfig {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Name of the source the error concerns, when there is exactly one
    pub fn source_name(&self) -> Option<&str> {
        match self {
            QuackError::UnknownSourceType { source_name, .. }
            | QuackError::InvalidSourceConfig { source_name, .. }
            | QuackError::SecretNotFound { source_name, .. }
            | QuackError::SecretProvider { source_name, .. }
            | QuackError::DirectiveExecution { source_name, .. } => Some(source_name),
            QuackError::ReadOnlyDestination { destination }
            | QuackError::UnsupportedMode { destination, .. }
            | QuackError::SchemaMismatch { destination, .. } => Some(destination),
            QuackError::SourceNotFound { name } => Some(name),
            _ => None,
        }
    }
}

/// Result type for quackpipe operations
pub type QuackResult<T> = Result<T, QuackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_message() {
        let err = QuackError::DuplicateSourceName {
            names: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Duplicate source names: a, b");
        assert!(err.source_name().is_none());
    }

    #[test]
    fn test_directive_execution_message() {
        let err = QuackError::DirectiveExecution {
            source_name: "pg".to_string(),
            directive: DirectiveKind::Attach,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to execute attach directive for source 'pg': connection refused"
        );
        assert_eq!(err.source_name(), Some("pg"));
    }
}
