//! Error types for the synchronization engine.

use std::path::PathBuf;

/// Errors that can occur while diffing, planning or applying merge tokens.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Malformed input: a descriptor or config is missing a required field.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A join references a table that is not part of its own model.
    #[error("Join '{join}' references table '{table}' which doesn't exist")]
    DanglingJoin {
        /// Signature or description of the join.
        join: String,
        /// The table that could not be resolved.
        table: String,
    },

    /// A join references a column that is not part of the resolved table.
    #[error("Column '{column}' not found in table '{table}'")]
    UnresolvedAttribute {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A token could not be applied to the in-memory model.
    #[error("Invalid model state: {0}")]
    InvalidState(String),

    /// The dialect cannot render a token.
    #[error("Operation '{operation}' is not supported by the {dialect} dialect")]
    UnsupportedOperation {
        /// Dialect name.
        dialect: String,
        /// Description of the token.
        operation: String,
    },

    /// XML read or write failure.
    #[error("XML error: {0}")]
    Xml(String),

    /// Database error during introspection or DDL execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading model, filter or join files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be parsed.
    #[error("Failed to parse '{path}': {message}")]
    ParseError {
        /// Path to the file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inclusion pattern is not a valid regular expression.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl SyncError {
    /// Shorthand for a [`SyncError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for a [`SyncError::InvalidState`] error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
