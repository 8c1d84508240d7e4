//! Error types for reporting definitions and join resolution.

use std::path::PathBuf;

/// Join resolution failures. Both indicate a defect in the table
/// declarations, not in the user's query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinResolutionError {
    #[error("Dependency cycle detected at table '{table}'")]
    Cycle { table: String },

    #[error("Table '{table}' referenced by '{referenced_by}' is not declared")]
    UnknownTable { table: String, referenced_by: String },
}

/// Errors raised while building or loading a reporting definition.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Definition file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read definition file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse definition file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error(transparent)]
    Join(#[from] JoinResolutionError),
}

/// Errors raised while declaring an entry schema or casting row values.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("Invalid field pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Field '{field}' expects a number, got '{value}'")]
    InvalidNumber { field: String, value: String },
}
