//! Error types for fx-core

use thiserror::Error;

/// Core error type for fixflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Fixture root directory not found
    #[error("[C001] Fixture directory not found: {path}")]
    FixtureRootNotFound { path: String },

    /// C002: IO error with file path context
    #[error("[C002] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C003: A data file that does not follow dataset/catalog/schema/table.csv
    #[error("[C003] Invalid data file location: {path}")]
    InvalidDataFilePath { path: String },

    /// C004: Configuration file not found
    #[error("[C004] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C005: Failed to parse configuration file
    #[error("[C005] Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// C006: A CSV cell that cannot be decoded for its target column
    #[error("[C006] Cannot decode cell for column '{column}': {message}")]
    CellDecode { column: String, message: String },

    /// C007: Dataset name not present in the fixture tree
    #[error("[C007] Dataset not found: {name}")]
    DatasetNotFound { name: String },

    /// C008: A dataset references a table missing from the target database
    #[error("[C008] Table {table} referenced by {file} does not exist in the target database")]
    MissingTable { table: String, file: String },

    /// C009: IO error
    #[error("[C009] IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Flatten an error and its `source()` chain into an ordered list of
/// human-readable messages, outermost first.
///
/// Used to surface nested failure context to a client without a full
/// stack trace.
pub fn cause_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages
}
