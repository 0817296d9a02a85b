//! Error types for fx-extract

use fx_core::CoreError;
use fx_db::DbError;
use thiserror::Error;

/// Extraction engine errors
#[derive(Error, Debug)]
pub enum ExtractError {
    /// X001: Core model error
    #[error("[X001] {0}")]
    Core(#[from] CoreError),

    /// X002: Database error
    #[error("[X002] {0}")]
    Db(#[from] DbError),

    /// X003: CSV read/write failure
    #[error("[X003] CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// X004: File access failure
    #[error("[X004] Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// X005: No key columns to batch on
    #[error("[X005] Table {table} has no usable key columns")]
    MissingKey { table: String },

    /// X006: A named column is absent from the query result
    #[error("[X006] Column '{column}' not present in result for {table}")]
    ColumnMismatch { table: String, column: String },
}

/// Result type alias for ExtractError
pub type ExtractResult<T> = Result<T, ExtractError>;
