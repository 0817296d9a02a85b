//! Error types for fx-populate

use fx_core::CoreError;
use fx_db::DbError;
use thiserror::Error;

/// Population engine errors
#[derive(Error, Debug)]
pub enum PopulateError {
    /// P001: Core model error (includes missing-table validation)
    #[error("[P001] {0}")]
    Core(#[from] CoreError),

    /// P002: Database error
    #[error("[P002] {0}")]
    Db(#[from] DbError),

    /// P003: CSV parse failure
    #[error("[P003] CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// P004: Wraps a failure loading one dataset, naming dataset and file
    #[error("[P004] Failed to load dataset '{dataset}' from {file}")]
    DatasetLoad {
        dataset: String,
        file: String,
        #[source]
        source: Box<PopulateError>,
    },

    /// P005: A CSV header column missing from the target table
    #[error("[P005] Column '{column}' in {file} does not exist on table {table}")]
    UnknownColumn {
        column: String,
        file: String,
        table: String,
    },

    /// P006: A data file's table vanished between validation and insert
    #[error("[P006] No snapshot for table {table}")]
    TableNotLoaded { table: String },
}

/// Result type alias for PopulateError
pub type PopulateResult<T> = Result<T, PopulateError>;
