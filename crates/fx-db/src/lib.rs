//! fx-db - Database catalog capability for fixflow
//!
//! This crate provides the `Catalog` trait consumed by the extraction and
//! population engines, plus SQLite and DuckDB implementations.

pub mod duckdb;
pub mod error;
pub mod sqlite;
pub mod traits;

pub use duckdb::DuckDbCatalog;
pub use error::{DbError, DbResult};
pub use sqlite::SqliteCatalog;
pub use traits::{
    quote_ident, Catalog, QueryResult, SelectedColumn, DEFAULT_MAX_BOUND_PARAMETERS,
};

use fx_core::DbEngine;

/// Open a catalog for the configured engine.
pub fn connect(engine: DbEngine, path: &str) -> DbResult<Box<dyn Catalog>> {
    Ok(match engine {
        DbEngine::Sqlite => Box::new(SqliteCatalog::new(path)?),
        DbEngine::Duckdb => Box::new(DuckDbCatalog::new(path)?),
    })
}
