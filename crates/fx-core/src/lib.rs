//! fx-core - Core library for fixflow
//!
//! This crate provides the shared types used across all fixflow components:
//! the table/schema model, the row value codec, the dataset/fixture model,
//! the dependency tree, and project configuration.

pub mod config;
pub mod dataset;
pub mod dependency;
pub mod error;
pub mod schema;
pub mod table_name;
pub mod value;

pub use config::{Config, DatabaseConfig, DbEngine, DownloadConfig, PopulateConfig};
pub use dataset::{
    compare_dataset_names, DataFile, Dataset, Datasets, BASE_DATASET, STATIC_DATASET,
};
pub use dependency::{Dependency, QueryFilter};
pub use error::{cause_chain, CoreError, CoreResult};
pub use schema::{Column, ColumnType, ForeignKey, Index, Table};
pub use table_name::TableName;
pub use value::{
    decode_cell, encode_cell, header_name, parse_header_name, Value, BINARY_HEADER_SUFFIX,
    MAX_CELL_BYTES,
};
