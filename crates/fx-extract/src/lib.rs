//! fx-extract - Extraction engine for fixflow
//!
//! Selects rows from a source database, optionally following foreign-key
//! relationships outward from a root table, into per-table CSV files
//! grouped into named datasets.

pub mod context;
pub mod download;
pub mod downloader;
pub mod error;
pub mod executor;
pub mod resolver;
pub mod tracker;

pub use context::{DownloadMode, DownloadSummary, ExecutionContext};
pub use download::{download_bulk, download_structured};
pub use downloader::{DownloadOutcome, TableDownloader};
pub use error::{ExtractError, ExtractResult};
pub use executor::TableExecutor;
pub use resolver::resolve;
pub use tracker::PkTracker;
