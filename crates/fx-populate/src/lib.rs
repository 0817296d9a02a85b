//! fx-populate - Population engine for fixflow
//!
//! Loads named datasets of per-table CSV files into a target database
//! inside a single transaction, bypassing constraint violations caused by
//! partial or ordered loads through a vendor preparation strategy.

pub mod error;
pub mod populator;
pub mod strategy;

pub use error::{PopulateError, PopulateResult};
pub use populator::Populator;
pub use strategy::{
    select_strategy, DisableConstraintsStrategy, DropRecreateStrategy, PreparationStrategy,
};
