//! Ls command implementation

use crate::cli::{GlobalArgs, LsArgs};
use crate::commands::common::load_context;
use anyhow::{Context, Result};
use fx_core::{DataFile, Datasets};

/// Execute the ls command
pub async fn execute(_args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = load_context(global)?;
    let datasets = Datasets::scan(&ctx.fixture_root)
        .with_context(|| format!("Failed to scan {}", ctx.fixture_root.display()))?;

    for dataset in datasets.all() {
        if dataset.is_empty() {
            println!("{} (empty)", dataset.name());
            continue;
        }
        println!("{}", dataset.name());
        for file in dataset.files() {
            match data_rows(file) {
                Ok(rows) => println!("  {} ({rows} rows)", file.table().qualified_name()),
                Err(e) => println!("  {} (unreadable: {e})", file.table().qualified_name()),
            }
        }
    }
    Ok(())
}

fn data_rows(file: &DataFile) -> Result<usize> {
    let mut reader = csv::Reader::from_path(file.path())?;
    let mut rows = 0;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(rows)
}
