//! Validate command implementation

use crate::cli::{GlobalArgs, ValidateArgs};
use crate::commands::common::load_context;
use anyhow::{Context, Result};
use fx_core::{Datasets, TableName};
use fx_db::Catalog;
use std::collections::BTreeSet;

/// Execute the validate command
pub async fn execute(args: &ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = load_context(global)?;
    let datasets = Datasets::scan(&ctx.fixture_root)
        .with_context(|| format!("Failed to scan {}", ctx.fixture_root.display()))?;

    let names: Vec<&str> = if args.datasets.is_empty() {
        datasets.all().iter().map(|d| d.name()).collect()
    } else {
        args.datasets.iter().map(String::as_str).collect()
    };

    // One catalog lookup per namespace the datasets reference.
    let mut namespaces = BTreeSet::new();
    for name in &names {
        if let Some(dataset) = datasets.get(name) {
            for file in dataset.files() {
                namespaces.insert((
                    file.table().catalog().to_string(),
                    file.table().schema().to_string(),
                ));
            }
        }
    }
    let mut known: BTreeSet<TableName> = BTreeSet::new();
    for (catalog, schema) in namespaces {
        known.extend(ctx.catalog.table_names(&catalog, &schema).await?);
    }

    datasets.validate_all_tables_exist(&names, &known)?;
    println!("✓ {} dataset(s) valid against the live catalog", names.len());
    Ok(())
}
