//! Load command implementation

use crate::cli::{GlobalArgs, LoadArgs};
use crate::commands::common::load_context;
use anyhow::{Context, Result};
use fx_core::{cause_chain, Datasets};
use fx_populate::Populator;

/// Execute the load command
pub async fn execute(args: &LoadArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = load_context(global)?;
    let datasets = Datasets::scan(&ctx.fixture_root)
        .with_context(|| format!("Failed to scan {}", ctx.fixture_root.display()))?;

    let names: Vec<&str> = args.datasets.iter().map(String::as_str).collect();
    let mut populator = Populator::new(ctx.catalog.as_ref(), datasets)
        .with_insert_batch_size(ctx.config.populate.insert_batch_size)
        .with_revalidation(ctx.config.populate.revalidate_constraints);

    match populator.load(&names).await {
        Ok(rows) => {
            println!("Loaded {rows} rows from {} dataset(s)", args.datasets.len());
            Ok(())
        }
        Err(e) => {
            // Surface the full cause chain as an ordered list instead of
            // a stack trace.
            for (depth, message) in cause_chain(&e).iter().enumerate() {
                eprintln!("{}{message}", "  ".repeat(depth));
            }
            // Exit code 4 = database load failure
            std::process::exit(4);
        }
    }
}
