//! Extract command implementation

use crate::cli::{ExtractArgs, GlobalArgs};
use crate::commands::common::{load_context, parse_filter, parse_table_name};
use anyhow::{bail, Result};
use fx_core::Dependency;
use fx_db::Catalog;
use fx_extract::{download_bulk, download_structured, DownloadMode, ExecutionContext};

/// Execute the extract command
pub async fn execute(args: &ExtractArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = load_context(global)?;
    let namespace = ctx.catalog.default_namespace();

    let tables = args
        .tables
        .iter()
        .map(|raw| parse_table_name(&namespace, raw))
        .collect::<Result<Vec<_>>>()?;

    if !args.filters.is_empty() && !args.structured {
        bail!("--filter requires --structured");
    }
    if args.structured && tables.len() != 1 {
        bail!("--structured takes exactly one root --table");
    }

    let mode = if args.count {
        DownloadMode::Count
    } else {
        DownloadMode::Save
    };
    let max_rows = args.max_rows.unwrap_or(ctx.config.download.max_rows);
    let mut execution = ExecutionContext::new(mode, Some(max_rows));

    if args.structured {
        let filters = args
            .filters
            .iter()
            .map(|raw| parse_filter(raw))
            .collect::<Result<Vec<_>>>()?;
        let root = Dependency::root(tables[0].clone()).with_filters(filters);
        download_structured(
            ctx.catalog.as_ref(),
            &ctx.fixture_root,
            &args.dataset,
            root,
            &mut execution,
        )
        .await?;
    } else {
        download_bulk(
            ctx.catalog.as_ref(),
            &ctx.fixture_root,
            &args.dataset,
            &tables,
            &mut execution,
        )
        .await?;
    }

    let summary = execution.summary();
    let mut total = 0;
    for (table, rows) in &summary.row_counts {
        let skipped = summary.rows_skipped.get(table).copied().unwrap_or(0);
        if skipped > 0 {
            println!("  {} {rows} rows ({skipped} skipped)", table.qualified_name());
        } else {
            println!("  {} {rows} rows", table.qualified_name());
        }
        total += rows;
    }
    match mode {
        DownloadMode::Count => {
            println!("\nWould extract {total} rows into dataset '{}'", args.dataset)
        }
        DownloadMode::Save => {
            println!("\nExtracted {total} rows into dataset '{}'", args.dataset)
        }
    }
    if summary.max_rows_reached {
        println!("Row budget of {max_rows} reached; raise --max-rows to fetch more.");
    }
    Ok(())
}
