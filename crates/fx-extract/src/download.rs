//! Bulk and structured download entry points.
//!
//! Bulk downloads walk a flat table list; structured downloads resolve a
//! dependency tree and follow its edges, fetching parent rows by primary
//! key and referencing rows by their FK columns. Both share one
//! [`ExecutionContext`] for row accounting and the global row budget.

use crate::context::{DownloadMode, ExecutionContext};
use crate::downloader::TableDownloader;
use crate::error::{ExtractError, ExtractResult};
use crate::executor::TableExecutor;
use crate::resolver::resolve;
use async_recursion::async_recursion;
use fx_core::{decode_cell, Dependency, QueryFilter, Table, TableName, Value};
use fx_db::{quote_ident, Catalog, QueryResult};
use std::collections::HashSet;
use std::path::Path;

/// Download each table of a flat list in full.
///
/// Tables already seen by this context are skipped, so a request that
/// names the same table twice downloads it once.
pub async fn download_bulk(
    catalog: &dyn Catalog,
    root: &Path,
    dataset: &str,
    tables: &[TableName],
    ctx: &mut ExecutionContext,
) -> ExtractResult<()> {
    for name in tables {
        if !ctx.keep_running() {
            break;
        }
        if !ctx.mark_seen(name) {
            log::debug!("{} already downloaded by this request", name.qualified_name());
            continue;
        }
        let table = catalog.table(name).await?;
        let sql = format!("SELECT * FROM {}", catalog.sql_name(name));
        let mut result = catalog.query(&sql, &[]).await?;
        let take = ctx.take_budget(name, result.rows.len());
        result.rows.truncate(take);
        write_node_rows(root, dataset, &table, result, ctx)?;
    }
    Ok(())
}

/// Resolve `dependency` and download every selected node of the resolved
/// tree, rooted at the filtered root-table rows. Returns the resolved tree
/// so callers can display or re-submit it.
pub async fn download_structured(
    catalog: &dyn Catalog,
    root: &Path,
    dataset: &str,
    dependency: Dependency,
    ctx: &mut ExecutionContext,
) -> ExtractResult<Dependency> {
    let resolved = resolve(catalog, dependency).await?;
    let table = catalog.table(resolved.table()).await?;
    let (sql, params) = root_select(catalog, &table, resolved.filters())?;
    let result = catalog.query(&sql, &params).await?;
    walk_node(catalog, root, dataset, &resolved, result, ctx).await?;
    Ok(resolved)
}

#[async_recursion]
async fn walk_node(
    catalog: &dyn Catalog,
    root: &Path,
    dataset: &str,
    node: &Dependency,
    result: QueryResult,
    ctx: &mut ExecutionContext,
) -> ExtractResult<()> {
    let table = catalog.table(node.table()).await?;
    ctx.mark_seen(node.table());
    let columns = result.columns;
    let mut rows = result.rows;
    let take = ctx.take_budget(node.table(), rows.len());
    rows.truncate(take);
    write_node_rows(
        root,
        dataset,
        &table,
        QueryResult {
            columns: columns.clone(),
            rows: rows.clone(),
        },
        ctx,
    )?;

    for child in node.dependencies() {
        if !ctx.keep_running() {
            break;
        }
        if !child.selected() {
            continue;
        }
        let Some(constraint) = child.constraint_name() else {
            continue;
        };

        // The edge's FK decides which columns feed the child fetch: parent
        // edges follow this table's FK values to the parent's key, child
        // edges follow this table's key to the referencing FK columns.
        let fk = if child.mandatory() {
            table
                .foreign_keys()
                .iter()
                .find(|fk| fk.name() == constraint)
                .cloned()
        } else {
            catalog
                .referencing_foreign_keys(node.table())
                .await?
                .into_iter()
                .find(|fk| fk.name() == constraint)
        };
        let Some(fk) = fk else {
            log::warn!(
                "Constraint {constraint} vanished from the schema; skipping {}",
                child.table().qualified_name()
            );
            continue;
        };
        let (source_columns, target_columns) = if child.mandatory() {
            (fk.fk_columns(), fk.pk_columns().to_vec())
        } else {
            (fk.pk_columns(), fk.fk_columns().to_vec())
        };

        let tuples = key_tuples(node.table(), &columns, &rows, source_columns)?;
        let mut child_result = QueryResult::default();
        if !tuples.is_empty() {
            let child_table = catalog.table(child.table()).await?;
            let executor = TableExecutor::by_columns(catalog, &child_table, target_columns)?;
            executor
                .fetch(&tuples, |fetched_columns, row| {
                    if child_result.columns.is_empty() {
                        child_result.columns = fetched_columns.to_vec();
                    }
                    child_result.rows.push(row);
                    Ok(())
                })
                .await?;
            apply_filters(child.table(), &mut child_result, child.filters())?;
        }
        walk_node(catalog, root, dataset, child, child_result, ctx).await?;
    }
    Ok(())
}

fn write_node_rows(
    root: &Path,
    dataset: &str,
    table: &Table,
    result: QueryResult,
    ctx: &mut ExecutionContext,
) -> ExtractResult<()> {
    if result.columns.is_empty() {
        // Nothing fetched and no metadata to write a header from.
        return Ok(());
    }
    let mut downloader = TableDownloader::open(root, dataset, table, ctx.mode())?;
    let kept = downloader.write(&result.columns, &result.rows)?;
    downloader.finish()?;
    ctx.record_rows(table.name(), kept);
    Ok(())
}

fn root_select(
    catalog: &dyn Catalog,
    table: &Table,
    filters: &[QueryFilter],
) -> ExtractResult<(String, Vec<Value>)> {
    let mut sql = format!("SELECT * FROM {}", catalog.sql_name(table.name()));
    let mut params = Vec::with_capacity(filters.len());
    if !filters.is_empty() {
        let clauses: Vec<String> = filters
            .iter()
            .map(|f| format!("{} = ?", quote_ident(f.column())))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        for filter in filters {
            let value = match table.column(filter.column()) {
                Some(column) => decode_cell(column, filter.value())?,
                None => Value::Text(filter.value().to_string()),
            };
            params.push(value);
        }
    }
    Ok((sql, params))
}

/// Distinct, NULL-free key tuples taken from `rows` at `key_columns`.
fn key_tuples(
    table: &TableName,
    columns: &[fx_db::SelectedColumn],
    rows: &[Vec<Value>],
    key_columns: &[String],
) -> ExtractResult<Vec<Vec<Value>>> {
    let positions: Vec<usize> = key_columns
        .iter()
        .map(|key| {
            columns
                .iter()
                .position(|c| c.name == *key)
                .ok_or_else(|| ExtractError::ColumnMismatch {
                    table: table.qualified_name(),
                    column: key.clone(),
                })
        })
        .collect::<ExtractResult<_>>()?;

    let mut seen = HashSet::new();
    let mut tuples = Vec::new();
    for row in rows {
        let tuple: Vec<Value> = positions.iter().map(|p| row[*p].clone()).collect();
        if tuple.iter().any(Value::is_null) {
            continue;
        }
        let digest = tuple
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        if seen.insert(digest) {
            tuples.push(tuple);
        }
    }
    Ok(tuples)
}

fn apply_filters(
    table: &TableName,
    result: &mut QueryResult,
    filters: &[QueryFilter],
) -> ExtractResult<()> {
    if filters.is_empty() || result.columns.is_empty() {
        return Ok(());
    }
    let positions: Vec<(usize, &str)> = filters
        .iter()
        .map(|f| {
            result
                .columns
                .iter()
                .position(|c| c.name == f.column())
                .map(|p| (p, f.value()))
                .ok_or_else(|| ExtractError::ColumnMismatch {
                    table: table.qualified_name(),
                    column: f.column().to_string(),
                })
        })
        .collect::<ExtractResult<_>>()?;
    result
        .rows
        .retain(|row| positions.iter().all(|(p, v)| row[*p].to_string() == *v));
    Ok(())
}

#[cfg(test)]
#[path = "download_test.rs"]
mod download_test;
