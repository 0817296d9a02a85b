//! Primary-key-batched SELECT execution.
//!
//! One fixed-shape prepared statement is built per table: `batch_size`
//! OR-joined `(k1 = ? AND k2 = ?)` groups. Every chunk binds the same
//! statement; the final short chunk pads the leftover placeholder groups
//! by re-binding the chunk's first tuple, so the statement shape never
//! changes and a repeated predicate cannot match a row the chunk did not
//! already select.

use crate::error::{ExtractError, ExtractResult};
use fx_core::{Table, Value};
use fx_db::{quote_ident, Catalog, SelectedColumn};

/// Executes batched key-tuple lookups against one table.
pub struct TableExecutor<'a> {
    catalog: &'a dyn Catalog,
    key_columns: Vec<String>,
    batch_size: usize,
    sql: String,
}

impl std::fmt::Debug for TableExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableExecutor")
            .field("key_columns", &self.key_columns)
            .field("batch_size", &self.batch_size)
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

impl<'a> TableExecutor<'a> {
    /// Batch on the table's primary key, sized by the catalog's
    /// bound-parameter limit.
    pub fn by_primary_key(catalog: &'a dyn Catalog, table: &'a Table) -> ExtractResult<Self> {
        let key_columns = table.primary_key_columns();
        Self::new(catalog, table, key_columns, catalog.max_bound_parameters())
    }

    /// Batch on an explicit key column list (used when fetching
    /// referencing rows by their FK columns).
    pub fn by_columns(
        catalog: &'a dyn Catalog,
        table: &'a Table,
        key_columns: Vec<String>,
    ) -> ExtractResult<Self> {
        let limit = catalog.max_bound_parameters();
        Self::new(catalog, table, key_columns, limit)
    }

    /// Full constructor with an explicit bound-parameter limit.
    pub fn new(
        catalog: &'a dyn Catalog,
        table: &'a Table,
        key_columns: Vec<String>,
        max_bound_parameters: usize,
    ) -> ExtractResult<Self> {
        if key_columns.is_empty() {
            return Err(ExtractError::MissingKey {
                table: table.name().qualified_name(),
            });
        }
        let batch_size = (max_bound_parameters / key_columns.len()).max(1);
        let sql = build_select(catalog, table, &key_columns, batch_size);
        Ok(Self {
            catalog,
            key_columns,
            batch_size,
            sql,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Fetch every row matching one of `keys`, invoking `on_row` with the
    /// result metadata and each row. Returns the number of rows fetched.
    ///
    /// Batches run sequentially; `keys` are assumed deduplicated by the
    /// caller.
    pub async fn fetch<F>(&self, keys: &[Vec<Value>], mut on_row: F) -> ExtractResult<usize>
    where
        F: FnMut(&[SelectedColumn], Vec<Value>) -> ExtractResult<()>,
    {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut fetched = 0;
        for chunk in keys.chunks(self.batch_size) {
            let mut params = Vec::with_capacity(self.batch_size * self.key_columns.len());
            for tuple in chunk {
                params.extend(tuple.iter().cloned());
            }
            for _ in chunk.len()..self.batch_size {
                params.extend(chunk[0].iter().cloned());
            }
            let result = self.catalog.query(&self.sql, &params).await?;
            for row in result.rows {
                fetched += 1;
                on_row(&result.columns, row)?;
            }
        }
        Ok(fetched)
    }
}

fn build_select(
    catalog: &dyn Catalog,
    table: &Table,
    key_columns: &[String],
    batch_size: usize,
) -> String {
    let group = format!(
        "({})",
        key_columns
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" AND ")
    );
    let predicate = vec![group; batch_size].join(" OR ");
    format!(
        "SELECT * FROM {} WHERE {}",
        catalog.sql_name(table.name()),
        predicate
    )
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod executor_test;
