//! Catalog capability trait.
//!
//! A [`Catalog`] wraps one live database connection and exposes the table
//! metadata plus the basic DML the transfer engine needs. The extraction
//! and population engines depend only on this trait; each engine backend
//! supplies the vendor-specific SQL.

use crate::error::DbResult;
use async_trait::async_trait;
use fx_core::{ColumnType, ForeignKey, Index, Table, TableName, Value};

/// Default driver bound-parameter limit used for batch sizing.
pub const DEFAULT_MAX_BOUND_PARAMETERS: usize = 2000;

/// One column of a query result, introspected once from statement metadata
/// and reused for every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub position: usize,
    pub name: String,
    pub column_type: ColumnType,
    pub binary: bool,
}

impl SelectedColumn {
    pub fn new(position: usize, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            position,
            name: name.into(),
            column_type,
            binary: column_type == ColumnType::Binary,
        }
    }
}

/// A fully-materialized query result.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<SelectedColumn>,
    pub rows: Vec<Vec<Value>>,
}

/// Vendor capability for one database connection.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Engine identifier for logging
    fn engine(&self) -> &'static str;

    /// Driver bound-parameter limit, used by the batched table executor
    fn max_bound_parameters(&self) -> usize {
        DEFAULT_MAX_BOUND_PARAMETERS
    }

    /// Whether the engine can toggle FK validation without dropping
    /// constraints. Selects the population preparation strategy.
    fn supports_constraint_toggle(&self) -> bool;

    /// Whether the engine requires an explicit identity-insert mode to
    /// accept values for auto-increment columns.
    fn supports_identity_insert(&self) -> bool {
        false
    }

    /// All base table names in one catalog/schema
    async fn table_names(&self, catalog: &str, schema: &str) -> DbResult<Vec<TableName>>;

    /// Snapshot one table's structure
    async fn table(&self, name: &TableName) -> DbResult<Table>;

    /// Snapshot several tables
    async fn tables(&self, names: &[TableName]) -> DbResult<Vec<Table>> {
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tables.push(self.table(name).await?);
        }
        Ok(tables)
    }

    /// Foreign keys on other tables whose parent side is `name`.
    ///
    /// The default implementation scans every table in the same
    /// catalog/schema; backends with a reverse-lookup query may override.
    async fn referencing_foreign_keys(&self, name: &TableName) -> DbResult<Vec<ForeignKey>> {
        let mut found = Vec::new();
        for other in self.table_names(name.catalog(), name.schema()).await? {
            let table = self.table(&other).await?;
            found.extend(
                table
                    .foreign_keys()
                    .iter()
                    .filter(|fk| fk.pk_table() == name)
                    .cloned(),
            );
        }
        Ok(found)
    }

    /// Execute a SELECT with bound parameters
    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult>;

    /// Execute SQL that modifies data or schema, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Insert rows through one prepared statement, returns inserted count
    async fn insert_rows(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> DbResult<usize>;

    async fn begin(&self) -> DbResult<()>;
    async fn commit(&self) -> DbResult<()>;
    async fn rollback(&self) -> DbResult<()>;

    /// Toggle validation of one foreign key.
    async fn set_constraint_enabled(&self, fk: &ForeignKey, enabled: bool) -> DbResult<()>;

    /// Re-validate one foreign key after it was re-enabled.
    async fn validate_constraint(&self, _fk: &ForeignKey) -> DbResult<()> {
        Ok(())
    }

    async fn drop_foreign_key(&self, fk: &ForeignKey) -> DbResult<()>;
    async fn create_foreign_key(&self, fk: &ForeignKey) -> DbResult<()>;
    async fn drop_index(&self, index: &Index) -> DbResult<()>;
    async fn create_index(&self, index: &Index) -> DbResult<()>;

    /// Toggle explicit identity-value mode for one table.
    async fn set_identity_insert(&self, _table: &TableName, _enabled: bool) -> DbResult<()> {
        Ok(())
    }

    /// Delete all rows (DELETE, not TRUNCATE, to tolerate cascading FKs)
    async fn delete_all(&self, table: &TableName) -> DbResult<usize>;

    /// The catalog/schema pair unqualified table references resolve to.
    fn default_namespace(&self) -> (String, String) {
        ("main".to_string(), "main".to_string())
    }

    /// Render a table name for SQL text
    fn sql_name(&self, name: &TableName) -> String {
        format!(
            "{}.{}",
            quote_ident(name.schema()),
            quote_ident(name.table())
        )
    }
}

/// Double-quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
