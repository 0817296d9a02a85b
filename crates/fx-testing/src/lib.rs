//! fx-testing - Test support for fixflow
//!
//! [`MockCatalog`] is a scriptable [`Catalog`] double: it serves canned
//! table snapshots and query results, records every mutating call in a
//! human-readable log, and can be told to fail inserts into one table.
//! Downstream crates use it to test traversal and strategy logic without
//! a live engine.

use async_trait::async_trait;
use fx_core::{Column, ColumnType, ForeignKey, Index, Table, TableName, Value};
use fx_db::{Catalog, DbError, DbResult, QueryResult, DEFAULT_MAX_BOUND_PARAMETERS};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Shorthand for the `main.main` namespace used throughout the tests.
pub fn table_name(table: &str) -> TableName {
    TableName::new("main", "main", table)
}

/// Fluent builder for `Table` snapshots.
pub struct TableBuilder {
    name: TableName,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    primary_key: Option<Index>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableBuilder {
    pub fn new(name: TableName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            indexes: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.columns.push(Column::new(name, column_type, true, false));
        self
    }

    pub fn auto_increment_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.columns.push(Column::new(name, column_type, false, true));
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = Some(Index::new(
            format!("{}_pk", self.name.table()),
            self.name.clone(),
            true,
            true,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn index(mut self, name: &str, unique: bool, columns: &[&str]) -> Self {
        self.indexes.push(Index::new(
            name,
            self.name.clone(),
            unique,
            false,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Add a foreign key whose child side is this table.
    pub fn references(
        mut self,
        constraint: &str,
        parent: &TableName,
        fk_columns: &[&str],
        pk_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push(ForeignKey::new(
            constraint,
            None,
            parent.clone(),
            pk_columns.iter().map(|c| c.to_string()).collect(),
            self.name.clone(),
            fk_columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Table {
        Table::new(
            self.name,
            self.columns,
            self.indexes,
            self.primary_key,
            self.foreign_keys,
        )
    }
}

/// Scriptable catalog double.
pub struct MockCatalog {
    tables: BTreeMap<TableName, Table>,
    constraint_toggle: bool,
    identity_insert: bool,
    max_bound_parameters: usize,
    fail_inserts_into: Option<String>,
    calls: Mutex<Vec<String>>,
    query_results: Mutex<VecDeque<QueryResult>>,
    inserted: Mutex<BTreeMap<TableName, usize>>,
}

impl MockCatalog {
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name().clone(), t)).collect(),
            constraint_toggle: true,
            identity_insert: false,
            max_bound_parameters: DEFAULT_MAX_BOUND_PARAMETERS,
            fail_inserts_into: None,
            calls: Mutex::new(Vec::new()),
            query_results: Mutex::new(VecDeque::new()),
            inserted: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_constraint_toggle(mut self, value: bool) -> Self {
        self.constraint_toggle = value;
        self
    }

    pub fn with_identity_insert(mut self, value: bool) -> Self {
        self.identity_insert = value;
        self
    }

    pub fn with_max_bound_parameters(mut self, value: usize) -> Self {
        self.max_bound_parameters = value;
        self
    }

    /// Make `insert_rows` fail for the named (bare) table.
    pub fn with_failing_insert(mut self, table: &str) -> Self {
        self.fail_inserts_into = Some(table.to_string());
        self
    }

    /// Queue a canned result for the next `query` call.
    pub fn push_query_result(&self, result: QueryResult) {
        self.query_results.lock().unwrap().push_back(result);
    }

    /// Everything recorded so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Total rows accepted for one table.
    pub fn inserted_rows(&self, table: &TableName) -> usize {
        self.inserted.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn engine(&self) -> &'static str {
        "mock"
    }

    fn max_bound_parameters(&self) -> usize {
        self.max_bound_parameters
    }

    fn supports_constraint_toggle(&self) -> bool {
        self.constraint_toggle
    }

    fn supports_identity_insert(&self) -> bool {
        self.identity_insert
    }

    async fn table_names(&self, catalog: &str, schema: &str) -> DbResult<Vec<TableName>> {
        Ok(self
            .tables
            .keys()
            .filter(|n| n.catalog() == catalog && n.schema() == schema)
            .cloned()
            .collect())
    }

    async fn table(&self, name: &TableName) -> DbResult<Table> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.qualified_name()))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
        self.record(format!("query params={}: {sql}", params.len()));
        Ok(self
            .query_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.record(format!("execute: {sql}"));
        Ok(0)
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        _columns: &[String],
        rows: &[Vec<Value>],
    ) -> DbResult<usize> {
        if self.fail_inserts_into.as_deref() == Some(table.table()) {
            self.record(format!("insert {} FAILED", table.table()));
            return Err(DbError::ExecutionError(format!(
                "scripted failure inserting into {}",
                table.qualified_name()
            )));
        }
        self.record(format!("insert {} rows={}", table.table(), rows.len()));
        *self
            .inserted
            .lock()
            .unwrap()
            .entry(table.clone())
            .or_insert(0) += rows.len();
        Ok(rows.len())
    }

    async fn begin(&self) -> DbResult<()> {
        self.record("begin");
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        self.record("commit");
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        self.record("rollback");
        Ok(())
    }

    async fn set_constraint_enabled(&self, fk: &ForeignKey, enabled: bool) -> DbResult<()> {
        self.record(format!(
            "{} fk {}",
            if enabled { "enable" } else { "disable" },
            fk.name()
        ));
        Ok(())
    }

    async fn validate_constraint(&self, fk: &ForeignKey) -> DbResult<()> {
        self.record(format!("validate fk {}", fk.name()));
        Ok(())
    }

    async fn drop_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        self.record(format!("drop fk {}", fk.name()));
        Ok(())
    }

    async fn create_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        self.record(format!("create fk {}", fk.name()));
        Ok(())
    }

    async fn drop_index(&self, index: &Index) -> DbResult<()> {
        self.record(format!("drop index {}", index.name()));
        Ok(())
    }

    async fn create_index(&self, index: &Index) -> DbResult<()> {
        self.record(format!("create index {}", index.name()));
        Ok(())
    }

    async fn set_identity_insert(&self, table: &TableName, enabled: bool) -> DbResult<()> {
        self.record(format!(
            "identity {} {}",
            if enabled { "on" } else { "off" },
            table.table()
        ));
        Ok(())
    }

    async fn delete_all(&self, table: &TableName) -> DbResult<usize> {
        self.record(format!("delete {}", table.table()));
        Ok(0)
    }
}
