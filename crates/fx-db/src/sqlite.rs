//! SQLite catalog backend.
//!
//! Introspection goes through the `pragma_*` table-valued functions and
//! `sqlite_master`. SQLite's FK toggle (`PRAGMA foreign_keys`) is
//! engine-global, so [`Catalog::set_constraint_enabled`] flips validation
//! for every constraint on the connection; re-enabling any one foreign key
//! re-enables all of them. The pragma is a no-op inside an open
//! transaction, which is why the preparation strategies run it before
//! `BEGIN` and after `COMMIT`.

use crate::error::{DbError, DbResult};
use crate::traits::{quote_ident, Catalog, QueryResult, SelectedColumn};
use async_trait::async_trait;
use fx_core::{Column, ColumnType, ForeignKey, Index, Table, TableName, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQLite catalog backend
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open an in-memory database with FK enforcement enabled
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open a database file with FK enforcement enabled
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }
}

/// Map a declared column type onto the engine's logical types, following
/// SQLite's affinity rules.
fn map_decl_type(decl: &str) -> ColumnType {
    let decl = decl.to_ascii_uppercase();
    if decl.contains("DATE") || decl.contains("TIME") {
        ColumnType::Timestamp
    } else if decl.contains("INT") {
        ColumnType::Integer
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ColumnType::Varchar
    } else if decl.contains("BLOB") || decl.is_empty() {
        ColumnType::Binary
    } else if decl.contains("REAL")
        || decl.contains("FLOA")
        || decl.contains("DOUB")
        || decl.contains("DEC")
        || decl.contains("NUM")
    {
        ColumnType::BigDecimal
    } else {
        ColumnType::Varchar
    }
}

/// Bind adapter from the engine's row values onto rusqlite parameters.
struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Decimal(d) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*d)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                ts.format(TIMESTAMP_FORMAT).to_string(),
            )),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn read_value(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Decimal(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn escape_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn query_sync(conn: &Connection, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<SelectedColumn> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(position, column)| {
            let column_type = column
                .decl_type()
                .map(map_decl_type)
                .unwrap_or(ColumnType::Varchar);
            SelectedColumn::new(position, column.name(), column_type)
        })
        .collect();

    let mut out = Vec::new();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(SqlValue)))?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for position in 0..columns.len() {
            cells.push(read_value(row.get_ref(position)?));
        }
        out.push(cells);
    }
    Ok(QueryResult {
        columns,
        rows: out,
    })
}

fn table_sync(conn: &Connection, name: &TableName) -> DbResult<Table> {
    // sqlite_master is the existence oracle; everything else is pragmas.
    let mut stmt = conn.prepare("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let create_sql: Option<String> = stmt
        .query_row([name.table()], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if create_sql.is_none() {
        return Err(DbError::TableNotFound(name.qualified_name()));
    }

    struct RawColumn {
        name: String,
        column_type: ColumnType,
        notnull: bool,
        pk_ordinal: i64,
    }

    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let raw: Vec<RawColumn> = stmt
        .query_map([name.table()], |row| {
            Ok(RawColumn {
                name: row.get(0)?,
                column_type: map_decl_type(&row.get::<_, String>(1)?),
                notnull: row.get::<_, i64>(2)? != 0,
                pk_ordinal: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut pk_columns: Vec<(i64, String)> = raw
        .iter()
        .filter(|c| c.pk_ordinal > 0)
        .map(|c| (c.pk_ordinal, c.name.clone()))
        .collect();
    pk_columns.sort();
    let pk_columns: Vec<String> = pk_columns.into_iter().map(|(_, n)| n).collect();

    // A single INTEGER primary key aliases the rowid and autogenerates
    // values, with or without the AUTOINCREMENT keyword.
    let auto_increment = if pk_columns.len() == 1 {
        raw.iter()
            .find(|c| c.name == pk_columns[0] && c.column_type == ColumnType::Integer)
            .map(|c| c.name.clone())
    } else {
        None
    };

    let columns: Vec<Column> = raw
        .iter()
        .map(|c| {
            Column::new(
                c.name.as_str(),
                c.column_type,
                !c.notnull,
                auto_increment.as_deref() == Some(c.name.as_str()),
            )
        })
        .collect();

    let primary_key = if pk_columns.is_empty() {
        None
    } else {
        Some(Index::new(
            format!("{}_pk", name.table()),
            name.clone(),
            true,
            true,
            pk_columns,
        ))
    };

    let indexes = indexes_sync(conn, name)?;
    let foreign_keys = foreign_keys_sync(conn, name)?;

    Ok(Table::new(
        name.clone(),
        columns,
        indexes,
        primary_key,
        foreign_keys,
    ))
}

fn indexes_sync(conn: &Connection, name: &TableName) -> DbResult<Vec<Index>> {
    // origin 'c' = CREATE INDEX; constraint-backed autoindexes ('pk', 'u')
    // cannot be dropped with DROP INDEX, so they are not exposed.
    let mut stmt = conn.prepare(
        "SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name",
    )?;
    let listed: Vec<(String, bool)> = stmt
        .query_map([name.table()], |row| {
            Ok((row.get(0)?, row.get::<_, i64>(1)? != 0))
        })?
        .collect::<Result<_, _>>()?;

    let mut indexes = Vec::with_capacity(listed.len());
    for (index_name, unique) in listed {
        let mut stmt =
            conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let columns: Vec<String> = stmt
            .query_map([&index_name], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        indexes.push(Index::new(index_name, name.clone(), unique, false, columns));
    }
    Ok(indexes)
}

fn foreign_keys_sync(conn: &Connection, name: &TableName) -> DbResult<Vec<ForeignKey>> {
    struct FkRow {
        id: i64,
        parent: String,
        from: String,
        to: Option<String>,
    }

    let mut stmt = conn.prepare(
        "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let rows: Vec<FkRow> = stmt
        .query_map([name.table()], |row| {
            Ok(FkRow {
                id: row.get(0)?,
                parent: row.get(1)?,
                from: row.get(2)?,
                to: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut foreign_keys: Vec<ForeignKey> = Vec::new();
    let mut current: Option<(i64, String, Vec<String>, Vec<Option<String>>)> = None;
    for row in rows {
        match &mut current {
            Some((id, _, from, to)) if *id == row.id => {
                from.push(row.from);
                to.push(row.to);
            }
            _ => {
                if let Some(group) = current.take() {
                    foreign_keys.push(build_foreign_key(conn, name, group)?);
                }
                current = Some((row.id, row.parent, vec![row.from], vec![row.to]));
            }
        }
    }
    if let Some(group) = current.take() {
        foreign_keys.push(build_foreign_key(conn, name, group)?);
    }
    Ok(foreign_keys)
}

fn build_foreign_key(
    conn: &Connection,
    child: &TableName,
    (id, parent, from, to): (i64, String, Vec<String>, Vec<Option<String>>),
) -> DbResult<ForeignKey> {
    let parent_name = TableName::new(child.catalog(), child.schema(), parent.as_str());
    // A NULL "to" column means the FK targets the parent's primary key.
    let pk_columns: Vec<String> = if to.iter().all(|t| t.is_some()) {
        to.into_iter().flatten().collect()
    } else {
        let mut stmt = conn.prepare(
            "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
        )?;
        let pk = stmt
            .query_map([&parent], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        pk
    };
    Ok(ForeignKey::new(
        format!("fk_{}_{}", child.table(), id),
        None,
        parent_name,
        pk_columns,
        child.clone(),
        from,
    ))
}

#[async_trait]
impl Catalog for SqliteCatalog {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    fn supports_constraint_toggle(&self) -> bool {
        true
    }

    async fn table_names(&self, catalog: &str, schema: &str) -> DbResult<Vec<TableName>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names
            .into_iter()
            .map(|n| TableName::new(catalog, schema, n))
            .collect())
    }

    async fn table(&self, name: &TableName) -> DbResult<Table> {
        let conn = self.lock()?;
        table_sync(&conn, name)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
        let conn = self.lock()?;
        query_sync(&conn, sql, params)
    }

    async fn execute(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{e}: {sql}")))
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> DbResult<usize> {
        let conn = self.lock()?;
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            self.sql_name(table)
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut inserted = 0;
        for row in rows {
            stmt.execute(rusqlite::params_from_iter(row.iter().map(SqlValue)))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn begin(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    async fn set_constraint_enabled(&self, fk: &ForeignKey, enabled: bool) -> DbResult<()> {
        // Engine-global toggle; see the module docs.
        log::debug!(
            "{} foreign key {} (engine-global)",
            if enabled { "enabling" } else { "disabling" },
            fk.name()
        );
        let conn = self.lock()?;
        let pragma = if enabled {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        };
        conn.execute_batch(pragma)?;
        Ok(())
    }

    async fn validate_constraint(&self, fk: &ForeignKey) -> DbResult<()> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT COUNT(*) FROM pragma_foreign_key_check({})",
            escape_literal(fk.fk_table().table())
        );
        let violations: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        if violations > 0 {
            return Err(DbError::ExecutionError(format!(
                "{violations} foreign key violation(s) on {} after re-enabling {}",
                fk.fk_table().qualified_name(),
                fk.name()
            )));
        }
        Ok(())
    }

    async fn drop_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        Err(DbError::Unsupported {
            engine: "sqlite".to_string(),
            feature: format!("dropping foreign key {}", fk.name()),
        })
    }

    async fn create_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        Err(DbError::Unsupported {
            engine: "sqlite".to_string(),
            feature: format!("creating foreign key {}", fk.name()),
        })
    }

    async fn drop_index(&self, index: &Index) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!("DROP INDEX IF EXISTS {}", quote_ident(index.name())))?;
        Ok(())
    }

    async fn create_index(&self, index: &Index) -> DbResult<()> {
        let conn = self.lock()?;
        let unique = if index.unique() { "UNIQUE " } else { "" };
        let columns = index
            .columns()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE {unique}INDEX {} ON {} ({columns})",
            quote_ident(index.name()),
            quote_ident(index.table().table()),
        );
        conn.execute_batch(&sql)?;
        Ok(())
    }

    async fn delete_all(&self, table: &TableName) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(&format!("DELETE FROM {}", self.sql_name(table)), [])
            .map_err(DbError::from)
    }
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod sqlite_test;
