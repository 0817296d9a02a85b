//! DuckDB catalog backend.
//!
//! Introspection combines `information_schema` with the
//! `duckdb_constraints()` and `duckdb_indexes()` table functions. DuckDB
//! reports constraints as definition text rather than structured columns,
//! so primary keys and foreign keys are recovered from `constraint_text`.
//! DuckDB has no runtime FK toggle, which routes the populator to the
//! drop/recreate preparation strategy; on engine versions that reject
//! `ALTER TABLE ... DROP CONSTRAINT` the limitation surfaces as a
//! [`DbError`] rather than being papered over.

use crate::error::{DbError, DbResult};
use crate::traits::{quote_ident, Catalog, QueryResult, SelectedColumn};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use duckdb::types::{TimeUnit, ToSqlOutput, Value as DuckValue, ValueRef as DuckValueRef};
use duckdb::{Connection, ToSql};
use fx_core::{Column, ColumnType, ForeignKey, Index, Table, TableName, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// DuckDB catalog backend
pub struct DuckDbCatalog {
    conn: Mutex<Connection>,
    catalog_name: String,
}

impl DuckDbCatalog {
    /// Open an in-memory database
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open a database file
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
        let catalog_name: String = conn
            .query_row("SELECT current_database()", [], |row| row.get(0))
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            catalog_name,
        })
    }

    /// The connection's default catalog (database) name
    pub fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }
}

fn map_data_type(data_type: &str) -> ColumnType {
    let data_type = data_type.to_ascii_uppercase();
    if data_type.contains("TIMESTAMP") || data_type.starts_with("DATE") || data_type.starts_with("TIME") {
        ColumnType::Timestamp
    } else if data_type.contains("BLOB")
        || data_type.contains("BINARY")
        || data_type.contains("BYTEA")
        || data_type.contains("BIT")
    {
        ColumnType::Binary
    } else if data_type.starts_with("DECIMAL")
        || data_type.starts_with("NUMERIC")
        || data_type.contains("DOUBLE")
        || data_type.contains("FLOAT")
        || data_type.contains("REAL")
    {
        ColumnType::BigDecimal
    } else if data_type.contains("INTERVAL") {
        ColumnType::Varchar
    } else if data_type.contains("INT") || data_type == "BOOLEAN" {
        ColumnType::Integer
    } else {
        ColumnType::Varchar
    }
}

/// Bind adapter from the engine's row values onto DuckDB parameters.
struct DuckParam<'a>(&'a Value);

impl ToSql for DuckParam<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(DuckValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(DuckValue::BigInt(*i)),
            Value::Decimal(d) => ToSqlOutput::Owned(DuckValue::Double(*d)),
            Value::Text(s) => ToSqlOutput::Borrowed(DuckValueRef::Text(s.as_bytes())),
            Value::Timestamp(ts) => ToSqlOutput::Owned(DuckValue::Text(
                ts.format(TIMESTAMP_FORMAT).to_string(),
            )),
            Value::Bytes(b) => ToSqlOutput::Borrowed(DuckValueRef::Blob(b)),
        })
    }
}

fn timestamp_to_naive(unit: &TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    chrono::DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn read_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Integer(b as i64),
        DuckValue::TinyInt(i) => Value::Integer(i as i64),
        DuckValue::SmallInt(i) => Value::Integer(i as i64),
        DuckValue::Int(i) => Value::Integer(i as i64),
        DuckValue::BigInt(i) => Value::Integer(i),
        DuckValue::HugeInt(i) => Value::Integer(i as i64),
        DuckValue::UTinyInt(i) => Value::Integer(i as i64),
        DuckValue::USmallInt(i) => Value::Integer(i as i64),
        DuckValue::UInt(i) => Value::Integer(i as i64),
        DuckValue::UBigInt(i) => Value::Integer(i as i64),
        DuckValue::Float(f) => Value::Decimal(f as f64),
        DuckValue::Double(f) => Value::Decimal(f),
        DuckValue::Decimal(d) => d
            .to_string()
            .parse()
            .map(Value::Decimal)
            .unwrap_or_else(|_| Value::Text(d.to_string())),
        DuckValue::Timestamp(unit, raw) => timestamp_to_naive(&unit, raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Date32(days) => chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .map(|epoch| epoch + chrono::Duration::days(days as i64))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Bytes(b),
        other => Value::Text(format!("{other:?}")),
    }
}

fn value_kind(value: &DuckValue) -> Option<ColumnType> {
    match value {
        DuckValue::Null => None,
        DuckValue::Text(_) | DuckValue::Enum(_) => Some(ColumnType::Varchar),
        DuckValue::Blob(_) => Some(ColumnType::Binary),
        DuckValue::Timestamp(..) | DuckValue::Date32(_) => Some(ColumnType::Timestamp),
        DuckValue::Float(_) | DuckValue::Double(_) | DuckValue::Decimal(_) => {
            Some(ColumnType::BigDecimal)
        }
        _ => Some(ColumnType::Integer),
    }
}

fn unquote(ident: &str) -> String {
    let trimmed = ident.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(|s| s.replace("\"\"", "\""))
        .unwrap_or_else(|| trimmed.to_string())
}

/// First parenthesized identifier list in `text`, starting at `from`.
fn parse_paren_list(text: &str, from: usize) -> Option<(Vec<String>, usize)> {
    let open = text[from..].find('(')? + from;
    let close = text[open..].find(')')? + open;
    let columns = text[open + 1..close]
        .split(',')
        .map(unquote)
        .filter(|c| !c.is_empty())
        .collect();
    Some((columns, close + 1))
}

/// Parse `PRIMARY KEY(a, b)` definition text.
fn parse_primary_key_text(text: &str) -> Option<Vec<String>> {
    parse_paren_list(text, 0).map(|(columns, _)| columns)
}

/// Parse `FOREIGN KEY (a, b) REFERENCES parent(c, d)` definition text into
/// `(fk_columns, parent_table, pk_columns)`.
fn parse_foreign_key_text(text: &str) -> Option<(Vec<String>, String, Vec<String>)> {
    let references = text.find("REFERENCES")?;
    let (fk_columns, _) = parse_paren_list(&text[..references], 0)?;
    let tail = &text[references + "REFERENCES".len()..];
    let open = tail.find('(')?;
    let parent = unquote(&tail[..open]);
    let (pk_columns, _) = parse_paren_list(tail, open)?;
    if parent.is_empty() || fk_columns.is_empty() || pk_columns.len() != fk_columns.len() {
        return None;
    }
    Some((fk_columns, parent, pk_columns))
}

/// Recover the column list of `CREATE [UNIQUE] INDEX name ON table (a, b)`.
fn parse_index_columns(sql: &str) -> Vec<String> {
    sql.find(" ON ")
        .and_then(|on| parse_paren_list(sql, on))
        .map(|(columns, _)| columns)
        .unwrap_or_default()
}

fn query_sync(conn: &Connection, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let mut raw_rows: Vec<Vec<DuckValue>> = Vec::new();
    {
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter().map(DuckParam)))?;
        while let Some(row) = rows.next()? {
            let count = row.as_ref().column_count();
            let mut cells = Vec::with_capacity(count);
            for position in 0..count {
                cells.push(row.get::<_, DuckValue>(position)?);
            }
            raw_rows.push(cells);
        }
    }

    // Statement metadata is only available after execution.
    let columns: Vec<SelectedColumn> = stmt
        .column_names()
        .into_iter()
        .enumerate()
        .map(|(position, name)| {
            let column_type = raw_rows
                .iter()
                .find_map(|row| value_kind(&row[position]))
                .unwrap_or(ColumnType::Varchar);
            SelectedColumn::new(position, name, column_type)
        })
        .collect();

    Ok(QueryResult {
        columns,
        rows: raw_rows
            .into_iter()
            .map(|row| row.into_iter().map(read_value).collect())
            .collect(),
    })
}

fn table_sync(conn: &Connection, name: &TableName) -> DbResult<Table> {
    struct RawColumn {
        name: String,
        column_type: ColumnType,
        nullable: bool,
        auto_increment: bool,
    }

    let mut stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable, column_default
         FROM information_schema.columns
         WHERE table_catalog = ?1 AND table_schema = ?2 AND table_name = ?3
         ORDER BY ordinal_position",
    )?;
    let raw: Vec<RawColumn> = stmt
        .query_map(
            [name.catalog(), name.schema(), name.table()],
            |row| {
                let default: Option<String> = row.get(3)?;
                Ok(RawColumn {
                    name: row.get(0)?,
                    column_type: map_data_type(&row.get::<_, String>(1)?),
                    nullable: row.get::<_, String>(2)? == "YES",
                    auto_increment: default.is_some_and(|d| d.starts_with("nextval(")),
                })
            },
        )?
        .collect::<Result<_, _>>()?;
    if raw.is_empty() {
        return Err(DbError::TableNotFound(name.qualified_name()));
    }

    let columns: Vec<Column> = raw
        .iter()
        .map(|c| Column::new(c.name.as_str(), c.column_type, c.nullable, c.auto_increment))
        .collect();

    let mut primary_key = None;
    let mut foreign_keys = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT constraint_index, constraint_type, constraint_text
         FROM duckdb_constraints()
         WHERE database_name = ?1 AND schema_name = ?2 AND table_name = ?3",
    )?;
    let constraints: Vec<(i64, String, String)> = stmt
        .query_map(
            [name.catalog(), name.schema(), name.table()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?
        .collect::<Result<_, _>>()?;
    for (constraint_index, constraint_type, constraint_text) in constraints {
        match constraint_type.as_str() {
            "PRIMARY KEY" => {
                if let Some(pk_columns) = parse_primary_key_text(&constraint_text) {
                    primary_key = Some(Index::new(
                        format!("{}_pk", name.table()),
                        name.clone(),
                        true,
                        true,
                        pk_columns,
                    ));
                }
            }
            "FOREIGN KEY" => {
                if let Some((fk_columns, parent, pk_columns)) =
                    parse_foreign_key_text(&constraint_text)
                {
                    foreign_keys.push(ForeignKey::new(
                        format!("fk_{}_{}", name.table(), constraint_index),
                        Some(constraint_text),
                        TableName::new(name.catalog(), name.schema(), parent),
                        pk_columns,
                        name.clone(),
                        fk_columns,
                    ));
                } else {
                    log::warn!(
                        "Unparseable FOREIGN KEY constraint on {}: {constraint_text}",
                        name.qualified_name()
                    );
                }
            }
            _ => {}
        }
    }

    let mut stmt = conn.prepare(
        "SELECT index_name, is_unique, sql
         FROM duckdb_indexes()
         WHERE database_name = ?1 AND schema_name = ?2 AND table_name = ?3
         ORDER BY index_name",
    )?;
    let indexes: Vec<Index> = stmt
        .query_map(
            [name.catalog(), name.schema(), name.table()],
            |row| {
                let index_name: String = row.get(0)?;
                let unique: bool = row.get(1)?;
                let sql: Option<String> = row.get(2)?;
                Ok(Index::new(
                    index_name,
                    name.clone(),
                    unique,
                    false,
                    sql.map(|s| parse_index_columns(&s)).unwrap_or_default(),
                ))
            },
        )?
        .collect::<Result<_, _>>()?;

    Ok(Table::new(
        name.clone(),
        columns,
        indexes,
        primary_key,
        foreign_keys,
    ))
}

#[async_trait]
impl Catalog for DuckDbCatalog {
    fn engine(&self) -> &'static str {
        "duckdb"
    }

    fn supports_constraint_toggle(&self) -> bool {
        false
    }

    fn default_namespace(&self) -> (String, String) {
        (self.catalog_name.clone(), "main".to_string())
    }

    async fn table_names(&self, catalog: &str, schema: &str) -> DbResult<Vec<TableName>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables
             WHERE table_catalog = ?1 AND table_schema = ?2 AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )?;
        let names = stmt
            .query_map([catalog, schema], |row| row.get::<_, String>(0))?
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
            stmt.execute(duckdb::params_from_iter(row.iter().map(DuckParam)))?;
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

    async fn set_constraint_enabled(&self, fk: &ForeignKey, _enabled: bool) -> DbResult<()> {
        Err(DbError::Unsupported {
            engine: "duckdb".to_string(),
            feature: format!("toggling foreign key {}", fk.name()),
        })
    }

    async fn drop_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        let conn = self.lock()?;
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.sql_name(fk.fk_table()),
            quote_ident(fk.name())
        );
        conn.execute_batch(&sql)?;
        Ok(())
    }

    async fn create_foreign_key(&self, fk: &ForeignKey) -> DbResult<()> {
        let conn = self.lock()?;
        let definition = match fk.definition() {
            Some(text) => text.to_string(),
            None => format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.fk_columns()
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                self.sql_name(fk.pk_table()),
                fk.pk_columns()
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        };
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {definition}",
            self.sql_name(fk.fk_table()),
            quote_ident(fk.name())
        );
        conn.execute_batch(&sql)?;
        Ok(())
    }

    async fn drop_index(&self, index: &Index) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "DROP INDEX IF EXISTS {}",
            quote_ident(index.name())
        ))?;
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
            self.sql_name(index.table()),
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
#[path = "duckdb_test.rs"]
mod duckdb_test;
