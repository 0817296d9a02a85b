//! Catalog schema model: columns, indexes, foreign keys, and table snapshots.
//!
//! These types are immutable snapshots produced by a `Catalog` implementation
//! and consumed by the extraction and population engines.

use crate::table_name::TableName;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Logical column type, the only type distinctions the transfer engine
/// cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Varchar,
    Integer,
    BigDecimal,
    Timestamp,
    Binary,
}

/// One table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    auto_increment: bool,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        column_type: ColumnType,
        nullable: bool,
        auto_increment: bool,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable,
            auto_increment,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Binary columns get base64-encoded CSV cells.
    pub fn binary(&self) -> bool {
        self.column_type == ColumnType::Binary
    }
}

/// A table index. The primary key is an `Index` with `primary_key = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    name: String,
    table: TableName,
    unique: bool,
    primary_key: bool,
    columns: Vec<String>,
}

impl Index {
    pub fn new(
        name: impl Into<String>,
        table: TableName,
        unique: bool,
        primary_key: bool,
        columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table,
            unique,
            primary_key,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    pub fn primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// A foreign key edge from a child (referencing) table to a parent
/// (referenced) table.
///
/// Equality and hashing compare the constraint name only: two foreign keys
/// with the same name are the same edge even if their column lists differ
/// across catalog snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    name: String,
    /// Vendor constraint-definition text, when the engine exposes it.
    /// Used to recreate the constraint verbatim by the drop/recreate
    /// preparation strategy.
    definition: Option<String>,
    pk_table: TableName,
    pk_columns: Vec<String>,
    fk_table: TableName,
    fk_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        definition: Option<String>,
        pk_table: TableName,
        pk_columns: Vec<String>,
        fk_table: TableName,
        fk_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            definition,
            pk_table,
            pk_columns,
            fk_table,
            fk_columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// The parent (referenced) table.
    pub fn pk_table(&self) -> &TableName {
        &self.pk_table
    }

    pub fn pk_columns(&self) -> &[String] {
        &self.pk_columns
    }

    /// The child (referencing) table.
    pub fn fk_table(&self) -> &TableName {
        &self.fk_table
    }

    pub fn fk_columns(&self) -> &[String] {
        &self.fk_columns
    }
}

impl PartialEq for ForeignKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ForeignKey {}

impl Hash for ForeignKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Immutable snapshot of one table's structure.
///
/// `foreign_keys` holds the constraints whose child side is this table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: TableName,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    primary_key: Option<Index>,
    foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(
        name: TableName,
        columns: Vec<Column>,
        indexes: Vec<Index>,
        primary_key: Option<Index>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        Self {
            name,
            columns,
            indexes,
            primary_key,
            foreign_keys,
        }
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Secondary indexes, the primary key excluded.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.primary_key.as_ref()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// The primary key column names, empty when the table has none.
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns().to_vec())
            .unwrap_or_default()
    }

    /// The first auto-increment column, if any.
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.auto_increment())
    }
}
