//! Strongly-typed table identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully-qualified table identifier: `(catalog, schema, table)`.
///
/// Immutable; equality and ordering compare all three fields, so it can be
/// used as a map key everywhere. Prevents accidental mixing of table names
/// with column names or dataset names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    catalog: String,
    schema: String,
    table: String,
}

impl TableName {
    /// Create a new `TableName` from its three parts.
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// The catalog (database) part.
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// The schema part.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The bare table part.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Render `catalog.schema.table`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.table)
    }
}
