//! Vendor preparation strategies.
//!
//! Before a bulk load the target schema's constraints must get out of the
//! way: datasets arrive in an order that satisfies no FK, and affected
//! tables are cleared with DELETE rather than TRUNCATE to tolerate
//! cascading dependents. Engines with a native validation toggle use
//! [`DisableConstraintsStrategy`]; everything else falls back to
//! [`DropRecreateStrategy`]. Either way `after_inserts` restores the
//! schema, and the populator runs it even when the inserts failed.

use crate::error::PopulateResult;
use async_trait::async_trait;
use fx_core::{ForeignKey, Index, Table, TableName};
use fx_db::Catalog;

/// Constraint/index manipulation around a bulk load.
#[async_trait]
pub trait PreparationStrategy: Send + Sync {
    async fn before_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()>;
    async fn after_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()>;
}

/// Choose a strategy for the affected tables by engine capability.
pub fn select_strategy(
    catalog: &dyn Catalog,
    tables: &[Table],
    revalidate: bool,
) -> Box<dyn PreparationStrategy> {
    if catalog.supports_constraint_toggle() {
        Box::new(DisableConstraintsStrategy::new(tables, revalidate))
    } else {
        Box::new(DropRecreateStrategy::new(tables))
    }
}

/// FKs whose child side is one of the affected tables.
fn affected_foreign_keys(tables: &[Table]) -> Vec<ForeignKey> {
    tables
        .iter()
        .flat_map(|t| t.foreign_keys().iter().cloned())
        .collect()
}

fn affected_names(tables: &[Table]) -> Vec<TableName> {
    tables.iter().map(|t| t.name().clone()).collect()
}

/// Disable FK validation, delete, insert, re-enable. Preferred where the
/// engine supports it.
pub struct DisableConstraintsStrategy {
    tables: Vec<TableName>,
    foreign_keys: Vec<ForeignKey>,
    revalidate: bool,
}

impl DisableConstraintsStrategy {
    pub fn new(tables: &[Table], revalidate: bool) -> Self {
        Self {
            tables: affected_names(tables),
            foreign_keys: affected_foreign_keys(tables),
            revalidate,
        }
    }
}

#[async_trait]
impl PreparationStrategy for DisableConstraintsStrategy {
    async fn before_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()> {
        for fk in &self.foreign_keys {
            catalog.set_constraint_enabled(fk, false).await?;
        }
        for table in &self.tables {
            let deleted = catalog.delete_all(table).await?;
            log::debug!("cleared {deleted} rows from {}", table.qualified_name());
        }
        Ok(())
    }

    async fn after_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()> {
        for fk in &self.foreign_keys {
            catalog.set_constraint_enabled(fk, true).await?;
        }
        if self.revalidate {
            for fk in &self.foreign_keys {
                catalog.validate_constraint(fk).await?;
            }
        }
        Ok(())
    }
}

/// Drop affected indexes and FKs outright, then recreate them, indexes
/// first (a FK may target a unique index that must exist before it).
pub struct DropRecreateStrategy {
    tables: Vec<TableName>,
    foreign_keys: Vec<ForeignKey>,
    indexes: Vec<Index>,
}

impl DropRecreateStrategy {
    pub fn new(tables: &[Table]) -> Self {
        Self {
            tables: affected_names(tables),
            foreign_keys: affected_foreign_keys(tables),
            indexes: tables
                .iter()
                .flat_map(|t| t.indexes().iter().cloned())
                .collect(),
        }
    }
}

#[async_trait]
impl PreparationStrategy for DropRecreateStrategy {
    async fn before_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()> {
        for fk in &self.foreign_keys {
            catalog.drop_foreign_key(fk).await?;
        }
        for index in &self.indexes {
            catalog.drop_index(index).await?;
        }
        for table in &self.tables {
            let deleted = catalog.delete_all(table).await?;
            log::debug!("cleared {deleted} rows from {}", table.qualified_name());
        }
        Ok(())
    }

    async fn after_inserts(&self, catalog: &dyn Catalog) -> PopulateResult<()> {
        for index in &self.indexes {
            catalog.create_index(index).await?;
        }
        for fk in &self.foreign_keys {
            catalog.create_foreign_key(fk).await?;
        }
        Ok(())
    }
}
