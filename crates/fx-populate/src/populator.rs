//! Transactional dataset loading.
//!
//! One `load()` call owns one transaction spanning every requested
//! dataset. The `static` dataset, when present, is moved to the front but
//! only included on the first successful load of this Populator's
//! lifetime; `base` is moved to the front (after static) whenever it is
//! requested. Inserts run in groups with an explicit commit between
//! groups so a very large dataset cannot exhaust driver batch limits;
//! groups committed before a late failure stay committed, an accepted
//! trade-off for very large loads.

use crate::error::{PopulateError, PopulateResult};
use crate::strategy::select_strategy;
use fx_core::{decode_cell, parse_header_name, DataFile, Datasets, Table, TableName, Value};
use fx_core::{BASE_DATASET, STATIC_DATASET};
use fx_db::Catalog;
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_INSERT_BATCH_SIZE: usize = 10_000;

/// Loads named datasets into the target database.
pub struct Populator<'a> {
    catalog: &'a dyn Catalog,
    datasets: Datasets,
    insert_batch_size: usize,
    revalidate: bool,
    static_loaded: bool,
}

impl<'a> Populator<'a> {
    pub fn new(catalog: &'a dyn Catalog, datasets: Datasets) -> Self {
        Self {
            catalog,
            datasets,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            revalidate: false,
            static_loaded: false,
        }
    }

    /// Rows inserted between explicit commits.
    pub fn with_insert_batch_size(mut self, size: usize) -> Self {
        self.insert_batch_size = size.max(1);
        self
    }

    /// Re-validate constraints after re-enabling them (slow, default off).
    pub fn with_revalidation(mut self, revalidate: bool) -> Self {
        self.revalidate = revalidate;
        self
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    /// Load the named datasets inside one transaction. Returns the total
    /// inserted row count.
    pub async fn load(&mut self, names: &[&str]) -> PopulateResult<usize> {
        let ordered = self.ordered_datasets(names)?;
        let ordered_refs: Vec<&str> = ordered.iter().map(String::as_str).collect();
        log::debug!("loading datasets in order: {ordered:?}");

        let affected = self.affected_tables(&ordered)?;
        let known = self.known_tables(&affected).await?;
        self.datasets
            .validate_all_tables_exist(&ordered_refs, &known)?;

        let affected: Vec<TableName> = affected.into_iter().collect();
        let tables = self.catalog.tables(&affected).await?;
        let table_map: BTreeMap<TableName, Table> =
            tables.iter().map(|t| (t.name().clone(), t.clone())).collect();

        let strategy = select_strategy(self.catalog, &tables, self.revalidate);
        let before = strategy.before_inserts(self.catalog).await;
        let inserted = match &before {
            Ok(()) => self.insert_datasets(&ordered, &table_map).await,
            Err(_) => Ok(0),
        };
        // Constraint state is restored even when the inserts failed,
        // leaving the schema usable.
        let after = strategy.after_inserts(self.catalog).await;

        before?;
        let rows = inserted?;
        after?;

        self.static_loaded = true;
        Ok(rows)
    }

    /// Load-priority ordering of the requested names: `static` first (once
    /// per Populator), `base` second when requested, the rest in request
    /// order.
    fn ordered_datasets(&self, names: &[&str]) -> PopulateResult<Vec<String>> {
        for name in names {
            if self.datasets.get(name).is_none() {
                return Err(PopulateError::Core(fx_core::CoreError::DatasetNotFound {
                    name: name.to_string(),
                }));
            }
        }
        let mut ordered = Vec::new();
        if !self.static_loaded {
            ordered.push(STATIC_DATASET.to_string());
        } else if names.contains(&STATIC_DATASET) {
            log::debug!("static dataset already loaded by this populator; skipping");
        }
        if names.contains(&BASE_DATASET) {
            ordered.push(BASE_DATASET.to_string());
        }
        for name in names {
            let name = name.to_string();
            if name != STATIC_DATASET && name != BASE_DATASET && !ordered.contains(&name) {
                ordered.push(name);
            }
        }
        Ok(ordered)
    }

    fn affected_tables(&self, ordered: &[String]) -> PopulateResult<BTreeSet<TableName>> {
        let mut affected = BTreeSet::new();
        for name in ordered {
            if let Some(dataset) = self.datasets.get(name) {
                for file in dataset.files() {
                    affected.insert(file.table().clone());
                }
            }
        }
        Ok(affected)
    }

    /// The target connection's table set for every namespace the affected
    /// tables live in.
    async fn known_tables(
        &self,
        affected: &BTreeSet<TableName>,
    ) -> PopulateResult<BTreeSet<TableName>> {
        let namespaces: BTreeSet<(String, String)> = affected
            .iter()
            .map(|t| (t.catalog().to_string(), t.schema().to_string()))
            .collect();
        let mut known = BTreeSet::new();
        for (catalog, schema) in namespaces {
            known.extend(self.catalog.table_names(&catalog, &schema).await?);
        }
        Ok(known)
    }

    async fn insert_datasets(
        &self,
        ordered: &[String],
        table_map: &BTreeMap<TableName, Table>,
    ) -> PopulateResult<usize> {
        self.catalog.begin().await?;
        let mut inserter = BatchInserter {
            catalog: self.catalog,
            batch_size: self.insert_batch_size,
            since_commit: 0,
            total: 0,
        };
        for name in ordered {
            if let Some(dataset) = self.datasets.get(name) {
                for file in dataset.files() {
                    if let Err(source) = self.insert_file(file, table_map, &mut inserter).await {
                        let _ = self.catalog.rollback().await;
                        return Err(PopulateError::DatasetLoad {
                            dataset: name.clone(),
                            file: file.path().display().to_string(),
                            source: Box::new(source),
                        });
                    }
                }
            }
        }
        self.catalog.commit().await?;
        Ok(inserter.total)
    }

    async fn insert_file(
        &self,
        file: &DataFile,
        table_map: &BTreeMap<TableName, Table>,
        inserter: &mut BatchInserter<'_>,
    ) -> PopulateResult<()> {
        let table = table_map
            .get(file.table())
            .ok_or_else(|| PopulateError::TableNotLoaded {
                table: file.table().qualified_name(),
            })?;

        let identity_toggle =
            table.auto_increment_column().is_some() && self.catalog.supports_identity_insert();
        if identity_toggle {
            self.catalog.set_identity_insert(table.name(), true).await?;
        }
        let result = self.insert_file_rows(file, table, inserter).await;
        if identity_toggle {
            let restored = self.catalog.set_identity_insert(table.name(), false).await;
            if result.is_ok() {
                restored?;
            }
        }
        result
    }

    async fn insert_file_rows(
        &self,
        file: &DataFile,
        table: &Table,
        inserter: &mut BatchInserter<'_>,
    ) -> PopulateResult<()> {
        let mut reader = csv::Reader::from_path(file.path())?;
        let headers = reader.headers()?.clone();

        let mut columns = Vec::with_capacity(headers.len());
        for header in headers.iter() {
            let (bare, _) = parse_header_name(header);
            let column = table
                .column(bare)
                .ok_or_else(|| PopulateError::UnknownColumn {
                    column: header.to_string(),
                    file: file.path().display().to_string(),
                    table: table.name().qualified_name(),
                })?;
            columns.push(column.clone());
        }
        let column_names: Vec<String> =
            columns.iter().map(|c| c.name().to_string()).collect();

        let mut batch: Vec<Vec<Value>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Vec::with_capacity(columns.len());
            for (position, column) in columns.iter().enumerate() {
                let raw = record.get(position).unwrap_or("");
                row.push(decode_cell(column, raw)?);
            }
            batch.push(row);
            if batch.len() >= self.insert_batch_size {
                inserter
                    .insert(table.name(), &column_names, std::mem::take(&mut batch))
                    .await?;
            }
        }
        inserter.insert(table.name(), &column_names, batch).await?;
        Ok(())
    }
}

/// Groups inserts and commits between groups so one huge dataset cannot
/// exhaust driver or server batch limits.
struct BatchInserter<'a> {
    catalog: &'a dyn Catalog,
    batch_size: usize,
    since_commit: usize,
    total: usize,
}

impl BatchInserter<'_> {
    async fn insert(
        &mut self,
        table: &TableName,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> PopulateResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let inserted = self.catalog.insert_rows(table, columns, &rows).await?;
        self.total += inserted;
        self.since_commit += inserted;
        if self.since_commit >= self.batch_size {
            self.catalog.commit().await?;
            self.catalog.begin().await?;
            self.since_commit = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "populator_test.rs"]
mod populator_test;
