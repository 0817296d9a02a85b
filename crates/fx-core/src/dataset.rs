//! Dataset and data file model.
//!
//! A dataset is a named, ordered collection of per-table CSV files under
//! `<root>/<dataset>/<catalog>/<schema>/<table>.csv`. Two dataset names are
//! reserved: `static` (reference data loaded at most once per Populator
//! lifetime) and `base` (full-refresh seed data reloaded on every load that
//! requests it).

use crate::error::{CoreError, CoreResult};
use crate::table_name::TableName;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Reference data, loaded at most once per Populator instance lifetime.
pub const STATIC_DATASET: &str = "static";

/// Full-refresh seed data, reloaded on every load that requests it.
pub const BASE_DATASET: &str = "base";

/// One CSV file bound to the table it holds rows for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    table: TableName,
    path: PathBuf,
}

impl DataFile {
    pub fn new(table: TableName, path: PathBuf) -> Self {
        Self { table, path }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A named, ordered collection of data files representing one load unit.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    files: Vec<DataFile>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, files: Vec<DataFile>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[DataFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Load-priority ordering for dataset names: `static` first, `base` second,
/// everything else lexicographically after.
pub fn compare_dataset_names(a: &str, b: &str) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

fn rank(name: &str) -> u8 {
    match name {
        STATIC_DATASET => 0,
        BASE_DATASET => 1,
        _ => 2,
    }
}

/// Immutable snapshot of the fixture directory tree, taken once per
/// operation.
#[derive(Debug)]
pub struct Datasets {
    root: PathBuf,
    datasets: Vec<Dataset>,
}

impl Datasets {
    /// Walk `root/<dataset>/<catalog>/<schema>/<table>.csv` into a snapshot.
    ///
    /// The reserved `static` and `base` datasets are synthesized as empty
    /// placeholders when absent from disk. Non-CSV files inside a schema
    /// directory are warned about and skipped, as are stray files where
    /// directories are expected.
    pub fn scan(root: &Path) -> CoreResult<Self> {
        if !root.is_dir() {
            return Err(CoreError::FixtureRootNotFound {
                path: root.display().to_string(),
            });
        }

        let mut datasets = Vec::new();
        for entry in read_dir_sorted(root)? {
            if !entry.is_dir() {
                log::warn!("Skipping stray file in fixture root: {}", entry.display());
                continue;
            }
            let name = dir_name(&entry)?;
            datasets.push(Dataset::new(name.as_str(), scan_dataset(&entry)?));
        }

        for reserved in [STATIC_DATASET, BASE_DATASET] {
            if !datasets.iter().any(|d| d.name() == reserved) {
                datasets.push(Dataset::new(reserved, Vec::new()));
            }
        }
        datasets.sort_by(|a, b| compare_dataset_names(a.name(), b.name()));

        Ok(Self {
            root: root.to_path_buf(),
            datasets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn all(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name() == name)
    }

    /// The conventional file location for one table's rows in one dataset.
    pub fn data_file_path(root: &Path, dataset: &str, table: &TableName) -> PathBuf {
        root.join(dataset)
            .join(table.catalog())
            .join(table.schema())
            .join(format!("{}.csv", table.table()))
    }

    /// Cross-check every table referenced by the named datasets against the
    /// target connection's table set. Fails fast naming the offending file,
    /// before any row is loaded.
    pub fn validate_all_tables_exist(
        &self,
        names: &[&str],
        known_tables: &BTreeSet<TableName>,
    ) -> CoreResult<()> {
        for name in names {
            let dataset = self
                .get(name)
                .ok_or_else(|| CoreError::DatasetNotFound {
                    name: name.to_string(),
                })?;
            for file in dataset.files() {
                if !known_tables.contains(file.table()) {
                    return Err(CoreError::MissingTable {
                        table: file.table().qualified_name(),
                        file: file.path().display().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn scan_dataset(dataset_dir: &Path) -> CoreResult<Vec<DataFile>> {
    let mut files = Vec::new();
    for catalog_dir in read_dir_sorted(dataset_dir)? {
        if !catalog_dir.is_dir() {
            log::warn!("Skipping stray file: {}", catalog_dir.display());
            continue;
        }
        let catalog = dir_name(&catalog_dir)?;
        for schema_dir in read_dir_sorted(&catalog_dir)? {
            if !schema_dir.is_dir() {
                log::warn!("Skipping stray file: {}", schema_dir.display());
                continue;
            }
            let schema = dir_name(&schema_dir)?;
            for file in read_dir_sorted(&schema_dir)? {
                if file.is_dir() || !file.extension().is_some_and(|e| e == "csv") {
                    log::warn!("Skipping non-CSV entry: {}", file.display());
                    continue;
                }
                let table = file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| CoreError::InvalidDataFilePath {
                        path: file.display().to_string(),
                    })?;
                files.push(DataFile::new(
                    TableName::new(catalog.as_str(), schema.as_str(), table),
                    file.clone(),
                ));
            }
        }
    }
    files.sort_by(|a, b| a.table().cmp(b.table()));
    Ok(files)
}

fn read_dir_sorted(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    paths.sort();
    Ok(paths)
}

fn dir_name(path: &Path) -> CoreResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| CoreError::InvalidDataFilePath {
            path: path.display().to_string(),
        })
}

#[cfg(test)]
#[path = "dataset_test.rs"]
mod dataset_test;
