//! Streams query results into one dataset CSV file.
//!
//! First download of a table writes a fresh file whose header comes from
//! the query metadata (binary columns suffixed `*b64`). Subsequent
//! downloads append: the existing header is authoritative, freshly
//! introspected columns are matched to it by name, and file columns the
//! query no longer produces are written as empty cells so the column order
//! stays stable across schema drift. In append mode a [`PkTracker`] seeded
//! from the file's rows drops tuples already present, so re-running a
//! download merges only newly-inserted source rows.

use crate::context::DownloadMode;
use crate::error::{ExtractError, ExtractResult};
use crate::tracker::PkTracker;
use fx_core::{encode_cell, header_name, parse_header_name, Datasets, Table, Value};
use fx_db::SelectedColumn;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Row totals for one downloaded file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOutcome {
    pub rows_written: usize,
    pub rows_deduped: usize,
}

/// Writes or extends one CSV file for one table in one dataset.
pub struct TableDownloader<'a> {
    table: &'a Table,
    path: PathBuf,
    mode: DownloadMode,
    existing_header: Option<Vec<String>>,
    tracker: Option<PkTracker>,
    projection: Option<Vec<Option<usize>>>,
    writer: Option<csv::Writer<File>>,
    prepared: bool,
    outcome: DownloadOutcome,
}

impl<'a> TableDownloader<'a> {
    /// Bind a downloader to `root/dataset/...csv` for `table`. An existing
    /// file switches the downloader into append mode and seeds the dedup
    /// tracker from its rows.
    pub fn open(
        root: &Path,
        dataset: &str,
        table: &'a Table,
        mode: DownloadMode,
    ) -> ExtractResult<Self> {
        let path = Datasets::data_file_path(root, dataset, table.name());
        let mut existing_header = None;
        let mut tracker = None;

        if path.exists() {
            let mut reader = csv::Reader::from_path(&path).map_err(|e| csv_err(&path, e))?;
            let header: Vec<String> = reader
                .headers()
                .map_err(|e| csv_err(&path, e))?
                .iter()
                .map(String::from)
                .collect();

            let pk_columns = table.primary_key_columns();
            if !pk_columns.is_empty() {
                let positions: Option<Vec<usize>> = pk_columns
                    .iter()
                    .map(|key| header.iter().position(|h| parse_header_name(h).0 == key))
                    .collect();
                match positions {
                    Some(positions) => {
                        let mut seeded = PkTracker::new(positions);
                        for record in reader.records() {
                            let record = record.map_err(|e| csv_err(&path, e))?;
                            let cells: Vec<String> = record.iter().map(String::from).collect();
                            seeded.insert(&cells);
                        }
                        tracker = Some(seeded);
                    }
                    None => log::warn!(
                        "Primary key of {} not present in {}; dedup disabled",
                        table.name().qualified_name(),
                        path.display()
                    ),
                }
            }
            existing_header = Some(header);
        }

        Ok(Self {
            table,
            path,
            mode,
            existing_header,
            tracker,
            projection: None,
            writer: None,
            prepared: false,
            outcome: DownloadOutcome::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when extending a previously downloaded file.
    pub fn appending(&self) -> bool {
        self.existing_header.is_some()
    }

    /// Write one batch of rows. Returns how many survived dedup.
    pub fn write(
        &mut self,
        columns: &[SelectedColumn],
        rows: &[Vec<Value>],
    ) -> ExtractResult<usize> {
        if !self.prepared {
            self.prepare(columns)?;
        }

        let mut kept = 0;
        for row in rows {
            let cells: Vec<String> = match &self.projection {
                Some(projection) => projection
                    .iter()
                    .map(|source| match source {
                        Some(i) => encode_cell(self.table.name(), &columns[*i].name, &row[*i]),
                        None => String::new(),
                    })
                    .collect(),
                None => columns
                    .iter()
                    .map(|c| encode_cell(self.table.name(), &c.name, &row[c.position]))
                    .collect(),
            };

            if let Some(tracker) = &mut self.tracker {
                if !tracker.insert(&cells) {
                    self.outcome.rows_deduped += 1;
                    continue;
                }
            }

            if let Some(writer) = &mut self.writer {
                writer
                    .write_record(&cells)
                    .map_err(|e| csv_err(&self.path, e))?;
            }
            kept += 1;
            self.outcome.rows_written += 1;
        }
        Ok(kept)
    }

    /// Flush and report totals.
    pub fn finish(mut self) -> ExtractResult<DownloadOutcome> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| io_err(&self.path, e))?;
        }
        Ok(self.outcome)
    }

    fn prepare(&mut self, columns: &[SelectedColumn]) -> ExtractResult<()> {
        match &self.existing_header {
            Some(header) => {
                let projection: Vec<Option<usize>> = header
                    .iter()
                    .map(|h| {
                        columns
                            .iter()
                            .position(|c| header_name(&c.name, c.binary) == *h)
                    })
                    .collect();
                for (name, source) in header.iter().zip(&projection) {
                    if source.is_none() {
                        log::warn!(
                            "Column '{name}' of {} is no longer selected; writing empty cells",
                            self.path.display()
                        );
                    }
                }
                self.projection = Some(projection);
                if self.mode == DownloadMode::Save {
                    let file = OpenOptions::new()
                        .append(true)
                        .open(&self.path)
                        .map_err(|e| io_err(&self.path, e))?;
                    self.writer = Some(csv::Writer::from_writer(file));
                }
            }
            None => {
                if self.mode == DownloadMode::Save {
                    if let Some(parent) = self.path.parent() {
                        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                    }
                    let mut writer =
                        csv::Writer::from_path(&self.path).map_err(|e| csv_err(&self.path, e))?;
                    let header: Vec<String> = columns
                        .iter()
                        .map(|c| header_name(&c.name, c.binary))
                        .collect();
                    writer
                        .write_record(&header)
                        .map_err(|e| csv_err(&self.path, e))?;
                    self.writer = Some(writer);
                }
            }
        }
        self.prepared = true;
        Ok(())
    }
}

fn csv_err(path: &Path, source: csv::Error) -> ExtractError {
    ExtractError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
#[path = "downloader_test.rs"]
mod downloader_test;
