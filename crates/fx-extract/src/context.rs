//! Request-scoped aggregation of row counts and the global row budget.

use fx_core::TableName;
use std::collections::{BTreeMap, BTreeSet};

/// What a download request should do with the rows it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Dry run: report what would be transferred without writing files.
    Count,
    /// Perform the transfer.
    Save,
}

/// Mutable, request-scoped aggregator shared by every table operation of
/// one bulk or structured download.
///
/// The `max_rows` budget is enforced cooperatively: each operation asks
/// [`take_budget`](Self::take_budget) before keeping fetched rows, skipped
/// rows are recorded per table, and once the budget is exhausted
/// `keep_running` flips false and the caller stops issuing operations.
/// Row counts are additive across calls against the same context.
#[derive(Debug)]
pub struct ExecutionContext {
    mode: DownloadMode,
    max_rows: Option<usize>,
    taken: usize,
    row_counts: BTreeMap<TableName, usize>,
    rows_skipped: BTreeMap<TableName, usize>,
    seen: BTreeSet<TableName>,
    keep_running: bool,
}

/// Per-table outcome of a download request.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub row_counts: BTreeMap<TableName, usize>,
    pub rows_skipped: BTreeMap<TableName, usize>,
    pub max_rows_reached: bool,
}

impl ExecutionContext {
    pub fn new(mode: DownloadMode, max_rows: Option<usize>) -> Self {
        Self {
            mode,
            max_rows,
            taken: 0,
            row_counts: BTreeMap::new(),
            rows_skipped: BTreeMap::new(),
            seen: BTreeSet::new(),
            keep_running: true,
        }
    }

    pub fn mode(&self) -> DownloadMode {
        self.mode
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running
    }

    /// Record that a table operation reached this table. Returns false when
    /// the table was already seen by this context, so bulk requests do not
    /// download the same table twice.
    pub fn mark_seen(&mut self, table: &TableName) -> bool {
        self.seen.insert(table.clone())
    }

    /// How many of `available` fetched rows may be kept. Rows beyond the
    /// remaining budget are recorded as skipped and stop the request.
    pub fn take_budget(&mut self, table: &TableName, available: usize) -> usize {
        if !self.keep_running {
            self.skip(table, available);
            return 0;
        }
        let take = match self.max_rows {
            None => available,
            Some(max) => available.min(max.saturating_sub(self.taken)),
        };
        self.taken += take;
        if take < available {
            self.skip(table, available - take);
            self.keep_running = false;
        }
        take
    }

    fn skip(&mut self, table: &TableName, count: usize) {
        if count > 0 {
            *self.rows_skipped.entry(table.clone()).or_insert(0) += count;
        }
    }

    /// Record rows actually transferred (or counted, in dry-run mode).
    pub fn record_rows(&mut self, table: &TableName, count: usize) {
        *self.row_counts.entry(table.clone()).or_insert(0) += count;
    }

    pub fn row_count(&self, table: &TableName) -> usize {
        self.row_counts.get(table).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> DownloadSummary {
        DownloadSummary {
            row_counts: self.row_counts.clone(),
            rows_skipped: self.rows_skipped.clone(),
            max_rows_reached: !self.keep_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(t: &str) -> TableName {
        TableName::new("main", "main", t)
    }

    #[test]
    fn test_unlimited_budget() {
        let mut ctx = ExecutionContext::new(DownloadMode::Save, None);
        assert_eq!(ctx.take_budget(&name("a"), 500), 500);
        assert!(ctx.keep_running());
        assert!(!ctx.summary().max_rows_reached);
    }

    #[test]
    fn test_budget_exhaustion_records_skips() {
        let mut ctx = ExecutionContext::new(DownloadMode::Save, Some(10));
        assert_eq!(ctx.take_budget(&name("a"), 7), 7);
        assert!(ctx.keep_running());
        assert_eq!(ctx.take_budget(&name("b"), 7), 3);
        assert!(!ctx.keep_running());

        let summary = ctx.summary();
        assert!(summary.max_rows_reached);
        assert_eq!(summary.rows_skipped[&name("b")], 4);

        // Later operations are refused outright.
        assert_eq!(ctx.take_budget(&name("c"), 5), 0);
        assert_eq!(ctx.summary().rows_skipped[&name("c")], 5);
    }

    #[test]
    fn test_row_counts_additive() {
        let mut ctx = ExecutionContext::new(DownloadMode::Count, None);
        ctx.record_rows(&name("a"), 3);
        ctx.record_rows(&name("a"), 2);
        assert_eq!(ctx.row_count(&name("a")), 5);
    }

    #[test]
    fn test_mark_seen() {
        let mut ctx = ExecutionContext::new(DownloadMode::Save, None);
        assert!(ctx.mark_seen(&name("a")));
        assert!(!ctx.mark_seen(&name("a")));
        assert!(ctx.mark_seen(&name("b")));
    }
}
