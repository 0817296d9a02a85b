//! Primary-key dedup tracking for incremental downloads.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Tracks the primary-key tuples already present in a CSV file so that
/// re-running a download appends only newly-inserted source rows.
///
/// Tuples are compared through a SHA-256 digest of their encoded CSV
/// cells, length-prefixed per cell so `("ab","c")` and `("a","bc")`
/// cannot collide.
#[derive(Debug)]
pub struct PkTracker {
    positions: Vec<usize>,
    seen: HashSet<String>,
}

impl PkTracker {
    /// `positions` index the primary-key cells within a row laid out in
    /// the CSV file's column order.
    pub fn new(positions: Vec<usize>) -> Self {
        Self {
            positions,
            seen: HashSet::new(),
        }
    }

    /// Record one row's tuple. Returns true when the tuple was not seen
    /// before.
    pub fn insert(&mut self, cells: &[String]) -> bool {
        let digest = self.digest(cells);
        self.seen.insert(digest)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn digest(&self, cells: &[String]) -> String {
        let mut hasher = Sha256::new();
        for &position in &self.positions {
            let cell = cells.get(position).map(String::as_str).unwrap_or("");
            hasher.update((cell.len() as u64).to_be_bytes());
            hasher.update(cell.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
