//! Engine statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters, updated without taking the engine lock.
#[derive(Debug, Default)]
pub struct EngineStats {
    puts: AtomicU64,
    gets: AtomicU64,
    misses: AtomicU64,
    deletes: AtomicU64,
    clears: AtomicU64,
    queries: AtomicU64,
    rows_returned: AtomicU64,
    compactions: AtomicU64,
}

impl EngineStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self, found: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if !found {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query(&self, rows: usize) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.rows_returned.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records written.
    pub puts: u64,
    /// Point reads.
    pub gets: u64,
    /// Point reads that found nothing.
    pub misses: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Stores cleared.
    pub clears: u64,
    /// Queries and searches run.
    pub queries: u64,
    /// Records returned by queries.
    pub rows_returned: u64,
    /// Commit log compactions, automatic ones included.
    pub compactions: u64,
}

/// Commit log size around one compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Log size before.
    pub bytes_before: u64,
    /// Log size after.
    pub bytes_after: u64,
}

impl CompactionReport {
    /// Bytes reclaimed.
    #[must_use]
    pub fn reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Shape and size of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    /// Store name.
    pub name: String,
    /// Primary key path.
    pub key_path: String,
    /// Whether keys are generated.
    pub auto_increment: bool,
    /// Number of records.
    pub records: usize,
    /// Indexes in creation order.
    pub indexes: Vec<IndexSummary>,
}

/// Shape and size of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,
    /// Indexed path.
    pub key_path: String,
    /// Uniqueness.
    pub unique: bool,
    /// Number of entries.
    pub entries: usize,
}
