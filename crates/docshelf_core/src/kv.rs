//! Ordered key-value substrate.
//!
//! An in-memory `BTreeMap` rebuilt from the commit log on open. Writes go
//! to the log first and are applied to the map only once the frame is
//! appended, so the map never holds state the log cannot reproduce.
//!
//! Overwrites and deletes leave dead frames behind. [`OrderedKv::compact`]
//! rewrites the log as one put per live key.

use crate::error::CoreResult;
use crate::stats::CompactionReport;
use crate::log::{CommitLog, LogBatch, LogOp, ReplayOutcome};
use docshelf_storage::StorageBackend;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Approximate framing cost of one put in a rewritten log.
const ENTRY_OVERHEAD: u64 = 8;

/// Byte range over physical keys.
pub type ByteRange = (Bound<Vec<u8>>, Bound<Vec<u8>>);

/// Ordered map of physical keys backed by a commit log.
#[derive(Debug)]
pub struct OrderedKv {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    live_bytes: u64,
    log: CommitLog,
    replay: ReplayOutcome,
}

impl OrderedKv {
    /// Opens the substrate, replaying the existing log.
    pub fn open(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> CoreResult<Self> {
        let mut log = CommitLog::new(backend, sync_on_commit);
        let mut map = BTreeMap::new();
        let mut live_bytes = 0;
        let replay = log.replay(|batch| {
            apply(&mut map, &mut live_bytes, &batch);
            Ok(())
        })?;
        tracing::debug!(
            frames = replay.frames,
            keys = map.len(),
            "replayed commit log"
        );
        Ok(Self {
            map,
            live_bytes,
            log,
            replay,
        })
    }

    /// Reads one key.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    /// Iterates over keys in `range`, in ascending order.
    ///
    /// An empty or inverted range yields nothing.
    pub fn range(&self, range: ByteRange) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        let live = !is_empty_range(&range);
        let iter = live.then(|| self.map.range(range));
        iter.into_iter()
            .flatten()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Whether any key lies in `range`.
    #[must_use]
    pub fn any_in(&self, range: ByteRange) -> bool {
        self.range(range).next().is_some()
    }

    /// Logs `batch` and applies it.
    pub fn commit(&mut self, batch: &LogBatch) -> CoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.log.append(batch)?;
        apply(&mut self.map, &mut self.live_bytes, batch);
        Ok(())
    }

    /// Approximate size of the log after a compaction.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    /// Log bytes that a compaction would reclaim, approximately.
    pub fn dead_bytes(&self) -> CoreResult<u64> {
        Ok(self.log.size()?.saturating_sub(self.live_bytes))
    }

    /// Whether the log carries at least `threshold` dead bytes and more
    /// dead bytes than live ones.
    pub fn needs_compaction(&self, threshold: u64) -> CoreResult<bool> {
        let dead = self.dead_bytes()?;
        Ok(dead >= threshold && dead > self.live_bytes)
    }

    /// Rewrites the log to hold only the live keys.
    pub fn compact(&mut self) -> CoreResult<CompactionReport> {
        let bytes_before = self.log.size()?;
        let bytes_after = self.log.rewrite(
            self.map
                .iter()
                .map(|(k, v)| (k.as_slice(), v.as_slice())),
        )?;
        tracing::debug!(
            bytes_before,
            bytes_after,
            keys = self.map.len(),
            "compacted commit log"
        );
        Ok(CompactionReport {
            bytes_before,
            bytes_after,
        })
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// What the last replay found.
    #[must_use]
    pub fn replay_outcome(&self) -> &ReplayOutcome {
        &self.replay
    }

    /// Current log size in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Flushes the log.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.log.flush()
    }

    /// Syncs the log to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.log.sync()
    }
}

fn entry_bytes(key: &[u8], value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64 + ENTRY_OVERHEAD
}

fn apply(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, live: &mut u64, batch: &LogBatch) {
    for op in batch.ops() {
        match op {
            LogOp::Put { key, value } => {
                if let Some(old) = map.insert(key.clone(), value.clone()) {
                    *live = live.saturating_sub(entry_bytes(key, &old));
                }
                *live += entry_bytes(key, value);
            }
            LogOp::Delete { key } => {
                if let Some(old) = map.remove(key) {
                    *live = live.saturating_sub(entry_bytes(key, &old));
                }
            }
            LogOp::DeleteRange { start, end } => {
                if start >= end {
                    continue;
                }
                let doomed: Vec<Vec<u8>> = map
                    .range::<Vec<u8>, _>((Bound::Included(start), Bound::Excluded(end)))
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in doomed {
                    if let Some(old) = map.remove(&key) {
                        *live = live.saturating_sub(entry_bytes(&key, &old));
                    }
                }
            }
        }
    }
}

/// `BTreeMap::range` panics on inverted bounds and on equal excluded
/// bounds; such ranges are simply empty here.
fn is_empty_range(range: &ByteRange) -> bool {
    match (&range.0, &range.1) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_storage::InMemoryBackend;

    fn kv() -> OrderedKv {
        OrderedKv::open(Box::new(InMemoryBackend::new()), false).unwrap()
    }

    fn put_all(kv: &mut OrderedKv, keys: &[&[u8]]) {
        let mut batch = LogBatch::new();
        for key in keys {
            batch.put(key.to_vec(), b"v".to_vec());
        }
        kv.commit(&batch).unwrap();
    }

    #[test]
    fn commit_and_get() {
        let mut kv = kv();
        put_all(&mut kv, &[b"a", b"b"]);
        assert_eq!(kv.get(b"a"), Some(&b"v"[..]));
        assert_eq!(kv.get(b"z"), None);
        assert_eq!(kv.len(), 2);
    }

    #[test]
    fn range_bounds() {
        let mut kv = kv();
        put_all(&mut kv, &[b"a", b"b", b"c", b"d"]);

        let got: Vec<Vec<u8>> = kv
            .range((Bound::Excluded(b"a".to_vec()), Bound::Included(b"c".to_vec())))
            .map(|(k, _)| k.to_vec())
            .collect();
        assert_eq!(got, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut kv = kv();
        put_all(&mut kv, &[b"a", b"b"]);
        let range = (Bound::Included(b"b".to_vec()), Bound::Excluded(b"a".to_vec()));
        assert!(!kv.any_in(range));
        let range = (Bound::Excluded(b"a".to_vec()), Bound::Excluded(b"a".to_vec()));
        assert!(!kv.any_in(range));
    }

    #[test]
    fn delete_range_is_half_open() {
        let mut kv = kv();
        put_all(&mut kv, &[b"a", b"b", b"c"]);
        let mut batch = LogBatch::new();
        batch.delete_range(b"a".to_vec(), b"c".to_vec());
        kv.commit(&batch).unwrap();

        let left: Vec<Vec<u8>> = kv
            .range((Bound::Unbounded, Bound::Unbounded))
            .map(|(k, _)| k.to_vec())
            .collect();
        assert_eq!(left, vec![b"c".to_vec()]);
    }

    #[test]
    fn reopen_replays_log() {
        let backend = InMemoryBackend::new();
        let mut kv = OrderedKv::open(Box::new(backend.clone()), false).unwrap();
        put_all(&mut kv, &[b"x", b"y"]);
        let mut batch = LogBatch::new();
        batch.delete(b"x".to_vec());
        kv.commit(&batch).unwrap();
        drop(kv);

        let kv = OrderedKv::open(Box::new(backend), false).unwrap();
        assert_eq!(kv.get(b"x"), None);
        assert_eq!(kv.get(b"y"), Some(&b"v"[..]));
        assert_eq!(kv.replay_outcome().frames, 2);
    }

    #[test]
    fn live_bytes_follow_the_map() {
        let mut kv = kv();
        put_all(&mut kv, &[b"a", b"b"]);
        assert_eq!(kv.live_bytes(), 2 * (2 + ENTRY_OVERHEAD));
        put_all(&mut kv, &[b"a"]);
        assert_eq!(kv.live_bytes(), 2 * (2 + ENTRY_OVERHEAD));

        let mut batch = LogBatch::new();
        batch.delete(b"a".to_vec());
        kv.commit(&batch).unwrap();
        assert_eq!(kv.live_bytes(), 2 + ENTRY_OVERHEAD);
    }

    #[test]
    fn compaction_keeps_state_and_shrinks_log() {
        let backend = InMemoryBackend::new();
        let mut kv = OrderedKv::open(Box::new(backend.clone()), false).unwrap();
        for _ in 0..50 {
            put_all(&mut kv, &[b"hot", b"cold"]);
        }
        let mut batch = LogBatch::new();
        batch.delete(b"cold".to_vec());
        kv.commit(&batch).unwrap();
        assert!(kv.needs_compaction(64).unwrap());
        assert!(!kv.needs_compaction(u64::MAX).unwrap());

        let report = kv.compact().unwrap();
        assert!(report.bytes_after < report.bytes_before);
        assert_eq!(kv.log_size().unwrap(), report.bytes_after);
        assert!(!kv.needs_compaction(64).unwrap());
        drop(kv);

        let kv = OrderedKv::open(Box::new(backend), false).unwrap();
        assert_eq!(kv.get(b"hot"), Some(&b"v"[..]));
        assert_eq!(kv.get(b"cold"), None);
        assert_eq!(kv.len(), 1);
        assert_eq!(kv.replay_outcome().frames, 1);
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let mut kv = kv();
        kv.commit(&LogBatch::new()).unwrap();
        assert_eq!(kv.log_size().unwrap(), 0);
    }
}
