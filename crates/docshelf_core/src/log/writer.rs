//! Commit log writer and replay.

use super::record::{compute_crc32, FrameKind, LogBatch, CRC_SIZE, HEADER_SIZE, LOG_FORMAT, LOG_MAGIC};
use crate::error::{CoreError, CoreResult};
use docshelf_storage::StorageBackend;

/// Summary of a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Frames replayed.
    pub frames: u64,
    /// Valid bytes kept.
    pub valid_bytes: u64,
    /// Bytes of a torn tail that were cut off.
    pub truncated_bytes: u64,
}

/// Keyspace bytes carried by one frame of a rewritten log.
const REWRITE_FRAME_BYTES: usize = 4 << 20;

/// Append-only log of write batches.
pub struct CommitLog {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl CommitLog {
    /// Wraps a storage backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    /// Appends one batch as a single frame.
    ///
    /// Returns the offset of the frame. When the append or the following
    /// flush fails, the log is cut back to where the frame started so a
    /// later append cannot land behind a partial frame.
    pub fn append(&mut self, batch: &LogBatch) -> CoreResult<u64> {
        let frame = batch.encode_frame()?;
        let start = self.backend.size()?;
        let written = self.backend.append(&frame).and_then(|offset| {
            if self.sync_on_commit {
                self.backend.sync()?;
            } else {
                self.backend.flush()?;
            }
            Ok(offset)
        });
        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(undo) = self.backend.truncate(start) {
                    tracing::warn!(offset = start, error = %undo, "could not cut back a failed append");
                }
                Err(err.into())
            }
        }
    }

    /// Replaces the whole log with frames that put every `(key, value)`
    /// entry, in order. Replaying the result from an empty keyspace yields
    /// exactly those entries.
    ///
    /// The swap is atomic: if it fails, the old log is still in place.
    /// Returns the new log size.
    pub fn rewrite<'a, I>(&mut self, entries: I) -> CoreResult<u64>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let mut data = Vec::new();
        let mut batch = LogBatch::new();
        let mut carried = 0usize;
        for (key, value) in entries {
            carried += key.len() + value.len();
            batch.put(key.to_vec(), value.to_vec());
            if carried >= REWRITE_FRAME_BYTES {
                data.extend_from_slice(&batch.encode_frame()?);
                batch = LogBatch::new();
                carried = 0;
            }
        }
        if !batch.is_empty() {
            data.extend_from_slice(&batch.encode_frame()?);
        }
        self.backend.replace(&data)?;
        Ok(data.len() as u64)
    }

    /// Reads every batch from the start of the log, handing each to `apply`.
    ///
    /// A torn frame at the end of the log (left by a crash mid-append) is cut
    /// off. A damaged frame followed by more data fails the replay.
    pub fn replay<F>(&mut self, mut apply: F) -> CoreResult<ReplayOutcome>
    where
        F: FnMut(LogBatch) -> CoreResult<()>,
    {
        let data = self.backend.read_all()?;
        let total = data.len();
        let mut outcome = ReplayOutcome::default();
        let mut pos = 0usize;

        while pos < total {
            match parse_frame(&data[pos..]) {
                Frame::Valid { payload, size } => {
                    let batch = LogBatch::decode_payload(payload)
                        .map_err(|e| CoreError::log_corruption(pos as u64, e.to_string()))?;
                    apply(batch)?;
                    outcome.frames += 1;
                    pos += size;
                }
                Frame::Torn => {
                    let cut = (total - pos) as u64;
                    tracing::warn!(
                        offset = pos,
                        bytes = cut,
                        "truncating torn tail of commit log"
                    );
                    self.backend.truncate(pos as u64)?;
                    outcome.truncated_bytes = cut;
                    break;
                }
                Frame::Corrupt(message) => {
                    return Err(CoreError::log_corruption(pos as u64, message));
                }
            }
        }

        outcome.valid_bytes = pos as u64;
        Ok(outcome)
    }

    /// Flushes buffered writes.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Flushes and syncs to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

enum Frame<'a> {
    Valid { payload: &'a [u8], size: usize },
    Torn,
    Corrupt(String),
}

fn parse_frame(data: &[u8]) -> Frame<'_> {
    if data.len() < HEADER_SIZE {
        return Frame::Torn;
    }
    if data[0..4] != LOG_MAGIC {
        // Zero fill past the last write is a torn tail too.
        if data.iter().all(|&b| b == 0) {
            return Frame::Torn;
        }
        return Frame::Corrupt("bad frame magic".to_string());
    }
    let format = u16::from_le_bytes([data[4], data[5]]);
    if format != LOG_FORMAT {
        return Frame::Corrupt(format!("unsupported log format {format}"));
    }
    let len = u32::from_le_bytes([data[7], data[8], data[9], data[10]]) as usize;
    let size = HEADER_SIZE + len + CRC_SIZE;
    if data.len() < size {
        return Frame::Torn;
    }
    let crc_at = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        data[crc_at],
        data[crc_at + 1],
        data[crc_at + 2],
        data[crc_at + 3],
    ]);
    if compute_crc32(&data[..crc_at]) != stored {
        if data.len() == size {
            return Frame::Torn;
        }
        return Frame::Corrupt("checksum mismatch".to_string());
    }
    if FrameKind::from_byte(data[6]).is_none() {
        return Frame::Corrupt(format!("unknown frame kind {}", data[6]));
    }
    Frame::Valid {
        payload: &data[HEADER_SIZE..crc_at],
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_storage::InMemoryBackend;

    fn batch(n: u8) -> LogBatch {
        let mut batch = LogBatch::new();
        batch.put(vec![n], vec![n, n]);
        batch
    }

    fn collect(log: &mut CommitLog) -> CoreResult<(Vec<LogBatch>, ReplayOutcome)> {
        let mut batches = Vec::new();
        let outcome = log.replay(|b| {
            batches.push(b);
            Ok(())
        })?;
        Ok((batches, outcome))
    }

    #[test]
    fn append_then_replay() {
        let mut log = CommitLog::new(Box::new(InMemoryBackend::new()), false);
        log.append(&batch(1)).unwrap();
        log.append(&batch(2)).unwrap();

        let (batches, outcome) = collect(&mut log).unwrap();
        assert_eq!(batches, vec![batch(1), batch(2)]);
        assert_eq!(outcome.frames, 2);
        assert_eq!(outcome.truncated_bytes, 0);
        assert_eq!(outcome.valid_bytes, log.size().unwrap());
    }

    #[test]
    fn torn_tail_is_truncated() {
        let first = batch(1).encode_frame().unwrap();
        let second = batch(2).encode_frame().unwrap();
        let mut data = first.clone();
        data.extend_from_slice(&second[..second.len() - 3]);

        let mut log = CommitLog::new(Box::new(InMemoryBackend::with_data(data)), false);
        let (batches, outcome) = collect(&mut log).unwrap();
        assert_eq!(batches, vec![batch(1)]);
        assert_eq!(outcome.truncated_bytes, (second.len() - 3) as u64);
        assert_eq!(log.size().unwrap(), first.len() as u64);
    }

    #[test]
    fn bad_checksum_on_last_frame_is_torn() {
        let mut data = batch(1).encode_frame().unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let mut log = CommitLog::new(Box::new(InMemoryBackend::with_data(data)), false);
        let (batches, _) = collect(&mut log).unwrap();
        assert!(batches.is_empty());
        assert_eq!(log.size().unwrap(), 0);
    }

    #[test]
    fn corruption_before_valid_data_fails() {
        let mut data = batch(1).encode_frame().unwrap();
        data[HEADER_SIZE] ^= 0xFF;
        data.extend_from_slice(&batch(2).encode_frame().unwrap());

        let mut log = CommitLog::new(Box::new(InMemoryBackend::with_data(data)), false);
        let err = collect(&mut log).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset: 0, .. }));
    }

    #[test]
    fn zero_fill_is_torn() {
        let mut data = batch(1).encode_frame().unwrap();
        let valid = data.len();
        data.extend_from_slice(&[0u8; 32]);

        let mut log = CommitLog::new(Box::new(InMemoryBackend::with_data(data)), false);
        let (batches, _) = collect(&mut log).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(log.size().unwrap(), valid as u64);
    }

    #[test]
    fn rewrite_replays_to_the_given_entries() {
        let backend = InMemoryBackend::new();
        let mut log = CommitLog::new(Box::new(backend.clone()), false);
        for n in 0..20 {
            log.append(&batch(n % 2)).unwrap();
        }
        let before = log.size().unwrap();

        let entries: Vec<(Vec<u8>, Vec<u8>)> = vec![(vec![0], vec![0, 0]), (vec![1], vec![1, 1])];
        let after = log
            .rewrite(entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))
            .unwrap();
        assert!(after < before);
        assert_eq!(backend.size().unwrap(), after);

        let (batches, outcome) = collect(&mut log).unwrap();
        assert_eq!(outcome.frames, 1);
        let mut expected = LogBatch::new();
        expected.put(vec![0], vec![0, 0]);
        expected.put(vec![1], vec![1, 1]);
        assert_eq!(batches, vec![expected]);

        log.append(&batch(9)).unwrap();
        assert_eq!(collect(&mut log).unwrap().1.frames, 2);
    }

    #[test]
    fn rewrite_of_nothing_empties_the_log() {
        let mut log = CommitLog::new(Box::new(InMemoryBackend::new()), false);
        log.append(&batch(1)).unwrap();
        assert_eq!(log.rewrite(std::iter::empty()).unwrap(), 0);
        assert_eq!(log.size().unwrap(), 0);
    }

    #[test]
    fn garbage_is_corruption() {
        let mut data = batch(1).encode_frame().unwrap();
        data.extend_from_slice(b"not a frame at all, definitely");

        let mut log = CommitLog::new(Box::new(InMemoryBackend::with_data(data)), false);
        assert!(collect(&mut log).is_err());
    }
}
