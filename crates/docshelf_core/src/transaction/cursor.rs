//! Forward cursors over stores and indexes.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::kv::OrderedKv;
use crate::layout;
use crate::types::StoreId;
use docshelf_codec::{from_cbor, Value};

/// One entry produced by a [`Cursor`].
#[derive(Debug, Clone, PartialEq)]
pub struct CursorEntry {
    /// The source key: the index key for index cursors, else the primary key.
    pub key: Key,
    /// The record's primary key.
    pub primary_key: Key,
    /// The record.
    pub value: Value,
}

enum Source<'t> {
    Store,
    Index(&'t OrderedKv),
}

/// A forward walk over physical entries.
pub struct Cursor<'t> {
    store: StoreId,
    source: Source<'t>,
    entries: Box<dyn Iterator<Item = (&'t [u8], &'t [u8])> + 't>,
}

impl<'t> Cursor<'t> {
    pub(crate) fn over_store(
        store: StoreId,
        entries: impl Iterator<Item = (&'t [u8], &'t [u8])> + 't,
    ) -> Self {
        Self {
            store,
            source: Source::Store,
            entries: Box::new(entries),
        }
    }

    pub(crate) fn over_index(
        kv: &'t OrderedKv,
        store: StoreId,
        entries: impl Iterator<Item = (&'t [u8], &'t [u8])> + 't,
    ) -> Self {
        Self {
            store,
            source: Source::Index(kv),
            entries: Box::new(entries),
        }
    }

    /// Whether the cursor walks an index.
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self.source, Source::Index(_))
    }

    /// Skips up to `n` entries without decoding them.
    ///
    /// Returns how many were skipped.
    pub fn advance(&mut self, n: usize) -> usize {
        let mut skipped = 0;
        while skipped < n && self.entries.next().is_some() {
            skipped += 1;
        }
        skipped
    }

    fn decode(&self, key: &[u8], value: &[u8]) -> CoreResult<CursorEntry> {
        match self.source {
            Source::Store => {
                let primary_key = layout::decode_record_key(key)?;
                Ok(CursorEntry {
                    key: primary_key.clone(),
                    primary_key,
                    value: from_cbor(value)?,
                })
            }
            Source::Index(kv) => {
                let (index_key, primary_key) = layout::decode_index_entry(key)?;
                let record = kv
                    .get(&layout::record_key(self.store, &primary_key))
                    .ok_or_else(|| {
                        CoreError::invalid_record(format!(
                            "index entry points at missing record {primary_key}"
                        ))
                    })?;
                Ok(CursorEntry {
                    key: index_key,
                    primary_key,
                    value: from_cbor(record)?,
                })
            }
        }
    }
}

impl Iterator for Cursor<'_> {
    type Item = CoreResult<CursorEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.entries.next()?;
        Some(self.decode(key, value))
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("store", &self.store)
            .field("index", &self.is_index())
            .finish_non_exhaustive()
    }
}
