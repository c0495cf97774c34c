//! Read transactions and cursors.
//!
//! A [`ReadTransaction`] holds the engine's read lock for as long as it
//! lives. Writers wait until every open transaction, and every cursor
//! borrowed from one, has been dropped.

mod cursor;

pub use cursor::{Cursor, CursorEntry};

use crate::catalog::{Catalog, StoreMeta};
use crate::engine::EngineState;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::layout;
use crate::query::{self, KeyRange, PageOptions, QueryFilter};
use docshelf_codec::{from_cbor, Value};
use parking_lot::RwLockReadGuard;

/// A consistent read view of the engine.
pub struct ReadTransaction<'e> {
    state: RwLockReadGuard<'e, EngineState>,
}

impl<'e> ReadTransaction<'e> {
    pub(crate) fn new(state: RwLockReadGuard<'e, EngineState>) -> Self {
        Self { state }
    }

    /// The catalog as of this transaction.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.state.catalog
    }

    /// Looks up a store.
    pub fn store(&self, name: &str) -> CoreResult<&StoreMeta> {
        self.state.catalog.require_store(name)
    }

    /// Reads one record.
    pub fn get(&self, store: &str, key: &Key) -> CoreResult<Option<Value>> {
        let meta = self.store(store)?;
        self.state
            .kv
            .get(&layout::record_key(meta.id, key))
            .map(from_cbor)
            .transpose()
            .map_err(CoreError::from)
    }

    /// Number of records in a store.
    pub fn count(&self, store: &str) -> CoreResult<usize> {
        let meta = self.store(store)?;
        let prefix = layout::record_prefix(meta.id);
        Ok(self.state.kv.range(layout::prefix_range(&prefix)).count())
    }

    /// Number of entries in one index.
    pub fn index_len(&self, store: &str, index: &str) -> CoreResult<usize> {
        let meta = self.store(store)?;
        let index_meta = meta.index(index).ok_or_else(|| CoreError::IndexNotFound {
            store: store.to_string(),
            index: index.to_string(),
        })?;
        let prefix = layout::index_prefix(meta.id, index_meta.id);
        Ok(self.state.kv.range(layout::prefix_range(&prefix)).count())
    }

    /// Opens a cursor over `range` of a store, or of one of its indexes.
    ///
    /// Entries come in ascending key order; index entries sharing a key
    /// come in primary key order.
    pub fn cursor(
        &self,
        store: &str,
        index: Option<&str>,
        range: &KeyRange,
    ) -> CoreResult<Cursor<'_>> {
        let meta = self.store(store)?;
        let (lower, upper) = range.bounds();
        match index {
            None => {
                let prefix = layout::record_prefix(meta.id);
                let entries = self.state.kv.range(layout::key_range(&prefix, lower, upper));
                Ok(Cursor::over_store(meta.id, entries))
            }
            Some(name) => {
                let index_meta = meta.index(name).ok_or_else(|| CoreError::IndexNotFound {
                    store: store.to_string(),
                    index: name.to_string(),
                })?;
                let prefix = layout::index_prefix(meta.id, index_meta.id);
                let entries = self.state.kv.range(layout::key_range(&prefix, lower, upper));
                Ok(Cursor::over_index(&self.state.kv, meta.id, entries))
            }
        }
    }

    /// Runs a filter over a store or index and returns one page of records.
    pub fn query(
        &self,
        store: &str,
        filter: &QueryFilter,
        index: Option<&str>,
        page: PageOptions,
    ) -> CoreResult<Vec<Value>> {
        query::execute(self, store, filter, index, page)
    }
}

impl std::fmt::Debug for ReadTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTransaction")
            .field("stores", &self.state.catalog.stores.len())
            .finish_non_exhaustive()
    }
}
