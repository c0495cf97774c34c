//! Engine handle.

use crate::catalog::{Catalog, StoreMeta};
use crate::config::Config;
#[cfg(feature = "std")]
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::fulltext::build_full_text;
use crate::key::{encode_key, Key};
use crate::kv::OrderedKv;
use crate::layout;
use crate::log::LogBatch;
use crate::migration::{self, MigrationOperation};
use crate::query::{PageOptions, QueryFilter};
use crate::schema::{SchemaBuilder, FULLTEXT_FIELD, FULLTEXT_INDEX};
use crate::stats::{CompactionReport, EngineStats, IndexSummary, StatsSnapshot, StoreSummary};
use crate::transaction::ReadTransaction;
use crate::verify::{verify_state, VerifyReport};
use docshelf_codec::{from_cbor, to_cbor, Value};
use docshelf_storage::{InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use std::path::Path;

/// Largest generated key; keys stay exactly representable as numbers.
const MAX_GENERATED_KEY: u64 = 1 << 53;

pub(crate) struct EngineState {
    pub(crate) catalog: Catalog,
    pub(crate) kv: OrderedKv,
}

/// An open document store.
///
/// Opening runs the migration pass for the registered schema; afterwards
/// every write commits as one atomic log batch under the write lock, and
/// every read runs under the read lock. `Engine` is `Send + Sync`, so it
/// can be shared through an `Arc`.
///
/// ```rust
/// use docshelf_core::{Config, Engine, Key, QueryFilter, SchemaBuilder, StoreDefinition};
/// use docshelf_codec::Value;
///
/// let mut schema = SchemaBuilder::new();
/// schema.ensure_store(
///     "users",
///     StoreDefinition::new("id")?.unique_index("email", "email")?,
/// );
/// let engine = Engine::open(Config::default(), schema)?;
///
/// engine.put(
///     "users",
///     Value::map([("id", Value::from("1")), ("name", Value::from("Ana"))]),
/// )?;
/// let hits = engine.search("users", "ana", None, None)?;
/// assert_eq!(hits.len(), 1);
/// assert!(engine.get("users", &Key::from("1"))?.is_some());
/// # Ok::<(), docshelf_core::CoreError>(())
/// ```
pub struct Engine {
    config: Config,
    #[cfg(feature = "std")]
    dir: Option<DatabaseDir>,
    state: RwLock<EngineState>,
    migrations: Vec<MigrationOperation>,
    stats: EngineStats,
}

impl Engine {
    /// Opens the database described by `config` and migrates it to `schema`.
    ///
    /// Without a data directory the database lives in memory. Any failure
    /// other than a malformed configuration or schema is reported as
    /// [`CoreError::StorageUnavailable`].
    pub fn open(config: Config, schema: SchemaBuilder) -> CoreResult<Self> {
        config.validate()?;
        match config.data_dir.clone() {
            #[cfg(feature = "std")]
            Some(data_dir) => {
                let opened = DatabaseDir::open(&data_dir, &config.name).and_then(|dir| {
                    let backend = dir.open_log()?;
                    Ok((dir, backend))
                });
                let (dir, backend) = opened.map_err(CoreError::into_unavailable)?;
                let mut engine = Self::open_with_backend(config, Box::new(backend), schema)?;
                engine.dir = Some(dir);
                Ok(engine)
            }
            #[cfg(not(feature = "std"))]
            Some(_) => Err(CoreError::invalid_config(
                "file-backed databases need the `std` feature",
            )),
            None => Self::open_with_backend(config, Box::new(InMemoryBackend::new()), schema),
        }
    }

    /// Opens an in-memory database with default settings.
    pub fn open_in_memory(schema: SchemaBuilder) -> CoreResult<Self> {
        Self::open(Config::default(), schema)
    }

    /// Opens a database whose commit log lives in `backend`.
    ///
    /// `config.data_dir` is ignored.
    pub fn open_with_backend(
        config: Config,
        backend: Box<dyn StorageBackend>,
        schema: SchemaBuilder,
    ) -> CoreResult<Self> {
        config.validate()?;
        let (mut state, migrations) =
            Self::recover(&config, backend, &schema).map_err(CoreError::into_unavailable)?;
        let stats = EngineStats::new();
        compact_if_due(&config, &stats, &mut state.kv);
        tracing::info!(
            name = %config.name,
            version = state.catalog.version,
            stores = state.catalog.stores.len(),
            frames = state.kv.replay_outcome().frames,
            "opened database"
        );
        Ok(Self {
            config,
            #[cfg(feature = "std")]
            dir: None,
            state: RwLock::new(state),
            migrations,
            stats,
        })
    }

    fn recover(
        config: &Config,
        backend: Box<dyn StorageBackend>,
        schema: &SchemaBuilder,
    ) -> CoreResult<(EngineState, Vec<MigrationOperation>)> {
        let mut kv = OrderedKv::open(backend, config.sync_on_commit)?;
        let mut catalog = match kv.get(layout::CATALOG_KEY) {
            Some(bytes) => Catalog::decode(bytes)?,
            None => Catalog::new(),
        };
        let ops = migration::plan(&catalog, schema, config.version)?;
        migration::apply(&ops, schema, &mut catalog, &mut kv)?;
        Ok((EngineState { catalog, kv }, ops))
    }

    /// The configuration the engine was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of a file-backed database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        #[cfg(feature = "std")]
        {
            self.dir.as_ref().map(DatabaseDir::path)
        }
        #[cfg(not(feature = "std"))]
        {
            None
        }
    }

    /// Stored schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.read().catalog.version
    }

    /// Operations the open-time migration applied. Empty when storage
    /// already matched the schema.
    #[must_use]
    pub fn applied_migrations(&self) -> &[MigrationOperation] {
        &self.migrations
    }

    /// Names of all stores, in creation order.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state
            .read()
            .catalog
            .stores
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Names of the indexes of `store`, in creation order.
    pub fn index_names(&self, store: &str) -> CoreResult<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .catalog
            .require_store(store)?
            .indexes
            .iter()
            .map(|i| i.name.clone())
            .collect())
    }

    /// Starts a read transaction.
    ///
    /// Writers block until it, and any cursor borrowed from it, is dropped.
    pub fn read(&self) -> ReadTransaction<'_> {
        ReadTransaction::new(self.state.read())
    }

    /// Inserts or replaces a record, returning its primary key.
    ///
    /// The record gains a fresh full-text field. On an auto-increment store
    /// a record without a key is given the next generated one, written back
    /// into the record at the key path.
    pub fn put(&self, store: &str, mut record: Value) -> CoreResult<Key> {
        if !record.is_map() {
            return Err(CoreError::invalid_record(format!(
                "records must be maps, got {}",
                record.type_name()
            )));
        }

        let mut state = self.state.write();
        let EngineState { catalog, kv } = &mut *state;
        let meta = catalog.require_store(store)?;
        let mut batch = LogBatch::new();

        let pk = assign_primary_key(kv, meta, &mut record, &mut batch)?;
        let blob = build_full_text(&record, Some(meta.key_path.as_str()));
        record.insert(FULLTEXT_FIELD, Value::Text(blob));

        let record_key = layout::record_key(meta.id, &pk);
        if let Some(old) = kv.get(&record_key) {
            let old = from_cbor(old)?;
            for index in &meta.indexes {
                if let Some(old_key) = index.key_path.extract(&old).and_then(Key::from_value) {
                    batch.delete(layout::index_entry_key(meta.id, index.id, &old_key, &pk));
                }
            }
        }

        let encoded_pk = encode_key(&pk);
        for index in &meta.indexes {
            let Some(index_key) = index.key_path.extract(&record).and_then(Key::from_value) else {
                continue;
            };
            if index.unique {
                let prefix = layout::index_key_prefix(meta.id, index.id, &index_key);
                for (physical, _) in kv.range(layout::prefix_range(&prefix)) {
                    let (_, holder) = layout::decode_index_entry(physical)?;
                    if holder != pk {
                        return Err(CoreError::ConstraintViolation {
                            store: store.to_string(),
                            index: index.name.clone(),
                            key: index_key.to_string(),
                        });
                    }
                }
            }
            batch.put(
                layout::index_entry_key(meta.id, index.id, &index_key, &pk),
                encoded_pk.clone(),
            );
        }

        batch.put(record_key, to_cbor(&record)?);
        kv.commit(&batch)?;
        self.stats.record_put();
        tracing::debug!(store, key = %pk, ops = batch.len(), "put");
        compact_if_due(&self.config, &self.stats, kv);
        Ok(pk)
    }

    /// Reads a record. A missing record is `Ok(None)`.
    pub fn get(&self, store: &str, key: &Key) -> CoreResult<Option<Value>> {
        let record = self.read().get(store, key)?;
        self.stats.record_get(record.is_some());
        Ok(record)
    }

    /// Deletes a record and its index entries. Deleting a missing record
    /// succeeds and writes nothing.
    pub fn delete(&self, store: &str, key: &Key) -> CoreResult<()> {
        let mut state = self.state.write();
        let EngineState { catalog, kv } = &mut *state;
        let meta = catalog.require_store(store)?;
        let record_key = layout::record_key(meta.id, key);
        let Some(bytes) = kv.get(&record_key) else {
            tracing::debug!(store, key = %key, "delete of missing record");
            return Ok(());
        };
        let record = from_cbor(bytes)?;

        let mut batch = LogBatch::new();
        for index in &meta.indexes {
            if let Some(index_key) = index.key_path.extract(&record).and_then(Key::from_value) {
                batch.delete(layout::index_entry_key(meta.id, index.id, &index_key, key));
            }
        }
        batch.delete(record_key);
        kv.commit(&batch)?;
        self.stats.record_delete();
        tracing::debug!(store, key = %key, "delete");
        compact_if_due(&self.config, &self.stats, kv);
        Ok(())
    }

    /// Removes every record of a store. The key generator keeps counting.
    pub fn clear(&self, store: &str) -> CoreResult<()> {
        let mut state = self.state.write();
        let EngineState { catalog, kv } = &mut *state;
        let meta = catalog.require_store(store)?;
        let records = layout::record_prefix(meta.id);
        if !kv.any_in(layout::prefix_range(&records)) {
            return Ok(());
        }

        let mut batch = LogBatch::new();
        batch.delete_range(records.clone(), layout::prefix_end(&records));
        for index in &meta.indexes {
            let prefix = layout::index_prefix(meta.id, index.id);
            let end = layout::prefix_end(&prefix);
            batch.delete_range(prefix, end);
        }
        kv.commit(&batch)?;
        self.stats.record_clear();
        tracing::debug!(store, "clear");
        compact_if_due(&self.config, &self.stats, kv);
        Ok(())
    }

    /// Number of records in a store.
    pub fn count(&self, store: &str) -> CoreResult<usize> {
        self.read().count(store)
    }

    /// Runs `filter` over a store, or over one of its indexes, and returns
    /// one page of matching records in key order.
    ///
    /// Without `page` the first page of the configured default size is
    /// returned.
    pub fn query(
        &self,
        store: &str,
        filter: QueryFilter,
        index: Option<&str>,
        page: Option<PageOptions>,
    ) -> CoreResult<Vec<Value>> {
        let page = page.unwrap_or(PageOptions::new(1, self.config.default_rows));
        let rows = self.read().query(store, &filter, index, page)?;
        self.stats.record_query(rows.len());
        Ok(rows)
    }

    /// Case-insensitive full-text search over a store.
    pub fn search(
        &self,
        store: &str,
        text: &str,
        page: Option<u32>,
        rows: Option<u32>,
    ) -> CoreResult<Vec<Value>> {
        let page = PageOptions::new(page.unwrap_or(1), rows.unwrap_or(self.config.default_rows));
        self.query(
            store,
            QueryFilter::substring_in(FULLTEXT_FIELD, text),
            Some(FULLTEXT_INDEX),
            Some(page),
        )
    }

    /// Operation counters since open.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Per-store record and index entry counts.
    pub fn summary(&self) -> CoreResult<Vec<StoreSummary>> {
        let txn = self.read();
        txn.catalog()
            .stores
            .iter()
            .map(|s| {
                let indexes = s
                    .indexes
                    .iter()
                    .map(|i| {
                        Ok(IndexSummary {
                            name: i.name.clone(),
                            key_path: i.key_path.as_str().to_string(),
                            unique: i.unique,
                            entries: txn.index_len(&s.name, &i.name)?,
                        })
                    })
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(StoreSummary {
                    name: s.name.clone(),
                    key_path: s.key_path.as_str().to_string(),
                    auto_increment: s.auto_increment,
                    records: txn.count(&s.name)?,
                    indexes,
                })
            })
            .collect()
    }

    /// Cross-checks records against index entries.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let state = self.state.read();
        let mut report = verify_state(&state)?;
        report.log_bytes = state.kv.log_size()?;
        Ok(report)
    }

    /// Rewrites the commit log to hold only live data.
    ///
    /// Overwritten and deleted records stop costing log space and replay
    /// time. The swap is atomic: on failure the old log stays in place.
    pub fn compact(&self) -> CoreResult<CompactionReport> {
        let report = self.state.write().kv.compact()?;
        self.stats.record_compaction();
        tracing::info!(
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "compacted commit log"
        );
        Ok(report)
    }

    /// Flushes the commit log.
    pub fn flush(&self) -> CoreResult<()> {
        self.state.write().kv.flush()
    }

    /// Syncs the commit log and releases the database.
    pub fn close(self) -> CoreResult<()> {
        self.state.write().kv.sync()
    }
}

/// Compacts the log once its dead bytes cross the configured threshold.
/// A failed compaction leaves the old log in place, so it is only logged.
fn compact_if_due(config: &Config, stats: &EngineStats, kv: &mut OrderedKv) {
    let Some(threshold) = config.auto_compact_bytes else {
        return;
    };
    let compacted = kv.needs_compaction(threshold).and_then(|due| {
        if due {
            kv.compact().map(Some)
        } else {
            Ok(None)
        }
    });
    match compacted {
        Ok(Some(report)) => {
            stats.record_compaction();
            tracing::info!(
                bytes_before = report.bytes_before,
                bytes_after = report.bytes_after,
                "compacted commit log"
            );
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "automatic compaction failed"),
    }
}

/// Resolves the primary key of `record`, generating one when the store
/// allows it. Generator updates are queued on `batch`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn assign_primary_key(
    kv: &OrderedKv,
    meta: &StoreMeta,
    record: &mut Value,
    batch: &mut LogBatch,
) -> CoreResult<Key> {
    let explicit = match meta.key_path.extract(record) {
        Some(value) => Some(Key::from_value(value).ok_or_else(|| {
            CoreError::invalid_record(format!(
                "{} at key path `{}` is not a valid key",
                value.type_name(),
                meta.key_path
            ))
        })?),
        None => None,
    };
    if !meta.auto_increment {
        return explicit.ok_or_else(|| {
            CoreError::invalid_record(format!("missing primary key at `{}`", meta.key_path))
        });
    }

    let generator_key = layout::generator_key(meta.id);
    let current = kv
        .get(&generator_key)
        .map(layout::decode_generator)
        .transpose()?
        .unwrap_or(0);

    match explicit {
        Some(key) => {
            if let Some(n) = key.as_number() {
                if n.is_finite() && n >= (current + 1) as f64 {
                    let next = n.floor().min(MAX_GENERATED_KEY as f64) as u64;
                    batch.put(generator_key, next.to_be_bytes().to_vec());
                }
            }
            Ok(key)
        }
        None => {
            let next = current + 1;
            if next > MAX_GENERATED_KEY {
                return Err(CoreError::invalid_record("key generator exhausted"));
            }
            let value = Value::Integer(i64::try_from(next).unwrap_or(i64::MAX));
            if !meta.key_path.inject(record, value) {
                return Err(CoreError::invalid_record(format!(
                    "cannot write generated key at `{}`",
                    meta.key_path
                )));
            }
            batch.put(generator_key, next.to_be_bytes().to_vec());
            Ok(Key::from(next as f64))
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.config.name)
            .field("version", &self.version())
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.state.get_mut().kv.flush();
    }
}
