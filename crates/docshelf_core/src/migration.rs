//! Open-time migration.
//!
//! Every open compares the registered schema with the persisted catalog
//! and plans the operations that bring storage up to date. Migrations only
//! ever add: a store or index that already exists is left as it is, even
//! when its registered definition has drifted. The whole plan commits as
//! one log batch, so a failed migration leaves nothing behind.

use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::key::{encode_key, Key};
use crate::kv::OrderedKv;
use crate::layout;
use crate::log::LogBatch;
use crate::schema::{IndexDefinition, SchemaBuilder, StoreDefinition};
use docshelf_codec::from_cbor;
use std::collections::BTreeMap;

/// One step of a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    /// Create a store with all of its indexes.
    CreateStore {
        /// Store name.
        store: String,
    },
    /// Add an index to an existing store and backfill it.
    CreateIndex {
        /// Store name.
        store: String,
        /// Index name.
        index: String,
    },
    /// Record a new schema version.
    SetVersion {
        /// Version stored before.
        from: u32,
        /// Version requested.
        to: u32,
    },
}

/// Plans the operations needed to open `catalog` at `version` with `schema`.
pub fn plan(
    catalog: &Catalog,
    schema: &SchemaBuilder,
    version: u32,
) -> CoreResult<Vec<MigrationOperation>> {
    if catalog.version > version {
        return Err(CoreError::storage_unavailable(format!(
            "stored version {} is newer than requested version {version}",
            catalog.version
        )));
    }

    let mut ops = Vec::new();
    for (name, def) in schema.stores() {
        let Some(meta) = catalog.store(name) else {
            ops.push(MigrationOperation::CreateStore {
                store: name.to_string(),
            });
            continue;
        };
        if meta.key_path != def.key_path || meta.auto_increment != def.auto_increment {
            tracing::warn!(
                store = name,
                stored_key_path = meta.key_path.as_str(),
                "store definition differs from storage, keeping the stored one"
            );
        }
        for index in &def.indexes {
            match meta.index(&index.name) {
                Some(existing) if !existing.matches(index) => {
                    tracing::warn!(
                        store = name,
                        index = %index.name,
                        "index definition differs from storage, keeping the stored one"
                    );
                }
                Some(_) => {}
                None => ops.push(MigrationOperation::CreateIndex {
                    store: name.to_string(),
                    index: index.name.clone(),
                }),
            }
        }
    }

    if catalog.version < version {
        ops.push(MigrationOperation::SetVersion {
            from: catalog.version,
            to: version,
        });
    }
    Ok(ops)
}

/// Applies `ops` in one batch, updating `catalog` on success.
pub fn apply(
    ops: &[MigrationOperation],
    schema: &SchemaBuilder,
    catalog: &mut Catalog,
    kv: &mut OrderedKv,
) -> CoreResult<()> {
    if ops.is_empty() {
        return Ok(());
    }

    let mut next = catalog.clone();
    let mut batch = LogBatch::new();
    for op in ops {
        match op {
            MigrationOperation::CreateStore { store } => {
                let def = registered(schema, store)?;
                let meta = next.add_store(store, def);
                tracing::info!(store = %store, id = %meta.id, indexes = meta.indexes.len(), "creating store");
            }
            MigrationOperation::CreateIndex { store, index } => {
                let def = registered(schema, store)?
                    .find_index(index)
                    .ok_or_else(|| CoreError::invalid_schema(format!("index {index:?} is not registered")))?;
                let meta = next.add_index(store, def)?;
                let filled = backfill(kv, &next, store, def, &mut batch)?;
                tracing::info!(store = %store, index = %index, id = %meta.id, entries = filled, "creating index");
            }
            MigrationOperation::SetVersion { from, to } => {
                next.version = *to;
                tracing::info!(from, to, "upgrading schema version");
            }
        }
    }

    batch.put(layout::CATALOG_KEY.to_vec(), next.encode()?);
    kv.commit(&batch)?;
    *catalog = next;
    Ok(())
}

fn registered<'s>(schema: &'s SchemaBuilder, store: &str) -> CoreResult<&'s StoreDefinition> {
    schema
        .get(store)
        .ok_or_else(|| CoreError::invalid_schema(format!("store {store:?} is not registered")))
}

/// Writes index entries for every existing record of `store`.
fn backfill(
    kv: &OrderedKv,
    catalog: &Catalog,
    store: &str,
    def: &IndexDefinition,
    batch: &mut LogBatch,
) -> CoreResult<usize> {
    let meta = catalog.require_store(store)?;
    let Some(index) = meta.index(&def.name) else {
        return Ok(0);
    };
    let mut seen: BTreeMap<Key, Key> = BTreeMap::new();
    let mut written = 0;
    let prefix = layout::record_prefix(meta.id);
    for (physical, bytes) in kv.range(layout::prefix_range(&prefix)) {
        let pk = layout::decode_record_key(physical)?;
        let record = from_cbor(bytes)?;
        let Some(index_key) = def.key_path.extract(&record).and_then(Key::from_value) else {
            continue;
        };
        if index.unique {
            if let Some(holder) = seen.get(&index_key) {
                if *holder != pk {
                    return Err(CoreError::ConstraintViolation {
                        store: store.to_string(),
                        index: def.name.clone(),
                        key: index_key.to_string(),
                    });
                }
            }
        }
        batch.put(
            layout::index_entry_key(meta.id, index.id, &index_key, &pk),
            encode_key(&pk),
        );
        written += 1;
        if index.unique {
            seen.insert(index_key, pk);
        }
    }
    Ok(written)
}
