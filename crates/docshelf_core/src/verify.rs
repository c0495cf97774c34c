//! Consistency check between records and index entries.

use crate::engine::EngineState;
use crate::error::CoreResult;
use crate::key::Key;
use crate::layout;
use docshelf_codec::from_cbor;
use std::collections::BTreeSet;

/// Result of [`crate::Engine::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Stores checked.
    pub stores: usize,
    /// Records checked.
    pub records: usize,
    /// Index entries checked.
    pub index_entries: usize,
    /// Live keys in the keyspace, catalog and generators included.
    pub live_keys: usize,
    /// Size of the commit log.
    pub log_bytes: u64,
    /// Inconsistencies found, one line each.
    pub problems: Vec<String>,
}

impl VerifyReport {
    /// Whether no problem was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

pub(crate) fn verify_state(state: &EngineState) -> CoreResult<VerifyReport> {
    let mut report = VerifyReport::default();
    let kv = &state.kv;
    report.live_keys = kv.len();

    for store in &state.catalog.stores {
        report.stores += 1;
        let mut expected: BTreeSet<Vec<u8>> = BTreeSet::new();

        let prefix = layout::record_prefix(store.id);
        for (physical, bytes) in kv.range(layout::prefix_range(&prefix)) {
            report.records += 1;
            let pk = layout::decode_record_key(physical)?;
            let record = match from_cbor(bytes) {
                Ok(record) => record,
                Err(e) => {
                    report
                        .problems
                        .push(format!("{}: record {pk} does not decode: {e}", store.name));
                    continue;
                }
            };
            match store.key_path.extract(&record).and_then(Key::from_value) {
                Some(field) if field == pk => {}
                _ => report.problems.push(format!(
                    "{}: record {pk} does not carry its key at `{}`",
                    store.name, store.key_path
                )),
            }
            for index in &store.indexes {
                if let Some(index_key) = index.key_path.extract(&record).and_then(Key::from_value) {
                    expected.insert(layout::index_entry_key(store.id, index.id, &index_key, &pk));
                }
            }
        }

        for index in &store.indexes {
            let prefix = layout::index_prefix(store.id, index.id);
            for (physical, _) in kv.range(layout::prefix_range(&prefix)) {
                report.index_entries += 1;
                if !expected.remove(physical) {
                    let (index_key, pk) = layout::decode_index_entry(physical)?;
                    report.problems.push(format!(
                        "{}.{}: stray entry {index_key} -> {pk}",
                        store.name, index.name
                    ));
                }
            }
        }
        for missing in expected {
            let (index_key, pk) = layout::decode_index_entry(&missing)?;
            report.problems.push(format!(
                "{}: record {pk} has no index entry for {index_key}",
                store.name
            ));
        }
    }
    Ok(report)
}
