//! Shadow-model harness.
//!
//! Runs operations against an engine and a plain `BTreeMap` side by side,
//! then checks that the engine agrees with the model: same records, same
//! key order, consistent indexes.

use crate::fixtures::{scenarios, TestEngine};
use crate::generators::RecordOperation;
use docshelf_codec::Value;
use docshelf_core::{CoreError, Key, KeyRange, FULLTEXT_FIELD};
use std::collections::BTreeMap;

/// Store the harness works on.
pub const SHADOW_STORE: &str = "users";

/// An engine paired with a model of what it should contain.
pub struct ShadowHarness {
    /// The engine under test.
    pub engine: TestEngine,
    model: BTreeMap<Key, Value>,
}

impl ShadowHarness {
    /// Creates a harness over an in-memory `users` engine.
    pub fn new() -> Self {
        Self {
            engine: TestEngine::memory(scenarios::users_schema()),
            model: BTreeMap::new(),
        }
    }

    /// Creates a harness over a file-backed `users` engine.
    pub fn file() -> Self {
        Self {
            engine: TestEngine::file(scenarios::users_schema()),
            model: BTreeMap::new(),
        }
    }

    /// Applies one operation to both sides.
    ///
    /// A put rejected by the unique index must leave the engine unchanged,
    /// so the model is left alone too.
    pub fn apply(&mut self, op: &RecordOperation) {
        match op {
            RecordOperation::Put { record } => self.put(record.clone()),
            RecordOperation::Delete { id } => {
                let key = Key::from(id.as_str());
                self.engine
                    .delete(SHADOW_STORE, &key)
                    .expect("Failed to delete record");
                self.model.remove(&key);
            }
            RecordOperation::Get { id } => {
                self.get_and_verify(&Key::from(id.as_str()));
            }
            RecordOperation::Clear => {
                self.engine.clear(SHADOW_STORE).expect("Failed to clear");
                self.model.clear();
            }
        }
    }

    /// Puts a record and tracks it.
    pub fn put(&mut self, record: Value) {
        match self.engine.put(SHADOW_STORE, record.clone()) {
            Ok(key) => {
                self.model.insert(key, record);
            }
            Err(CoreError::ConstraintViolation { .. }) => {}
            Err(err) => panic!("Failed to put record: {err}"),
        }
    }

    /// Reads a record and checks it against the model.
    pub fn get_and_verify(&self, key: &Key) -> Option<Value> {
        let actual = self
            .engine
            .get(SHADOW_STORE, key)
            .expect("Failed to get record");
        assert_eq!(
            actual.as_ref().map(without_full_text),
            self.model.get(key).cloned(),
            "Record mismatch for {key}"
        );
        actual
    }

    /// Checks every record, the primary key order and the index entries.
    pub fn verify_all(&self) {
        assert_eq!(
            self.engine.count(SHADOW_STORE).expect("Failed to count"),
            self.model.len()
        );

        let txn = self.engine.read();
        let keys: Vec<Key> = txn
            .cursor(SHADOW_STORE, None, &KeyRange::all())
            .expect("Failed to open cursor")
            .map(|entry| entry.expect("Failed to read entry").primary_key)
            .collect();
        let expected: Vec<Key> = self.model.keys().cloned().collect();
        assert_eq!(keys, expected, "Primary key order mismatch");
        drop(txn);

        for key in self.model.keys() {
            self.get_and_verify(key);
        }

        let report = self.engine.verify().expect("Failed to verify");
        assert!(report.is_ok(), "Verification problems: {:?}", report.problems);
    }

    /// The model's view of the store.
    pub fn model(&self) -> &BTreeMap<Key, Value> {
        &self.model
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

impl Default for ShadowHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored record without its full-text field.
pub fn without_full_text(record: &Value) -> Value {
    let mut record = record.clone();
    record.remove(FULLTEXT_FIELD);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenarios::user;

    #[test]
    fn test_harness_tracks_puts_and_deletes() {
        let mut harness = ShadowHarness::new();
        harness.put(user("b", "Bo", "bo@x", 40));
        harness.put(user("a", "Ana", "ana@x", 30));
        harness.apply(&RecordOperation::Delete { id: "b".into() });
        harness.verify_all();
        assert_eq!(harness.tracked_count(), 1);
    }

    #[test]
    fn test_harness_skips_rejected_puts() {
        let mut harness = ShadowHarness::new();
        harness.put(user("a", "Ana", "same@x", 30));
        harness.put(user("b", "Bo", "same@x", 40));
        harness.verify_all();
        assert!(harness.model().contains_key(&Key::from("a")));
        assert!(!harness.model().contains_key(&Key::from("b")));
    }

    #[test]
    fn test_harness_clear() {
        let mut harness = ShadowHarness::file();
        harness.put(user("a", "Ana", "ana@x", 30));
        harness.apply(&RecordOperation::Clear);
        harness.verify_all();
        assert_eq!(harness.tracked_count(), 0);
    }
}
