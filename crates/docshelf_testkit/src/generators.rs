//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, records and operation
//! sequences that stay within what the engine accepts.

use docshelf_codec::Value;
use docshelf_core::Key;
use proptest::prelude::*;

/// Strategy for text primary keys, short enough to collide often.
pub fn text_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d]{1,4}").expect("Invalid regex")
}

/// Strategy for keys of every kind, nested arrays included.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    let leaf = prop_oneof![
        (-1_000_000i64..1_000_000).prop_map(Key::from),
        any::<f64>()
            .prop_filter("NaN is not a key", |x| !x.is_nan())
            .prop_map(Key::Number),
        prop::string::string_regex("[a-z\\x00]{0,6}")
            .expect("Invalid regex")
            .prop_map(Key::Text),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Key::Bytes),
    ];
    leaf.prop_recursive(2, 12, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Key::Array)
    })
}

/// Strategy for valid store names.
pub fn store_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for leaf field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::Integer),
        prop::string::string_regex("[A-Za-z ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
    ]
}

/// Strategy for a user record keyed by `id`.
///
/// Fields: `id` (text key), `name`, `email` (derived from the key so the
/// unique index holds), `age` and an optional nested `address`.
pub fn user_record_strategy() -> impl Strategy<Value = Value> {
    (
        text_key_strategy(),
        prop::string::string_regex("[A-Z][a-z]{1,8}").expect("Invalid regex"),
        0i64..100,
        prop::option::of(prop::string::string_regex("[A-Za-z]{1,10}").expect("Invalid regex")),
    )
        .prop_map(|(id, name, age, city)| {
            let mut record = Value::map([
                ("id", Value::Text(id.clone())),
                ("name", Value::Text(name)),
                ("email", Value::Text(format!("{id}@example.com"))),
                ("age", Value::Integer(age)),
            ]);
            if let Some(city) = city {
                record.insert("address", Value::map([("city", Value::Text(city))]));
            }
            record
        })
}

/// Strategy for a record with arbitrary extra fields around a text key.
pub fn loose_record_strategy() -> impl Strategy<Value = Value> {
    (
        text_key_strategy(),
        prop::collection::vec(
            (
                prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex"),
                field_value_strategy(),
            ),
            0..5,
        ),
    )
        .prop_map(|(id, fields)| {
            let mut record = Value::map([("id", Value::Text(id))]);
            for (name, value) in fields {
                if name != "id" {
                    record.insert(name, value);
                }
            }
            record
        })
}

/// One step of a generated workload over the `users` store.
#[derive(Debug, Clone)]
pub enum RecordOperation {
    /// Insert or replace a record
    Put {
        /// Record data
        record: Value,
    },
    /// Delete a record
    Delete {
        /// Primary key
        id: String,
    },
    /// Read a record
    Get {
        /// Primary key
        id: String,
    },
    /// Remove every record
    Clear,
}

/// Strategy for generating record operations.
pub fn record_operation_strategy() -> impl Strategy<Value = RecordOperation> {
    prop_oneof![
        6 => user_record_strategy().prop_map(|record| RecordOperation::Put { record }),
        2 => text_key_strategy().prop_map(|id| RecordOperation::Delete { id }),
        3 => text_key_strategy().prop_map(|id| RecordOperation::Get { id }),
        1 => Just(RecordOperation::Clear),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RecordOperation>> {
    prop::collection::vec(record_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn user_records_carry_a_text_key(record in user_record_strategy()) {
            let id = record.get("id").and_then(Value::as_text);
            prop_assert!(id.is_some_and(|id| !id.is_empty()));
            let email = record.get("email").and_then(Value::as_text).unwrap();
            prop_assert!(email.ends_with("@example.com"));
        }

        #[test]
        fn store_names_start_with_a_letter(name in store_name_strategy()) {
            let first = name.chars().next();
            prop_assert!(first.is_some_and(|c| c.is_ascii_lowercase()));
        }

        #[test]
        fn keys_round_trip_through_values(key in key_strategy()) {
            let value = key.to_value();
            prop_assert_eq!(Key::from_value(&value), Some(key));
        }
    }
}
