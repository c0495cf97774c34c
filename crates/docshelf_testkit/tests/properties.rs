//! Property tests over generated records and workloads.

use docshelf_codec::Value;
use docshelf_core::{build_full_text, Engine, Key, PageOptions, QueryFilter};
use docshelf_testkit::prelude::*;
use docshelf_testkit::scenarios::users_schema;
use proptest::prelude::*;

fn open_users(records: &[Value]) -> Engine {
    let engine = Engine::open_in_memory(users_schema()).unwrap();
    for record in records {
        engine.put("users", record.clone()).unwrap();
    }
    engine
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn put_then_get_round_trips(record in user_record_strategy()) {
        let engine = open_users(&[]);
        let key = engine.put("users", record.clone()).unwrap();
        let stored = engine.get("users", &key).unwrap().unwrap();
        prop_assert_eq!(without_full_text(&stored), record);
    }

    #[test]
    fn full_text_leaves_out_the_key(record in loose_record_strategy()) {
        let id = record.get("id").and_then(Value::as_text).unwrap().to_lowercase();
        let blob = build_full_text(&record, Some("id"));
        let mut others = record.clone();
        others.remove("id");
        let without_key = build_full_text(&others, None);
        let carried_elsewhere = without_key.split('|').any(|token| token == id);
        prop_assert!(carried_elsewhere || !blob.split('|').any(|token| token == id));
        prop_assert_eq!(blob, without_key);
    }

    #[test]
    fn eq_on_primary_key_matches_get(
        records in prop::collection::vec(user_record_strategy(), 0..12),
        lookup in text_key_strategy(),
    ) {
        let mut harness = ShadowHarness::new();
        for record in records {
            harness.put(record);
        }
        let rows = harness
            .engine
            .query("users", QueryFilter::Eq(Value::Text(lookup.clone())), None, None)
            .unwrap();
        prop_assert!(rows.len() <= 1);
        let got = harness.engine.get("users", &Key::from(lookup)).unwrap();
        prop_assert_eq!(rows.into_iter().next(), got);
    }

    #[test]
    fn prefix_results_start_with_the_prefix(
        records in prop::collection::vec(user_record_strategy(), 0..12),
        prefix in "[a-d]{0,2}",
    ) {
        let mut harness = ShadowHarness::new();
        for record in records {
            harness.put(record);
        }
        let rows = harness
            .engine
            .query("users", QueryFilter::Prefix(Value::Text(prefix.clone())), None, Some(PageOptions::new(1, 100)))
            .unwrap();
        for row in &rows {
            let id = row.get("id").and_then(Value::as_text).unwrap();
            prop_assert!(id.starts_with(&prefix));
        }
        let expected = harness
            .model()
            .keys()
            .filter(|k| k.as_text().is_some_and(|t| t.starts_with(&prefix)))
            .count();
        prop_assert_eq!(rows.len(), expected);
    }

    #[test]
    fn pages_concatenate_to_the_walk(
        records in prop::collection::vec(user_record_strategy(), 0..20),
        rows in 1u32..6,
        pages in 1u32..5,
    ) {
        let mut harness = ShadowHarness::new();
        for record in records {
            harness.put(record);
        }
        let filter = QueryFilter::Gte(Value::from(""));
        let mut paged = Vec::new();
        for page in 1..=pages {
            paged.extend(
                harness
                    .engine
                    .query("users", filter.clone(), None, Some(PageOptions::new(page, rows)))
                    .unwrap(),
            );
        }
        let mut walk = harness
            .engine
            .query("users", filter, None, Some(PageOptions::new(1, 1000)))
            .unwrap();
        walk.truncate((pages * rows) as usize);
        prop_assert_eq!(paged, walk);
    }

    #[test]
    fn clear_empties_every_query(records in prop::collection::vec(user_record_strategy(), 1..10)) {
        let mut harness = ShadowHarness::new();
        for record in records {
            harness.put(record);
        }
        harness.apply(&RecordOperation::Clear);
        for filter in [
            QueryFilter::Gte(Value::from("")),
            QueryFilter::substring(""),
            QueryFilter::Gte(Value::Integer(0)),
        ] {
            prop_assert!(harness.engine.query("users", filter.clone(), None, None).unwrap().is_empty());
            prop_assert!(harness.engine.query("users", filter, Some("age"), None).unwrap().is_empty());
        }
        prop_assert!(harness.engine.search("users", "", None, None).unwrap().is_empty());
    }

    #[test]
    fn deleting_absent_keys_changes_nothing(
        records in prop::collection::vec(user_record_strategy(), 0..10),
        absent in "[e-h]{1,3}",
    ) {
        let mut harness = ShadowHarness::new();
        for record in records {
            harness.put(record);
        }
        let before = harness.engine.stats();
        harness.apply(&RecordOperation::Delete { id: absent });
        prop_assert_eq!(harness.engine.stats().deletes, before.deletes);
        harness.verify_all();
    }

    #[test]
    fn workloads_match_the_model(ops in operation_sequence_strategy(1, 40)) {
        let mut harness = ShadowHarness::new();
        for op in &ops {
            harness.apply(op);
        }
        harness.verify_all();
    }
}
