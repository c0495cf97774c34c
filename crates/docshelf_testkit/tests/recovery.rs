//! Persistence, crash recovery and migration across reopen.

use docshelf_codec::Value;
use docshelf_core::{
    Config, CoreError, Engine, Key, MigrationOperation, QueryFilter, SchemaBuilder,
    StoreDefinition,
};
use docshelf_storage::{InMemoryBackend, StorageBackend};
use docshelf_testkit::prelude::*;
use docshelf_testkit::scenarios::{user, users_schema};

fn open_shared(backend: &InMemoryBackend, schema: SchemaBuilder) -> Engine {
    Engine::open_with_backend(Config::default(), Box::new(backend.clone()), schema).unwrap()
}

#[test]
fn test_records_survive_reopen() {
    let test_engine = TestEngine::file(users_schema());
    test_engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    test_engine.put("users", user("2", "Bo", "b@x", 41)).unwrap();
    test_engine.delete("users", &Key::from("2")).unwrap();

    let test_engine = test_engine.reopen(users_schema()).unwrap();
    assert_eq!(test_engine.count("users").unwrap(), 1);
    assert!(test_engine.applied_migrations().is_empty());
    let hits = test_engine.search("users", "ANA", None, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(test_engine.verify().unwrap().is_ok());
}

#[test]
fn test_second_open_is_locked_out() {
    with_file_engine(users_schema(), |engine, path| {
        assert_eq!(engine.path(), Some(path));
        let config = engine.config().clone();
        let err = Engine::open(config, users_schema()).unwrap_err();
        assert!(matches!(err, CoreError::StorageUnavailable { .. }));
    });
}

#[test]
fn test_torn_tail_is_cut_off() {
    let test_engine = TestEngine::file(users_schema());
    test_engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    test_engine.put("users", user("2", "Bo", "b@x", 41)).unwrap();
    let log = test_engine.log_path().unwrap();

    let test_engine = test_engine
        .reopen_after(users_schema(), |_| chop_tail(&log, 5).unwrap())
        .unwrap();
    assert!(test_engine.get("users", &Key::from("1")).unwrap().is_some());
    assert!(test_engine.get("users", &Key::from("2")).unwrap().is_none());

    // New writes land after the cut, so a further reopen sees them.
    test_engine.put("users", user("3", "Cy", "c@x", 22)).unwrap();
    let test_engine = test_engine.reopen(users_schema()).unwrap();
    assert_eq!(test_engine.count("users").unwrap(), 2);
}

#[test]
fn test_trailing_garbage_is_cut_off() {
    let test_engine = TestEngine::file(users_schema());
    test_engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    let log = test_engine.log_path().unwrap();
    let size = file_len(&log).unwrap();

    let test_engine = test_engine
        .reopen_after(users_schema(), |_| append_garbage(&log, b"DSHL\x01").unwrap())
        .unwrap();
    assert_eq!(test_engine.count("users").unwrap(), 1);
    drop(test_engine);
    assert_eq!(file_len(&log).unwrap(), size);
}

#[test]
fn test_corruption_before_valid_data_fails_open() {
    let test_engine = TestEngine::file(users_schema());
    test_engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    let log = test_engine.log_path().unwrap();

    // The first frame holds the catalog; damaging its payload leaves the
    // user frame behind it intact.
    let err = test_engine
        .reopen_after(users_schema(), |_| flip_byte(&log, 20).unwrap())
        .unwrap_err();
    assert!(matches!(err, CoreError::StorageUnavailable { .. }));
}

#[test]
fn test_crash_mid_write_keeps_committed_records() {
    let shared = InMemoryBackend::new();
    let backend = CrashableBackend::new(Box::new(shared.clone()));
    let switch = backend.switch();
    let engine =
        Engine::open_with_backend(Config::default(), Box::new(backend), users_schema()).unwrap();
    engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();

    switch.crash_after(10);
    assert!(engine.put("users", user("2", "Bo", "b@x", 41)).is_err());
    assert!(switch.has_crashed());
    drop(engine);

    let torn = shared.size().unwrap();
    let engine = open_shared(&shared, users_schema());
    assert_eq!(engine.count("users").unwrap(), 1);
    assert!(shared.size().unwrap() < torn);
}

#[test]
fn test_failed_sync_rolls_the_frame_back() {
    let shared = InMemoryBackend::new();
    let backend = CrashableBackend::new(Box::new(shared.clone()));
    let switch = backend.switch();
    let engine =
        Engine::open_with_backend(Config::default(), Box::new(backend), users_schema()).unwrap();
    engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    let size = shared.size().unwrap();

    switch.set_fail_on_sync(true);
    assert!(engine.put("users", user("2", "Bo", "b@x", 41)).is_err());
    assert_eq!(shared.size().unwrap(), size);
    assert!(engine.get("users", &Key::from("2")).unwrap().is_none());

    switch.set_fail_on_sync(false);
    engine.put("users", user("3", "Cy", "c@x", 22)).unwrap();
    drop(engine);

    let engine = open_shared(&shared, users_schema());
    assert_eq!(engine.count("users").unwrap(), 2);
}

#[test]
fn test_new_index_is_backfilled() {
    let shared = InMemoryBackend::new();
    let plain = SchemaBuilder::new().with_store("users", StoreDefinition::new("id").unwrap());
    let engine = open_shared(&shared, plain);
    engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();
    engine.put("users", user("2", "Bo", "b@x", 41)).unwrap();
    drop(engine);

    let engine = Engine::open_with_backend(
        Config::default().version(2),
        Box::new(shared.clone()),
        users_schema(),
    )
    .unwrap();
    let applied = engine.applied_migrations();
    assert!(applied.contains(&MigrationOperation::CreateIndex {
        store: "users".into(),
        index: "email".into(),
    }));
    assert!(applied.contains(&MigrationOperation::SetVersion { from: 1, to: 2 }));
    assert_eq!(engine.version(), 2);

    let found = engine
        .query("users", QueryFilter::Eq(Value::from("b@x")), Some("email"), None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(engine.verify().unwrap().is_ok());
}

#[test]
fn test_backfill_collision_fails_open() {
    let shared = InMemoryBackend::new();
    let plain = SchemaBuilder::new().with_store("users", StoreDefinition::new("id").unwrap());
    let engine = open_shared(&shared, plain.clone());
    engine.put("users", user("1", "Ana", "same@x", 30)).unwrap();
    engine.put("users", user("2", "Bo", "same@x", 41)).unwrap();
    drop(engine);

    let err = Engine::open_with_backend(
        Config::default().version(2),
        Box::new(shared.clone()),
        users_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::StorageUnavailable { .. }));

    // Nothing of the failed migration was written.
    let engine = open_shared(&shared, plain);
    assert_eq!(engine.version(), 1);
    assert_eq!(engine.index_names("users").unwrap(), ["__fulltext"]);
}

#[test]
fn test_downgrade_is_refused() {
    let shared = InMemoryBackend::new();
    drop(
        Engine::open_with_backend(
            Config::default().version(3),
            Box::new(shared.clone()),
            users_schema(),
        )
        .unwrap(),
    );
    let err = Engine::open_with_backend(
        Config::default().version(2),
        Box::new(shared),
        users_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::StorageUnavailable { .. }));
}

#[test]
fn test_stores_outlive_their_registration() {
    let test_engine = TestEngine::file(users_schema());
    test_engine.put("users", user("1", "Ana", "a@x", 30)).unwrap();

    let test_engine = test_engine.reopen(SchemaBuilder::new()).unwrap();
    assert_eq!(test_engine.store_names(), ["users"]);
    assert_eq!(test_engine.count("users").unwrap(), 1);
}

#[test]
fn test_compacted_file_log_reopens() {
    let test_engine = TestEngine::file_with(users_schema(), |c| c.auto_compact(None));
    for age in 0..100 {
        test_engine.put("users", user("1", "Ana", "a@x", age)).unwrap();
    }
    test_engine.put("users", user("2", "Bo", "b@x", 41)).unwrap();
    let log = test_engine.log_path().unwrap();
    let bloated = file_len(&log).unwrap();

    let report = test_engine.compact().unwrap();
    assert_eq!(report.bytes_before, bloated);
    assert_eq!(file_len(&log).unwrap(), report.bytes_after);
    assert!(report.reclaimed() > 0);

    let test_engine = test_engine.reopen(users_schema()).unwrap();
    assert_eq!(test_engine.count("users").unwrap(), 2);
    let ana = test_engine.get("users", &Key::from("1")).unwrap().unwrap();
    assert_eq!(ana.get("age"), Some(&Value::Integer(99)));
    assert!(test_engine.verify().unwrap().is_ok());

    // Writes after a compaction append to the new log.
    test_engine.put("users", user("3", "Cy", "c@x", 22)).unwrap();
    let test_engine = test_engine.reopen(users_schema()).unwrap();
    assert_eq!(test_engine.count("users").unwrap(), 3);
}

#[test]
fn test_crash_during_compaction_keeps_the_old_log() {
    let shared = InMemoryBackend::new();
    let backend = CrashableBackend::new(Box::new(shared.clone()));
    let switch = backend.switch();
    let config = Config::default().auto_compact(None);
    let engine =
        Engine::open_with_backend(config.clone(), Box::new(backend), users_schema()).unwrap();
    for age in 0..50 {
        engine.put("users", user("1", "Ana", "a@x", age)).unwrap();
    }
    let before = shared.snapshot();

    switch.crash_after(10);
    assert!(engine.compact().is_err());
    assert!(switch.has_crashed());
    drop(engine);
    assert_eq!(shared.snapshot(), before);

    let engine = Engine::open_with_backend(config, Box::new(shared), users_schema()).unwrap();
    let ana = engine.get("users", &Key::from("1")).unwrap().unwrap();
    assert_eq!(ana.get("age"), Some(&Value::Integer(49)));
}

#[test]
fn test_log_stays_bounded_across_sessions() {
    let mut test_engine = TestEngine::file_with(users_schema(), |c| {
        c.sync_on_commit(false).auto_compact(Some(2048))
    });
    let log = test_engine.log_path().unwrap();
    for round in 0..5 {
        for age in 0..200 {
            test_engine
                .put("users", user("1", "Ana", "a@x", round * 1000 + age))
                .unwrap();
        }
        test_engine.clear("users").unwrap();
        test_engine.put("users", user("2", "Bo", "b@x", round)).unwrap();
        test_engine = test_engine.reopen(users_schema()).unwrap();
        assert!(file_len(&log).unwrap() < 6144);
    }
    assert_eq!(test_engine.count("users").unwrap(), 1);
}
