//! Benchmark utilities.

use docshelf_codec::Value;
use docshelf_core::{Config, Engine, SchemaBuilder, StoreDefinition};
use docshelf_storage::InMemoryBackend;
use rand::seq::SliceRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "amber", "basil", "cedar", "delta", "ember", "fjord", "grove", "harbor", "indigo", "juniper",
    "kelp", "lumen", "maple", "nectar", "onyx", "pebble", "quartz", "raven", "sorrel", "tundra",
];

/// Schema used by the benchmarks: `users` keyed by `id`, with a unique
/// `email` index and an `age` index.
pub fn users_schema() -> SchemaBuilder {
    let users = StoreDefinition::new("id")
        .and_then(|d| d.unique_index("email", "email"))
        .and_then(|d| d.index("age", "age"))
        .expect("static schema is valid");
    SchemaBuilder::new().with_store("users", users)
}

/// Opens an in-memory engine without syncing on commit.
pub fn open_engine() -> Engine {
    Engine::open_with_backend(
        Config::default().sync_on_commit(false),
        Box::new(InMemoryBackend::new()),
        users_schema(),
    )
    .expect("in-memory engine opens")
}

/// A random sentence of `words` words.
pub fn random_text(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .map(|_| *WORDS.choose(&mut rng).unwrap_or(&"word"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// User record number `i` with a random bio of `bio_words` words.
pub fn user_record(i: usize, bio_words: usize) -> Value {
    let mut rng = rand::thread_rng();
    Value::map([
        ("id", Value::Text(format!("u{i:08}"))),
        ("name", Value::Text(format!("User {i}"))),
        ("email", Value::Text(format!("user{i}@example.com"))),
        ("age", Value::Integer(rng.gen_range(18..90))),
        ("bio", Value::Text(random_text(bio_words))),
    ])
}

/// Opens an engine holding `count` users.
pub fn populated_engine(count: usize) -> Engine {
    let engine = open_engine();
    for i in 0..count {
        engine
            .put("users", user_record(i, 8))
            .expect("populate users");
    }
    engine
}
