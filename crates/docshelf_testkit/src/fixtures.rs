//! Test fixtures and engine helpers.
//!
//! Provides convenience functions for setting up test engines
//! and common test scenarios.

use docshelf_codec::Value;
use docshelf_core::{Config, CoreResult, Engine, SchemaBuilder};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name given to file-backed test databases.
pub const TEST_DB_NAME: &str = "testdb";

/// A test engine with automatic cleanup.
#[derive(Debug)]
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    config: Config,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates a new in-memory test engine.
    pub fn memory(schema: SchemaBuilder) -> Self {
        let config = Config::default();
        Self {
            engine: Engine::open(config.clone(), schema).expect("Failed to open in-memory engine"),
            config,
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test engine in a temporary directory.
    pub fn file(schema: SchemaBuilder) -> Self {
        Self::file_with(schema, |config| config)
    }

    /// Creates a file-backed test engine with an adjusted configuration.
    pub fn file_with(schema: SchemaBuilder, adjust: impl FnOnce(Config) -> Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = adjust(Config::new().name(TEST_DB_NAME).data_dir(temp_dir.path()));
        let engine = Engine::open(config.clone(), schema).expect("Failed to open file engine");
        Self {
            engine,
            config,
            temp_dir: Some(temp_dir),
        }
    }

    /// The configuration the engine was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|d| d.path().join(&self.config.name))
    }

    /// Returns the commit log path if file-backed.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.path().map(|p| p.join("data.log"))
    }

    /// Closes the engine, runs `between` on the database directory while
    /// nothing holds it, and opens the database again with `schema`.
    ///
    /// Only meaningful for file-backed engines.
    pub fn reopen_after(
        self,
        schema: SchemaBuilder,
        between: impl FnOnce(&Path),
    ) -> CoreResult<Self> {
        let path = self.path();
        let Self {
            engine,
            config,
            temp_dir,
        } = self;
        engine.close()?;
        if let Some(path) = &path {
            between(path);
        }
        let engine = Engine::open(config.clone(), schema)?;
        Ok(Self {
            engine,
            config,
            temp_dir,
        })
    }

    /// Closes the engine and opens it again with `schema`.
    pub fn reopen(self, schema: SchemaBuilder) -> CoreResult<Self> {
        self.reopen_after(schema, |_| {})
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with a temporary in-memory engine.
pub fn with_temp_engine<F, R>(schema: SchemaBuilder, f: F) -> R
where
    F: FnOnce(&Engine) -> R,
{
    let test_engine = TestEngine::memory(schema);
    f(&test_engine.engine)
}

/// Runs a test with a temporary file-backed engine.
pub fn with_file_engine<F, R>(schema: SchemaBuilder, f: F) -> R
where
    F: FnOnce(&Engine, &std::path::Path) -> R,
{
    let test_engine = TestEngine::file(schema);
    let path = test_engine.path().expect("File engine should have a path");
    f(&test_engine.engine, &path)
}

/// Parses a record from JSON.
pub fn record(json: &str) -> Value {
    serde_json::from_str(json).expect("Invalid record JSON")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use docshelf_core::StoreDefinition;

    /// `users` keyed by `id` with a unique `email` index and an `age` index.
    pub fn users_schema() -> SchemaBuilder {
        SchemaBuilder::new().with_store(
            "users",
            StoreDefinition::new("id")
                .expect("key path")
                .unique_index("email", "email")
                .expect("email index")
                .index("age", "age")
                .expect("age index"),
        )
    }

    /// `notes` with generated numeric keys and a `tag` index.
    pub fn notes_schema() -> SchemaBuilder {
        SchemaBuilder::new().with_store(
            "notes",
            StoreDefinition::new("id")
                .expect("key path")
                .auto_increment(true)
                .index("tag", "tag")
                .expect("tag index"),
        )
    }

    /// A user record.
    pub fn user(id: &str, name: &str, email: &str, age: i64) -> Value {
        Value::map([
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("email", Value::from(email)),
            ("age", Value::Integer(age)),
        ])
    }

    /// Opens an in-memory `users` engine holding `count` users.
    ///
    /// User `i` has id `u{i:04}`, email `user{i}@example.com` and age `20 + i % 50`.
    pub fn populated_users(count: usize) -> TestEngine {
        let test_engine = TestEngine::memory(users_schema());
        for i in 0..count {
            let age = 20 + i64::try_from(i % 50).expect("small");
            test_engine
                .put(
                    "users",
                    user(
                        &format!("u{i:04}"),
                        &format!("User {i}"),
                        &format!("user{i}@example.com"),
                        age,
                    ),
                )
                .expect("Failed to put user");
        }
        test_engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshelf_core::Key;

    #[test]
    fn test_memory_engine() {
        let test_engine = TestEngine::memory(scenarios::users_schema());
        assert_eq!(test_engine.store_names(), ["users"]);
        assert!(test_engine.path().is_none());
    }

    #[test]
    fn test_with_temp_engine() {
        with_temp_engine(scenarios::notes_schema(), |engine| {
            let key = engine.put("notes", record(r#"{"text": "hi"}"#)).unwrap();
            assert_eq!(key, Key::from(1));
        });
    }

    #[test]
    fn test_file_engine_reopens() {
        let test_engine = TestEngine::file(scenarios::users_schema());
        test_engine
            .put("users", scenarios::user("1", "Ana", "ana@x.com", 30))
            .unwrap();
        assert!(test_engine.log_path().unwrap().exists());

        let test_engine = test_engine.reopen(scenarios::users_schema()).unwrap();
        assert_eq!(test_engine.count("users").unwrap(), 1);
    }

    #[test]
    fn test_populated_scenario() {
        let test_engine = scenarios::populated_users(10);
        assert_eq!(test_engine.count("users").unwrap(), 10);
    }
}
