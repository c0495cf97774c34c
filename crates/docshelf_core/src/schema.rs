//! Schema registry: store and index definitions declared before open.
//!
//! Definitions are collected on a [`SchemaBuilder`] and handed to
//! [`crate::Engine::open`], which consumes the builder. Nothing touches
//! storage until then.

use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;

/// Name of the hidden index every store carries.
pub const FULLTEXT_INDEX: &str = "__fulltext";

/// Field written into every record to feed [`FULLTEXT_INDEX`].
pub const FULLTEXT_FIELD: &str = "__fulltext";

/// A secondary index over one key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name, unique within its store.
    pub name: String,
    /// Path of the indexed field.
    pub key_path: KeyPath,
    /// Whether two records may share an index key.
    pub unique: bool,
}

impl IndexDefinition {
    /// Creates a non-unique index definition.
    pub fn new(name: impl Into<String>, key_path: &str) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::invalid_schema("index name is empty"));
        }
        Ok(Self {
            name,
            key_path: KeyPath::parse(key_path)?,
            unique: false,
        })
    }

    fn full_text() -> Self {
        Self {
            name: FULLTEXT_INDEX.to_string(),
            key_path: KeyPath::field(FULLTEXT_FIELD),
            unique: false,
        }
    }
}

/// Definition of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDefinition {
    /// Path of the primary key inside each record.
    pub key_path: KeyPath,
    /// Whether missing primary keys are generated.
    pub auto_increment: bool,
    /// Secondary indexes, in declaration order.
    pub indexes: Vec<IndexDefinition>,
}

impl StoreDefinition {
    /// Creates a store keyed by `key_path`, without indexes.
    pub fn new(key_path: &str) -> CoreResult<Self> {
        Ok(Self {
            key_path: KeyPath::parse(key_path)?,
            auto_increment: false,
            indexes: Vec::new(),
        })
    }

    /// Sets the auto-increment policy.
    #[must_use]
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Adds a non-unique index.
    pub fn index(self, name: &str, key_path: &str) -> CoreResult<Self> {
        self.with_index(IndexDefinition::new(name, key_path)?)
    }

    /// Adds a unique index.
    pub fn unique_index(self, name: &str, key_path: &str) -> CoreResult<Self> {
        let mut index = IndexDefinition::new(name, key_path)?;
        index.unique = true;
        self.with_index(index)
    }

    /// Adds a prepared index definition.
    pub fn with_index(mut self, index: IndexDefinition) -> CoreResult<Self> {
        if self.find_index(&index.name).is_some() {
            return Err(CoreError::invalid_schema(format!(
                "index {:?} declared twice",
                index.name
            )));
        }
        self.indexes.push(index);
        Ok(self)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Collects store definitions until the engine is opened.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    stores: Vec<(String, StoreDefinition)>,
}

impl SchemaBuilder {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under `name`.
    ///
    /// Adds the full-text index when the definition lacks one. Registering
    /// the same name again replaces the earlier definition.
    pub fn ensure_store(&mut self, name: &str, mut definition: StoreDefinition) -> &mut Self {
        if definition.find_index(FULLTEXT_INDEX).is_none() {
            definition.indexes.push(IndexDefinition::full_text());
        }
        if let Some(slot) = self.stores.iter_mut().find(|(n, _)| n == name) {
            tracing::warn!(store = name, "store registered twice, keeping the last definition");
            slot.1 = definition;
        } else {
            self.stores.push((name.to_string(), definition));
        }
        self
    }

    /// Chaining form of [`SchemaBuilder::ensure_store`].
    #[must_use]
    pub fn with_store(mut self, name: &str, definition: StoreDefinition) -> Self {
        self.ensure_store(name, definition);
        self
    }

    /// Returns the definition registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StoreDefinition> {
        self.stores.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Iterates over registered stores in registration order.
    pub fn stores(&self) -> impl Iterator<Item = (&str, &StoreDefinition)> {
        self.stores.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no store has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
