//! Persisted catalog of stores and indexes.
//!
//! The catalog is the on-disk counterpart of the schema: it records which
//! stores and indexes physically exist, with the IDs their keys are laid
//! out under. It lives as a single CBOR value under the catalog key and is
//! rewritten in the same batch as any change it describes.

use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use crate::schema::{IndexDefinition, StoreDefinition};
use crate::types::{IndexId, StoreId};
use docshelf_codec::{from_cbor, to_cbor, CodecError, Value};

/// Current catalog format.
pub const CATALOG_FORMAT: u32 = 1;

/// A persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    /// Physical ID.
    pub id: IndexId,
    /// Index name.
    pub name: String,
    /// Indexed path.
    pub key_path: KeyPath,
    /// Uniqueness.
    pub unique: bool,
}

impl IndexMeta {
    /// Whether this index was created from an equivalent definition.
    #[must_use]
    pub fn matches(&self, def: &IndexDefinition) -> bool {
        self.key_path == def.key_path && self.unique == def.unique
    }
}

/// A persisted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMeta {
    /// Physical ID.
    pub id: StoreId,
    /// Store name.
    pub name: String,
    /// Primary key path.
    pub key_path: KeyPath,
    /// Whether missing keys are generated.
    pub auto_increment: bool,
    /// Indexes in creation order.
    pub indexes: Vec<IndexMeta>,
}

impl StoreMeta {
    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// The persisted catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Schema version last opened with. Zero for a fresh database.
    pub version: u32,
    /// Next store ID to hand out.
    pub next_store_id: u32,
    /// Next index ID to hand out.
    pub next_index_id: u32,
    /// Stores in creation order.
    pub stores: Vec<StoreMeta>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Creates the catalog of an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: 0,
            next_store_id: 1,
            next_index_id: 1,
            stores: Vec::new(),
        }
    }

    /// Looks up a store by name.
    #[must_use]
    pub fn store(&self, name: &str) -> Option<&StoreMeta> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// Looks up a store by name, failing with `StoreNotFound`.
    pub fn require_store(&self, name: &str) -> CoreResult<&StoreMeta> {
        self.store(name)
            .ok_or_else(|| CoreError::store_not_found(name))
    }

    /// Adds a store and all of its indexes, assigning fresh IDs.
    pub fn add_store(&mut self, name: &str, def: &StoreDefinition) -> &StoreMeta {
        let id = StoreId::new(self.next_store_id);
        self.next_store_id += 1;
        let indexes = def
            .indexes
            .iter()
            .map(|index| self.allocate_index(index))
            .collect();
        self.stores.push(StoreMeta {
            id,
            name: name.to_string(),
            key_path: def.key_path.clone(),
            auto_increment: def.auto_increment,
            indexes,
        });
        &self.stores[self.stores.len() - 1]
    }

    /// Adds an index to an existing store.
    pub fn add_index(&mut self, store: &str, def: &IndexDefinition) -> CoreResult<IndexMeta> {
        let meta = self.allocate_index(def);
        let slot = self
            .stores
            .iter_mut()
            .find(|s| s.name == store)
            .ok_or_else(|| CoreError::store_not_found(store))?;
        slot.indexes.push(meta.clone());
        Ok(meta)
    }

    fn allocate_index(&mut self, def: &IndexDefinition) -> IndexMeta {
        let id = IndexId::new(self.next_index_id);
        self.next_index_id += 1;
        IndexMeta {
            id,
            name: def.name.clone(),
            key_path: def.key_path.clone(),
            unique: def.unique,
        }
    }

    /// Encodes the catalog to CBOR.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(to_cbor(&self.to_value())?)
    }

    /// Decodes a catalog from CBOR.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }

    fn to_value(&self) -> Value {
        let stores = self
            .stores
            .iter()
            .map(|s| {
                let indexes = s
                    .indexes
                    .iter()
                    .map(|i| {
                        Value::map([
                            ("id", Value::from(i.id.as_u32())),
                            ("name", Value::from(i.name.as_str())),
                            ("key_path", Value::from(i.key_path.as_str())),
                            ("unique", Value::from(i.unique)),
                        ])
                    })
                    .collect::<Vec<_>>();
                Value::map([
                    ("id", Value::from(s.id.as_u32())),
                    ("name", Value::from(s.name.as_str())),
                    ("key_path", Value::from(s.key_path.as_str())),
                    ("auto_increment", Value::from(s.auto_increment)),
                    ("indexes", Value::Array(indexes)),
                ])
            })
            .collect::<Vec<_>>();
        Value::map([
            ("format", Value::from(CATALOG_FORMAT)),
            ("version", Value::from(self.version)),
            ("next_store_id", Value::from(self.next_store_id)),
            ("next_index_id", Value::from(self.next_index_id)),
            ("stores", Value::Array(stores)),
        ])
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        let format = u32_field(value, "format")?;
        if format != CATALOG_FORMAT {
            return Err(malformed(format!("unsupported catalog format {format}")));
        }
        let stores = array_field(value, "stores")?
            .iter()
            .map(|s| {
                let indexes = array_field(s, "indexes")?
                    .iter()
                    .map(|i| {
                        Ok(IndexMeta {
                            id: IndexId::new(u32_field(i, "id")?),
                            name: text_field(i, "name")?.to_string(),
                            key_path: KeyPath::parse(text_field(i, "key_path")?)?,
                            unique: bool_field(i, "unique")?,
                        })
                    })
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(StoreMeta {
                    id: StoreId::new(u32_field(s, "id")?),
                    name: text_field(s, "name")?.to_string(),
                    key_path: KeyPath::parse(text_field(s, "key_path")?)?,
                    auto_increment: bool_field(s, "auto_increment")?,
                    indexes,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            version: u32_field(value, "version")?,
            next_store_id: u32_field(value, "next_store_id")?,
            next_index_id: u32_field(value, "next_index_id")?,
            stores,
        })
    }
}

fn malformed(message: impl Into<String>) -> CoreError {
    CoreError::Codec(CodecError::invalid_structure(format!(
        "catalog: {}",
        message.into()
    )))
}

fn field<'v>(value: &'v Value, name: &str) -> CoreResult<&'v Value> {
    value
        .get(name)
        .ok_or_else(|| malformed(format!("missing field `{name}`")))
}

fn u32_field(value: &Value, name: &str) -> CoreResult<u32> {
    field(value, name)?
        .as_integer()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| malformed(format!("field `{name}` is not a u32")))
}

fn text_field<'v>(value: &'v Value, name: &str) -> CoreResult<&'v str> {
    field(value, name)?
        .as_text()
        .ok_or_else(|| malformed(format!("field `{name}` is not text")))
}

fn bool_field(value: &Value, name: &str) -> CoreResult<bool> {
    field(value, name)?
        .as_bool()
        .ok_or_else(|| malformed(format!("field `{name}` is not a bool")))
}

fn array_field<'v>(value: &'v Value, name: &str) -> CoreResult<&'v [Value]> {
    field(value, name)?
        .as_array()
        .ok_or_else(|| malformed(format!("field `{name}` is not an array")))
}
