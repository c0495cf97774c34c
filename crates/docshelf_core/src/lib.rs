//! # docshelf core
//!
//! Embedded document store engine.
//!
//! This crate provides:
//! - Order-preserving keys and dotted key paths
//! - A schema registry consumed when the engine opens
//! - A commit log and the ordered keyspace replayed from it
//! - Open-time migration of stores and indexes
//! - Commit log compaction
//! - Record CRUD with secondary and full-text index maintenance
//! - Range, prefix and substring queries with offset paging

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
#[cfg(feature = "std")]
mod dir;
mod engine;
mod error;
mod fulltext;
mod key;
mod kv;
mod layout;
mod log;
mod migration;
mod query;
mod schema;
mod stats;
mod transaction;
mod types;
mod verify;

pub use catalog::{Catalog, IndexMeta, StoreMeta};
pub use config::{Config, DEFAULT_AUTO_COMPACT_BYTES, ENV_DATA_DIR, ENV_DB_NAME, ENV_DB_VERSION};
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use fulltext::build_full_text;
pub use key::{decode_key, encode_key, Key, KeyPath};
pub use migration::MigrationOperation;
pub use query::{FilterKind, KeyRange, PageOptions, QueryFilter};
pub use schema::{IndexDefinition, SchemaBuilder, StoreDefinition, FULLTEXT_FIELD, FULLTEXT_INDEX};
pub use stats::{CompactionReport, EngineStats, IndexSummary, StatsSnapshot, StoreSummary};
pub use transaction::{Cursor, CursorEntry, ReadTransaction};
pub use types::{IndexId, StoreId};
pub use verify::VerifyReport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
