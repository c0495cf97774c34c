//! # docshelf storage
//!
//! Byte-level storage backends for the docshelf commit log.
//!
//! A backend is an append-only byte sink with random reads. It knows
//! nothing about frames, batches or records: `docshelf_core` owns the
//! commit log format and rebuilds its ordered keyspace from these bytes.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral databases and tests
//! - [`FileBackend`] - a single file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use docshelf_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
