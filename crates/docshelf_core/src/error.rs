//! Error types for docshelf core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the engine.
///
/// A missing record is not an error: [`crate::Engine::get`] returns
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The database could not be opened or migrated. Every later call on
    /// the same configuration fails the same way until the cause is fixed.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// What went wrong.
        reason: String,
    },

    /// A write would put a second record under the same key of a unique
    /// index. Nothing was written.
    #[error("unique index `{index}` of store `{store}` already holds key {key}")]
    ConstraintViolation {
        /// Store being written.
        store: String,
        /// The unique index.
        index: String,
        /// The conflicting index key, rendered as text.
        key: String,
    },

    /// The filter cannot be evaluated against the chosen source.
    #[error("invalid filter: {message}")]
    InvalidFilter {
        /// Why the filter was rejected.
        message: String,
    },

    /// No store with this name exists.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// The requested store.
        name: String,
    },

    /// The store has no index with this name.
    #[error("index `{index}` not found on store `{store}`")]
    IndexNotFound {
        /// The store searched.
        store: String,
        /// The requested index.
        index: String,
    },

    /// The record cannot be stored: not a map, or no usable primary key.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Why the record was rejected.
        message: String,
    },

    /// A store or index definition is malformed.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// What is wrong with the definition.
        message: String,
    },

    /// A configuration value is malformed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        message: String,
    },

    /// The commit log holds bytes that are not a valid frame.
    #[error("commit log corrupted at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docshelf_storage::StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docshelf_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a storage unavailable error.
    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates a store not found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Folds a failure raised while opening into `StorageUnavailable`.
    ///
    /// Configuration and schema errors are caller mistakes and keep
    /// their own kind.
    pub(crate) fn into_unavailable(self) -> Self {
        match self {
            e @ (Self::StorageUnavailable { .. }
            | Self::InvalidSchema { .. }
            | Self::InvalidConfig { .. }) => e,
            other => Self::storage_unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_become_storage_unavailable() {
        let err = CoreError::log_corruption(64, "bad crc").into_unavailable();
        match err {
            CoreError::StorageUnavailable { reason } => {
                assert!(reason.contains("offset 64"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn caller_mistakes_keep_their_kind() {
        assert!(matches!(
            CoreError::invalid_schema("empty key path").into_unavailable(),
            CoreError::InvalidSchema { .. }
        ));
        assert!(matches!(
            CoreError::invalid_config("version 0").into_unavailable(),
            CoreError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn constraint_violation_message() {
        let err = CoreError::ConstraintViolation {
            store: "users".into(),
            index: "email".into(),
            key: "ana@x.com".into(),
        };
        assert_eq!(
            err.to_string(),
            "unique index `email` of store `users` already holds key ana@x.com"
        );
    }
}
