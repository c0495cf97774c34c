//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// NaN cannot be stored: it breaks equality and key ordering.
    #[error("NaN values are not storable")]
    NaNForbidden,

    /// Indefinite-length items are never produced by the encoder.
    #[error("indefinite-length items are not supported")]
    IndefiniteLength,

    /// Invalid UTF-8 in a text string or map key.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Input continues after the top-level item.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Structurally invalid CBOR.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// A CBOR item with no `Value` counterpart.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// An unsigned integer above `i64::MAX`.
    #[error("integer overflow")]
    IntegerOverflow,

    /// A length prefix larger than the decoder accepts.
    #[error("declared length {claimed} exceeds limit of {max_allowed}")]
    SizeLimitExceeded {
        /// The length announced by the input.
        claimed: u64,
        /// The configured limit.
        max_allowed: u64,
    },

    /// Error reported through the serde bridge.
    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }
}
