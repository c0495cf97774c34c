//! # docshelf codec
//!
//! The structural [`Value`] type stored by docshelf, and its CBOR form.
//!
//! - Maps keep insertion order through encode and decode
//! - Integers use the shortest encoding, floats are written as 64-bit
//! - NaN is rejected, so stored values always compare equal to themselves
//! - Lengths are definite
//!
//! ## Usage
//!
//! ```
//! use docshelf_codec::{from_cbor, to_cbor, Value};
//!
//! let record = Value::map([("id", Value::from("1")), ("name", Value::from("Ana"))]);
//! let bytes = to_cbor(&record).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod serde_impl;
mod value;

pub use decoder::{from_cbor, Decoder};
pub use encoder::{to_cbor, Encoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;
