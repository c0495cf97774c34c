//! Keys: the subset of values that can be ordered and indexed.
//!
//! A [`Key`] is a number, a text string, a byte string or an array of
//! keys. Keys of different kinds order as
//! `Number < Text < Bytes < Array`.

mod encoding;
mod path;

pub use encoding::{decode_key, encode_key, encode_key_into};
pub use path::KeyPath;

use docshelf_codec::Value;
use std::cmp::Ordering;
use std::fmt;

/// An orderable key.
#[derive(Debug, Clone)]
pub enum Key {
    /// A finite number. `-0.0` and `0.0` are the same key.
    Number(f64),
    /// A UTF-8 string, ordered by code point.
    Text(String),
    /// A byte string, ordered lexicographically.
    Bytes(Vec<u8>),
    /// An array of keys, ordered element-wise then by length.
    Array(Vec<Key>),
}

impl Key {
    /// Converts a value into a key.
    ///
    /// Returns `None` for null, booleans, maps, NaN, and arrays holding
    /// any of those.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(Self::Number(*n as f64)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(Self::Number(*f)),
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Bytes(b) => Some(Self::Bytes(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Null | Value::Bool(_) | Value::Map(_) => None,
        }
    }

    /// Converts the key back into a value.
    ///
    /// Integral numbers that fit an `i64` come back as integers.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => number_to_value(*n),
            Self::Text(s) => Value::Text(s.clone()),
            Self::Bytes(b) => Value::Bytes(b.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    /// Returns the number if this is a numeric key.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Bytes(_) => 2,
            Self::Array(_) => 3,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::Integer(n as i64)
    } else {
        Value::Float(n)
    }
}

fn normalize(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => normalize(*a).total_cmp(&normalize(*b)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", number_to_value(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => {
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{byte}")?;
                }
                Ok(())
            }
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Key {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
