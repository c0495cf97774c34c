//! Dotted key paths into record maps.

use crate::error::{CoreError, CoreResult};
use docshelf_codec::Value;
use std::fmt;

/// A dotted path such as `id` or `address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Parses a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw.is_empty() {
            return Err(CoreError::invalid_schema("key path is empty"));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::invalid_schema(format!(
                "key path {raw:?} has an empty segment"
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// A single-segment path naming a top-level field.
    pub(crate) fn field(name: &str) -> Self {
        Self {
            raw: name.to_string(),
            segments: vec![name.to_string()],
        }
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the first segment of the path.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Looks the path up in `record`.
    ///
    /// Null is reported as absent.
    #[must_use]
    pub fn extract<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        let mut current = record;
        for segment in &self.segments {
            current = current.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// Writes `value` at the path, creating intermediate maps.
    ///
    /// Returns `false` when a non-map value sits on the way.
    pub fn inject(&self, record: &mut Value, value: Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            return false;
        };
        let mut current = record;
        for segment in parents {
            if !current.is_map() {
                return false;
            }
            let missing = current.get(segment).map_or(true, Value::is_null);
            if missing {
                current.insert(segment.clone(), Value::Map(Vec::new()));
            }
            let Some(next) = current.get_mut(segment) else {
                return false;
            };
            current = next;
        }
        if !current.is_map() {
            return false;
        }
        current.insert(last.clone(), value);
        true
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
