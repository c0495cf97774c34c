//! Dynamic structural value type.

use std::fmt;

/// A schema-less structural value.
///
/// Records stored by docshelf are `Value::Map`s. Map entries keep their
/// insertion order: it is observable through the full-text blob, and it
/// survives an encode/decode round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double precision float. NaN is rejected by the encoder.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Field name to value mapping in insertion order.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Creates a map from `(field, value)` pairs, keeping their order.
    ///
    /// A repeated field keeps its first position and its last value.
    pub fn map<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut map = Value::Map(Vec::new());
        for (key, value) in pairs {
            map.insert(key, value);
        }
        map
    }

    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for `Value::Map`.
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a number, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value's entries, if it is a map.
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a field of a map value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v)
    }

    /// Looks up a field of a map value for mutation.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        match self {
            Value::Map(pairs) => pairs.iter_mut().find(|(k, _)| k == field).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Sets a field of a map value.
    ///
    /// An existing field is replaced in place; a new one is appended.
    /// Returns the previous value. Does nothing on non-map values.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        let Value::Map(pairs) = self else {
            return None;
        };
        let field = field.into();
        match pairs.iter_mut().find(|(k, _)| *k == field) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                pairs.push((field, value));
                None
            }
        }
    }

    /// Removes a field of a map value, returning it.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let Value::Map(pairs) = self else {
            return None;
        };
        let pos = pairs.iter().position(|(k, _)| k == field)?;
        Some(pairs.remove(pos).1)
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

/// Renders scalars the way they read in text: `3` for `3.0`, `true`,
/// `ana`. Arrays render as their comma-joined elements, maps as
/// `[object Object]` and null as nothing. Substring filters match
/// against this text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bytes(b) => {
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{byte}")?;
                }
                Ok(())
            }
            Value::Text(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Value {
        Value::map([
            ("id", Value::from("1")),
            ("name", Value::from("Ana")),
            ("age", Value::from(30)),
        ])
    }

    #[test]
    fn map_keeps_insertion_order() {
        let user = user();
        let fields: Vec<&str> = user
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(fields, ["id", "name", "age"]);
    }

    #[test]
    fn repeated_field_keeps_first_position() {
        let map = Value::map([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
            ("a", Value::from(3)),
        ]);
        assert_eq!(
            map,
            Value::Map(vec![
                ("a".to_string(), Value::Integer(3)),
                ("b".to_string(), Value::Integer(2)),
            ])
        );
    }

    #[test]
    fn insert_replaces_in_place_and_appends() {
        let mut record = user();
        assert_eq!(record.insert("name", Value::from("Bea")), Some(Value::from("Ana")));
        assert_eq!(record.insert("email", Value::from("bea@x.com")), None);

        let entries = record.as_map().unwrap();
        assert_eq!(entries[1], ("name".to_string(), Value::from("Bea")));
        assert_eq!(entries[3].0, "email");
    }

    #[test]
    fn remove_field() {
        let mut record = user();
        assert_eq!(record.remove("age"), Some(Value::Integer(30)));
        assert_eq!(record.get("age"), None);
        assert_eq!(record.remove("age"), None);
    }

    #[test]
    fn non_map_mutation_is_a_no_op() {
        let mut text = Value::from("plain");
        assert_eq!(text.insert("x", Value::Null), None);
        assert_eq!(text.remove("x"), None);
        assert_eq!(text, Value::from("plain"));
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Integer(4).as_number(), Some(4.0));
        assert_eq!(Value::Float(1.5).as_number(), Some(1.5));
        assert_eq!(Value::from("x").as_number(), None);
        assert_eq!(user().get("name").and_then(Value::as_text), Some("Ana"));
        assert_eq!(Value::Bytes(vec![1]).as_bytes(), Some(&[1u8][..]));
    }

    #[test]
    fn display_renders_scalars_as_text() {
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::Array(vec![1.into(), "b".into()]).to_string(),
            "1,b"
        );
    }

    #[test]
    fn display_renders_maps_as_objects() {
        let map = Value::map([("city", Value::from("Lima"))]);
        assert_eq!(map.to_string(), "[object Object]");
        assert_eq!(
            Value::Array(vec![map, Value::from(2)]).to_string(),
            "[object Object],2"
        );
    }
}
