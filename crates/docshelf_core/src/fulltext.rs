//! Full-text blob construction.
//!
//! Every record written through the engine carries a lowercase, `|`-joined
//! rendering of its scalar fields under [`FULLTEXT_FIELD`], indexed by the
//! hidden [`crate::schema::FULLTEXT_INDEX`]. Searching is then a
//! substring match over that index.

use crate::schema::FULLTEXT_FIELD;
use docshelf_codec::Value;

const SEPARATOR: char = '|';

/// Builds the full-text blob of `record`.
///
/// Scalars are visited depth first, maps in insertion order and arrays by
/// position. Text, numbers and booleans contribute; null, bytes and
/// containers themselves do not. A previous blob at the root is skipped.
///
/// A plain field name in `exclude_field` drops every field of that name,
/// at any depth. A dotted path drops only the subtree at that exact path.
#[must_use]
pub fn build_full_text(record: &Value, exclude_field: Option<&str>) -> String {
    let exclude: Vec<&str> = exclude_field
        .map(|path| path.split('.').collect())
        .unwrap_or_default();
    let mut tokens = Vec::new();
    let mut path = Vec::new();
    collect(record, &exclude, &mut path, &mut tokens);
    tokens.join(&SEPARATOR.to_string()).to_lowercase()
}

fn collect<'v>(
    value: &'v Value,
    exclude: &[&str],
    path: &mut Vec<&'v str>,
    tokens: &mut Vec<String>,
) {
    match value {
        Value::Map(fields) => {
            for (name, child) in fields {
                if path.is_empty() && name == FULLTEXT_FIELD {
                    continue;
                }
                path.push(name);
                let excluded = match exclude {
                    [field] => name.as_str() == *field,
                    _ => path.as_slice() == exclude,
                };
                if !excluded {
                    collect(child, exclude, path, tokens);
                }
                path.pop();
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, exclude, path, tokens);
            }
        }
        Value::Text(s) => tokens.push(s.clone()),
        Value::Integer(_) | Value::Float(_) | Value::Bool(_) => tokens.push(value.to_string()),
        Value::Null | Value::Bytes(_) => {}
    }
}
