//! Query filters and pagination.

use super::KeyRange;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use docshelf_codec::Value;
use std::fmt;

/// A filter over one source: a store or one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Keys equal to the value.
    Eq(Value),
    /// Text keys starting with the value.
    Prefix(Value),
    /// Keys `>=` the value.
    Gte(Value),
    /// Keys `<=` the value.
    Lte(Value),
    /// Keys `>` the value.
    Gt(Value),
    /// Keys `<` the value.
    Lt(Value),
    /// Case-insensitive substring match over the whole source.
    Substring {
        /// Text to look for.
        value: String,
        /// Record field to test. Without one the source key is tested.
        field: Option<String>,
    },
}

/// Discriminant of a [`QueryFilter`], for logs and CLI parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// [`QueryFilter::Eq`]
    Eq,
    /// [`QueryFilter::Prefix`]
    Prefix,
    /// [`QueryFilter::Gte`]
    Gte,
    /// [`QueryFilter::Lte`]
    Lte,
    /// [`QueryFilter::Gt`]
    Gt,
    /// [`QueryFilter::Lt`]
    Lt,
    /// [`QueryFilter::Substring`]
    Substring,
}

impl FilterKind {
    /// Parses a lowercase kind name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "prefix" => Some(Self::Prefix),
            "gte" => Some(Self::Gte),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "substring" => Some(Self::Substring),
            _ => None,
        }
    }

    /// Lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Prefix => "prefix",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Substring => "substring",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QueryFilter {
    /// Substring filter over the source key.
    #[must_use]
    pub fn substring(value: impl Into<String>) -> Self {
        Self::Substring {
            value: value.into(),
            field: None,
        }
    }

    /// Substring filter over a record field.
    #[must_use]
    pub fn substring_in(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Substring {
            value: value.into(),
            field: Some(field.into()),
        }
    }

    /// Builds a filter of `kind` around `value`.
    ///
    /// Substring filters take the value's text rendering.
    #[must_use]
    pub fn from_kind(kind: FilterKind, value: Value, field: Option<String>) -> Self {
        match kind {
            FilterKind::Eq => Self::Eq(value),
            FilterKind::Prefix => Self::Prefix(value),
            FilterKind::Gte => Self::Gte(value),
            FilterKind::Lte => Self::Lte(value),
            FilterKind::Gt => Self::Gt(value),
            FilterKind::Lt => Self::Lt(value),
            FilterKind::Substring => Self::Substring {
                value: value.to_string(),
                field,
            },
        }
    }

    /// The filter's kind.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Eq(_) => FilterKind::Eq,
            Self::Prefix(_) => FilterKind::Prefix,
            Self::Gte(_) => FilterKind::Gte,
            Self::Lte(_) => FilterKind::Lte,
            Self::Gt(_) => FilterKind::Gt,
            Self::Lt(_) => FilterKind::Lt,
            Self::Substring { .. } => FilterKind::Substring,
        }
    }

    /// The key range a range filter scans, or `None` for substring
    /// filters, which scan everything.
    pub fn to_range(&self) -> CoreResult<Option<KeyRange>> {
        let range = match self {
            Self::Eq(v) => KeyRange::only(comparison_key(v)?),
            Self::Gte(v) => KeyRange::at_least(comparison_key(v)?),
            Self::Lte(v) => KeyRange::at_most(comparison_key(v)?),
            Self::Gt(v) => KeyRange::greater_than(comparison_key(v)?),
            Self::Lt(v) => KeyRange::less_than(comparison_key(v)?),
            Self::Prefix(v) => {
                let prefix = v.as_text().ok_or_else(|| {
                    CoreError::invalid_filter(format!(
                        "prefix needs a text value, got {}",
                        v.type_name()
                    ))
                })?;
                let mut upper = prefix.to_string();
                upper.push(char::MAX);
                KeyRange::between(Key::from(prefix), Key::from(upper))
            }
            Self::Substring { .. } => return Ok(None),
        };
        Ok(Some(range))
    }
}

fn comparison_key(value: &Value) -> CoreResult<Key> {
    Key::from_value(value).ok_or_else(|| {
        CoreError::invalid_filter(format!("{} is not a valid key", value.type_name()))
    })
}

/// One page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub rows: u32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self { page: 1, rows: 30 }
    }
}

impl PageOptions {
    /// Page `page` of `rows` rows.
    #[must_use]
    pub const fn new(page: u32, rows: u32) -> Self {
        Self { page, rows }
    }

    /// Rejects zero pages and rows.
    pub fn validate(&self) -> CoreResult<()> {
        if self.page == 0 {
            return Err(CoreError::invalid_filter("page numbers start at 1"));
        }
        if self.rows == 0 {
            return Err(CoreError::invalid_filter("rows must be at least 1"));
        }
        Ok(())
    }

    /// Entries to skip before the page starts.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.rows as usize)
    }

    /// Maximum entries on the page.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.rows as usize
    }
}
