//! Key ranges.

use crate::key::Key;
use std::ops::Bound;

/// A range over keys, each end open, closed or unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower end.
    pub lower: Bound<Key>,
    /// Upper end.
    pub upper: Bound<Key>,
}

impl KeyRange {
    /// Every key.
    #[must_use]
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Exactly `key`.
    #[must_use]
    pub fn only(key: Key) -> Self {
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys `>= key`.
    #[must_use]
    pub fn at_least(key: Key) -> Self {
        Self {
            lower: Bound::Included(key),
            upper: Bound::Unbounded,
        }
    }

    /// Keys `> key`.
    #[must_use]
    pub fn greater_than(key: Key) -> Self {
        Self {
            lower: Bound::Excluded(key),
            upper: Bound::Unbounded,
        }
    }

    /// Keys `<= key`.
    #[must_use]
    pub fn at_most(key: Key) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(key),
        }
    }

    /// Keys `< key`.
    #[must_use]
    pub fn less_than(key: Key) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(key),
        }
    }

    /// Keys in `lower..=upper`.
    #[must_use]
    pub fn between(lower: Key, upper: Key) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Included(upper),
        }
    }

    /// Whether `key` falls inside the range.
    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(k) => key >= k,
            Bound::Excluded(k) => key > k,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(k) => key <= k,
            Bound::Excluded(k) => key < k,
            Bound::Unbounded => true,
        };
        above && below
    }

    pub(crate) fn bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        (self.lower.as_ref(), self.upper.as_ref())
    }
}
