//! Identifier types for catalog objects.

use std::fmt;

/// Identifier of a physical store.
///
/// Assigned once when the store is created and never reused, so physical
/// keys stay valid if store names are ever reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(pub u32);

impl StoreId {
    /// Creates a store ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store:{}", self.0)
    }
}

/// Identifier of a secondary index, unique across the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexId(pub u32);

impl IndexId {
    /// Creates an index ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(StoreId::new(3).to_string(), "store:3");
        assert_eq!(IndexId::new(7).to_string(), "index:7");
    }

    #[test]
    fn ordering() {
        assert!(StoreId::new(1) < StoreId::new(2));
        assert_eq!(IndexId::new(4).as_u32(), 4);
    }
}
