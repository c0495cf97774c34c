//! # docshelf Testkit
//!
//! Test utilities for docshelf.
//!
//! This crate provides:
//! - Engine fixtures backed by memory or a temporary directory
//! - Property-based test generators using proptest
//! - A shadow-model harness that checks the engine against a `BTreeMap`
//! - Helpers that damage a commit log the way a crash would
//! - Concurrent stress runs over a shared engine
//!
//! ## Usage
//!
//! ```rust
//! use docshelf_testkit::prelude::*;
//!
//! with_temp_engine(scenarios::users_schema(), |engine| {
//!     engine.put("users", record(r#"{"id": "1", "name": "Ana"}"#)).unwrap();
//!     assert_eq!(engine.count("users").unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
