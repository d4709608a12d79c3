//! # hashdoc testkit
//!
//! Test utilities for hashdoc.
//!
//! This crate provides:
//! - Temporary collections that clean up after themselves
//! - Helpers to inspect index entries and to damage stored documents
//! - Property-based test generators for JSON documents
//!
//! ## Usage
//!
//! ```rust
//! use hashdoc_testkit::prelude::*;
//! use serde_json::json;
//!
//! with_temp_collection(|col| {
//!     let id = col.insert(&json!({"a": 1})).unwrap();
//!     assert_eq!(col.read(id).unwrap(), json!({"a": 1}));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
