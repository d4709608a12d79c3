//! # hashdoc core
//!
//! Document collections that keep any number of secondary hash indexes
//! consistent with the documents they cover.
//!
//! This crate provides:
//! - Field extraction along a path of object keys ([`get_in`])
//! - The value hash used as index key ([`hash_value`])
//! - The persisted index manifest ([`Manifest`], [`IndexConf`])
//! - [`Collection`]: document insert/read/update/delete with concurrent
//!   index maintenance, runtime index add/remove, scans, flush and close
//!
//! ## Example
//!
//! ```rust
//! use hashdoc_core::{Collection, Config};
//! use serde_json::json;
//!
//! let temp = tempfile::tempdir().unwrap();
//! let mut col = Collection::open(temp.path(), Config::default().hash_bits(8)).unwrap();
//! col.add_index(&["a", "b"]).unwrap();
//!
//! let id = col.insert(&json!({"a": {"b": [1, 2, 3]}})).unwrap();
//! assert_eq!(col.lookup(&["a", "b"], &json!(2), 0).unwrap(), vec![id]);
//! col.close();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod dir;
mod error;
mod extract;
mod hash;
mod indexer;
mod manifest;

pub use collection::Collection;
pub use config::{Config, DEFAULT_BUCKET_CAPACITY, DEFAULT_HASH_BITS};
pub use error::{CoreError, CoreResult};
pub use extract::get_in;
pub use hash::{canonical_text, hash_value, str_hash, NULL_SENTINEL};
pub use manifest::{index_file_name, path_key, IndexConf, Manifest, PATH_DELIMITER};

/// Documents are untyped JSON trees.
pub use serde_json::Value;
