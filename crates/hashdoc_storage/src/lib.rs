//! # hashdoc storage
//!
//! The two primitive stores a hashdoc collection is built on, plus the
//! byte-level backend they share.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, write, append, flush)
//! - [`DocumentFile`] stores opaque payloads under relocatable 64-bit ids
//! - [`HashTable`] maps 64-bit keys to 64-bit values in chained buckets
//! - Neither store knows anything about JSON, field paths or collections
//!
//! ## Example
//!
//! ```rust
//! use hashdoc_storage::{DocumentFile, HashTable, InMemoryBackend};
//!
//! let docs = DocumentFile::new(InMemoryBackend::new());
//! let index = HashTable::new(InMemoryBackend::new(), 4, 8).unwrap();
//!
//! let id = docs.insert(b"{\"name\":\"alice\"}").unwrap();
//! index.put(0xA11CE, id).unwrap();
//! assert_eq!(index.get(0xA11CE, 1, |_| true).unwrap(), vec![id]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod document;
mod error;
mod file;
mod hash_table;
mod memory;

pub use backend::StorageBackend;
pub use document::{check_document_size, DocumentFile, MAX_DOCUMENT_SIZE, RECORD_HEADER_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use hash_table::{HashTable, MAX_BUCKET_CAPACITY, MAX_HASH_BITS};
pub use memory::InMemoryBackend;
