//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// No live record starts at the given id.
    #[error("no live record at id {id}")]
    RecordNotFound {
        /// The record id (file offset) that was looked up.
        id: u64,
    },

    /// A document payload exceeds the maximum record size.
    #[error("document of {len} bytes exceeds the {max} byte limit")]
    DocumentTooLarge {
        /// Payload length in bytes.
        len: usize,
        /// Largest accepted payload.
        max: usize,
    },

    /// Hash table sizing parameters are out of range.
    #[error("invalid hash table geometry: {0}")]
    InvalidGeometry(String),
}
