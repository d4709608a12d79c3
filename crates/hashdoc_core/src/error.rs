//! Error types for hashdoc collections.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for collection operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in collection operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document file or hash table error.
    #[error("storage error: {0}")]
    Storage(#[from] hashdoc_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No document is stored under the id.
    #[error("document {id} does not exist")]
    DocumentNotFound {
        /// The id that was looked up.
        id: u64,
    },

    /// The stored bytes of a document do not parse.
    #[error("document {id} is corrupted: {source}")]
    DocumentCorrupt {
        /// The id of the unreadable document.
        id: u64,
        /// Parse failure.
        source: serde_json::Error,
    },

    /// A document or the index config could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The path already has an index.
    #[error("path {path:?} is already indexed")]
    DuplicateIndex {
        /// The indexed path.
        path: Vec<String>,
    },

    /// The path has no index.
    #[error("path {path:?} is not indexed")]
    IndexNotFound {
        /// The requested path.
        path: Vec<String>,
    },

    /// The path cannot be indexed.
    #[error("invalid index path: {message}")]
    InvalidPath {
        /// Why the path was rejected.
        message: String,
    },

    /// The persisted index config does not parse.
    #[error("config file {} is corrupted: {source}", path.display())]
    ConfigCorrupt {
        /// Config file path.
        path: PathBuf,
        /// Parse failure.
        source: serde_json::Error,
    },

    /// Reading or writing the index config (or its backup) failed.
    #[error("config file {} I/O error: {source}", path.display())]
    ConfigIo {
        /// File that failed.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },

    /// Deleting an index file failed.
    #[error("index file {} I/O error: {source}", path.display())]
    IndexFileIo {
        /// Index file path.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },

    /// Another handle holds the collection directory lock.
    #[error("collection locked: another handle has exclusive access")]
    CollectionLocked,
}

impl CoreError {
    /// Creates a config I/O error.
    pub fn config_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// Creates an index file I/O error.
    pub fn index_file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::IndexFileIo {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Returns true for errors that mean "no such document".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let err = CoreError::DocumentNotFound { id: 42 };
        assert_eq!(err.to_string(), "document 42 does not exist");
        assert!(err.is_not_found());

        let err = CoreError::DuplicateIndex {
            path: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("[\"a\", \"b\"]"));

        let err = CoreError::config_io(
            "/tmp/col/config",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/col/config"));
        assert!(!err.is_not_found());
    }
}
