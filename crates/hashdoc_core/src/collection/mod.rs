//! Document collections with secondary hash indexes.
//!
//! A [`Collection`] keeps a document file and one hash table per indexed
//! field path in step with each other:
//!
//! - document operations (`insert`, `update`, `delete`) write the document
//!   file first, then fan the change out to every index
//! - index operations (`add_index`, `remove_index`) persist the manifest,
//!   reopen every hash table and, for a new index, scan the whole corpus
//!
//! Document operations take `&self` and may run from several threads.
//! Structural operations take `&mut self`, so the borrow checker enforces
//! that no document operation is in flight while tables are reopened.

mod index;
mod persist;
mod scan;

use crate::config::Config;
use crate::dir::CollectionDir;
use crate::error::{CoreError, CoreResult};
use crate::indexer::Indexes;
use crate::manifest::Manifest;
use hashdoc_storage::{check_document_size, DocumentFile};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// A directory-backed collection of JSON documents.
///
/// # Example
///
/// ```rust,no_run
/// use hashdoc_core::{Collection, Config};
/// use serde_json::json;
///
/// let mut users = Collection::open("data/users", Config::default())?;
/// users.add_index(&["address", "city"])?;
///
/// let id = users.insert(&json!({"name": "alice", "address": {"city": "Oslo"}}))?;
/// assert_eq!(users.lookup(&["address", "city"], &json!("Oslo"), 0)?, vec![id]);
/// # Ok::<(), hashdoc_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct Collection {
    dir: CollectionDir,
    config: Config,
    data: DocumentFile,
    manifest: Manifest,
    indexes: Indexes,
}

impl Collection {
    /// Opens or creates the collection stored in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or locked, the
    /// document file cannot be opened, or the index manifest cannot be loaded.
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let dir = CollectionDir::open(path.as_ref(), config.create_if_missing)?;
        let data = DocumentFile::open(&dir.data_path())?;
        dir.ensure_config()?;

        let mut collection = Self {
            dir,
            config,
            data,
            manifest: Manifest::default(),
            indexes: Indexes::default(),
        };
        collection.load_config()?;

        debug!(
            dir = %collection.dir.path().display(),
            indexes = collection.indexes.len(),
            "collection opened"
        );
        Ok(collection)
    }

    /// Returns the collection directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the options this collection was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if there is no such document and
    /// `DocumentCorrupt` if its stored bytes do not parse.
    pub fn read(&self, id: u64) -> CoreResult<Value> {
        let bytes = self
            .data
            .read(id)?
            .ok_or(CoreError::DocumentNotFound { id })?;
        serde_json::from_slice(&bytes).map_err(|source| {
            warn!(id, dir = %self.dir.path().display(), error = %source, "cannot parse document");
            CoreError::DocumentCorrupt { id, source }
        })
    }

    /// Stores a new document and indexes it. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the document cannot be encoded, or the
    /// document file's error. No index entries exist after a failure.
    pub fn insert(&self, doc: &Value) -> CoreResult<u64> {
        let bytes = serde_json::to_vec(doc)?;
        let id = self.data.insert(&bytes)?;
        self.indexes.index_document(id, doc);
        Ok(id)
    }

    /// [`insert`](Self::insert), then [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// As `insert`; a flush failure is reported after the document is stored.
    pub fn durable_insert(&self, doc: &Value) -> CoreResult<u64> {
        let id = self.insert(doc)?;
        self.flush()?;
        Ok(id)
    }

    /// Replaces the document under `id` and returns the id it now lives at.
    ///
    /// The returned id may differ from `id` when the document had to move;
    /// the old id is invalid afterwards and no index refers to it any more.
    /// A stored document that no longer parses is overwritten without being
    /// unindexed first.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if there is no such document,
    /// `Serialization` if `doc` cannot be encoded, or the document file's error.
    pub fn update(&self, id: u64, doc: &Value) -> CoreResult<u64> {
        let bytes = serde_json::to_vec(doc)?;
        check_document_size(&bytes)?;
        let old_bytes = self
            .data
            .read(id)?
            .ok_or(CoreError::DocumentNotFound { id })?;

        match serde_json::from_slice::<Value>(&old_bytes) {
            Ok(old_doc) => self.indexes.unindex_document(id, &old_doc),
            Err(err) => warn!(
                id,
                dir = %self.dir.path().display(),
                error = %err,
                "stored document is corrupted, overwriting it"
            ),
        }

        let new_id = self.data.update(id, &bytes)?;
        self.indexes.index_document(new_id, doc);
        Ok(new_id)
    }

    /// [`update`](Self::update), then [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// As `update`; a flush failure is reported after the update is applied.
    pub fn durable_update(&self, id: u64, doc: &Value) -> CoreResult<u64> {
        let new_id = self.update(id, doc)?;
        self.flush()?;
        Ok(new_id)
    }

    /// Deletes the document under `id` and its index entries.
    ///
    /// Deleting a document that does not exist, or cannot be parsed, does
    /// nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns the document file's error if the delete itself fails.
    pub fn delete(&self, id: u64) -> CoreResult<()> {
        let Ok(old_doc) = self.read(id) else {
            return Ok(());
        };
        self.data.delete(id)?;
        self.indexes.unindex_document(id, &old_doc);
        Ok(())
    }

    /// [`delete`](Self::delete), then [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// As `delete`, plus any flush failure.
    pub fn durable_delete(&self, id: u64) -> CoreResult<()> {
        self.delete(id)?;
        self.flush()
    }
}
