//! Adding, removing and probing secondary indexes.

use super::Collection;
use crate::error::{CoreError, CoreResult};
use crate::extract::get_in;
use crate::hash::{canonical_text, hash_value};
use crate::manifest::{path_key, IndexConf};
use serde_json::Value;
use std::collections::HashSet;
use std::ops::ControlFlow;
use tracing::info;

fn owned_path<S: AsRef<str>>(path: &[S]) -> Vec<String> {
    path.iter().map(|s| s.as_ref().to_owned()).collect()
}

/// Equality under which two values share an index key: numbers compare by
/// their rendering (`1.0` matches `1`), everything else by JSON equality.
fn same_key(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(_), Value::Number(_)) => canonical_text(stored) == canonical_text(wanted),
        _ => stored == wanted,
    }
}

impl Collection {
    /// Returns the indexed paths in the order they were added.
    #[must_use]
    pub fn indexed_paths(&self) -> Vec<Vec<String>> {
        self.manifest
            .indexes
            .iter()
            .map(|conf| conf.indexed_path.clone())
            .collect()
    }

    /// Returns the definition of the index on exactly `path`.
    #[must_use]
    pub fn index_conf<S: AsRef<str>>(&self, path: &[S]) -> Option<&IndexConf> {
        self.manifest.get(path)
    }

    /// Adds an index on `path` and fills it from every stored document.
    ///
    /// Every open index is closed, the manifest is saved (with a backup of
    /// the previous one) and reloaded, then the whole collection is scanned.
    /// A failure part way leaves the collection as the failing step left it;
    /// nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for an empty path, `DuplicateIndex` if the path
    /// is already indexed, or the error of the failing persistence, reload
    /// or rebuild step.
    pub fn add_index<S: AsRef<str>>(&mut self, path: &[S]) -> CoreResult<()> {
        let path = owned_path(path);
        if path.is_empty() {
            return Err(CoreError::invalid_path("an index path needs at least one field"));
        }
        if self.manifest.position(&path).is_some() {
            return Err(CoreError::DuplicateIndex { path });
        }

        std::mem::take(&mut self.indexes).close_all();

        let file_name = self.dir.new_index_file_name(&path);
        self.manifest.indexes.push(IndexConf {
            file_name,
            bucket_capacity: self.config.bucket_capacity,
            hash_bits: self.config.hash_bits,
            indexed_path: path.clone(),
        });
        self.backup_and_save_config()?;
        self.load_config()?;

        let key = path_key(&path);
        let handle = self
            .indexes
            .get(&key)
            .ok_or_else(|| CoreError::IndexNotFound { path: path.clone() })?;

        let mut documents = 0usize;
        let mut failure = None;
        self.for_all(|id, doc| match handle.insert_document(id, &doc) {
            Ok(()) => {
                documents += 1;
                ControlFlow::Continue(())
            }
            Err(err) => {
                failure = Some(err);
                ControlFlow::Break(())
            }
        })?;
        if let Some(err) = failure {
            return Err(err.into());
        }

        info!(
            dir = %self.dir.path().display(),
            path = %key,
            documents,
            "index added"
        );
        Ok(())
    }

    /// Removes the index on exactly `path` and deletes its file.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the path is not indexed, `IndexFileIo` if
    /// the file cannot be deleted, or the error of the failing persistence
    /// or reload step.
    pub fn remove_index<S: AsRef<str>>(&mut self, path: &[S]) -> CoreResult<()> {
        let Some(position) = self.manifest.position(path) else {
            return Err(CoreError::IndexNotFound {
                path: owned_path(path),
            });
        };

        std::mem::take(&mut self.indexes).close_all();

        let conf = self.manifest.indexes[position].clone();
        if let Err(err) = self.dir.remove_index_file(&conf.file_name) {
            self.load_config()?;
            return Err(err);
        }

        self.manifest.indexes.remove(position);
        self.backup_and_save_config()?;
        self.load_config()?;

        info!(
            dir = %self.dir.path().display(),
            path = %conf.key(),
            file = %conf.file_name,
            "index removed"
        );
        Ok(())
    }

    /// Returns ids of documents holding `value` on the indexed `path`, at
    /// most `limit` of them (0 = no limit).
    ///
    /// Candidates from the index are confirmed against the stored document,
    /// so hash collisions never show up in the result. `null` is never
    /// indexed and always finds nothing.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the path is not indexed, or the hash table's
    /// error.
    pub fn lookup<S: AsRef<str>>(
        &self,
        path: &[S],
        value: &Value,
        limit: usize,
    ) -> CoreResult<Vec<u64>> {
        let handle = self
            .indexes
            .get(&path_key(path))
            .ok_or_else(|| CoreError::IndexNotFound {
                path: owned_path(path),
            })?;
        if value.is_null() {
            return Ok(Vec::new());
        }

        let candidates = handle.table().get(hash_value(value), 0, |_| true)?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for id in candidates {
            if !seen.insert(id) {
                continue;
            }
            let Ok(doc) = self.read(id) else {
                continue;
            };
            if get_in(&doc, path).iter().any(|found| same_key(found, value)) {
                ids.push(id);
                if limit != 0 && ids.len() >= limit {
                    break;
                }
            }
        }
        Ok(ids)
    }
}
