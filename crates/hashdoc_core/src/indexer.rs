//! Fan-out of document mutations to every open index.

use crate::dir::CollectionDir;
use crate::error::CoreResult;
use crate::extract::get_in;
use crate::hash::hash_value;
use crate::manifest::{IndexConf, Manifest};
use hashdoc_storage::{HashTable, StorageResult};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};

/// An open hash table together with the definition it was opened from.
#[derive(Debug)]
pub(crate) struct IndexHandle {
    conf: IndexConf,
    table: HashTable,
}

impl IndexHandle {
    pub(crate) fn conf(&self) -> &IndexConf {
        &self.conf
    }

    pub(crate) fn table(&self) -> &HashTable {
        &self.table
    }

    /// Adds `hash(v) → id` for every non-null value `doc` holds on this path.
    pub(crate) fn insert_document(&self, id: u64, doc: &Value) -> StorageResult<()> {
        for value in get_in(doc, &self.conf.indexed_path) {
            if !value.is_null() {
                self.table.put(hash_value(value), id)?;
            }
        }
        Ok(())
    }

    /// Removes one `hash(v) → id` entry for every non-null value on this path.
    pub(crate) fn remove_document(&self, id: u64, doc: &Value) -> StorageResult<()> {
        for value in get_in(doc, &self.conf.indexed_path) {
            if !value.is_null() {
                self.table
                    .remove_matching(hash_value(value), 1, |stored| stored == id)?;
            }
        }
        Ok(())
    }

    fn close(self) {
        let path = self.table.path();
        if let Err(err) = self.table.close() {
            error!(path = %path.display(), error = %err, "failed to close index");
        }
    }
}

/// The open indexes of a collection, keyed by indexed-path key.
///
/// Replaced wholesale whenever the manifest is reloaded; nothing outside the
/// collection keeps a handle across a reload.
#[derive(Debug, Default)]
pub(crate) struct Indexes {
    handles: HashMap<String, IndexHandle>,
}

impl Indexes {
    /// Opens (or creates) the hash table of every index in `manifest`.
    pub(crate) fn open(dir: &CollectionDir, manifest: &Manifest) -> CoreResult<Self> {
        let mut handles = HashMap::with_capacity(manifest.indexes.len());
        for conf in &manifest.indexes {
            let table = HashTable::open(
                &dir.index_path(&conf.file_name),
                conf.hash_bits,
                conf.bucket_capacity,
            )?;
            handles.insert(
                conf.key(),
                IndexHandle {
                    conf: conf.clone(),
                    table,
                },
            );
        }
        Ok(Self { handles })
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn get(&self, key: &str) -> Option<&IndexHandle> {
        self.handles.get(key)
    }

    /// Indexes `doc` under `id` in every index at once.
    ///
    /// Returns after every index has been updated. A failing index is logged
    /// and does not stop the others.
    pub(crate) fn index_document(&self, id: u64, doc: &Value) {
        self.fan_out(id, doc, IndexHandle::insert_document);
    }

    /// Removes `doc`'s entries for `id` from every index at once.
    pub(crate) fn unindex_document(&self, id: u64, doc: &Value) {
        self.fan_out(id, doc, IndexHandle::remove_document);
    }

    fn fan_out<F>(&self, id: u64, doc: &Value, op: F)
    where
        F: Fn(&IndexHandle, u64, &Value) -> StorageResult<()> + Sync,
    {
        let op = &op;
        rayon::scope(|scope| {
            for handle in self.handles.values() {
                scope.spawn(move |_| {
                    if let Err(err) = op(handle, id, doc) {
                        error!(index = %handle.conf().key(), id, error = %err, "index maintenance failed");
                    }
                });
            }
        });
        debug!(id, indexes = self.handles.len(), "index fan-out complete");
    }

    /// Flushes every index, stopping at the first failure.
    pub(crate) fn flush(&self, sync: bool) -> StorageResult<()> {
        for handle in self.handles.values() {
            let result = handle.table.flush().and_then(|()| {
                if sync {
                    handle.table.sync()
                } else {
                    Ok(())
                }
            });
            if let Err(err) = result {
                error!(path = %handle.table.path().display(), error = %err, "failed to flush index");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Closes every index, logging failures.
    pub(crate) fn close_all(self) {
        for (_, handle) in self.handles {
            handle.close();
        }
    }
}
