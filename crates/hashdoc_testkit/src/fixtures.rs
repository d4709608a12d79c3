//! Test fixtures and collection helpers.

use hashdoc_core::{hash_value, Collection, Config, Value};
use hashdoc_storage::{DocumentFile, HashTable};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Options for test collections: small hash tables so files stay tiny.
pub fn test_config() -> Config {
    Config::default().hash_bits(6).bucket_capacity(8)
}

/// A collection in a temporary directory, removed on drop.
pub struct TestCollection {
    /// The collection, `None` only while it is being reopened.
    collection: Option<Collection>,
    temp_dir: TempDir,
}

impl TestCollection {
    /// Opens a fresh collection with [`test_config`].
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Opens a fresh collection with the given options.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let collection = Collection::open(temp_dir.path().join("col"), config)
            .expect("Failed to open collection");
        Self {
            collection: Some(collection),
            temp_dir,
        }
    }

    /// Returns the collection directory.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("col")
    }

    /// Closes the collection and opens it again from disk.
    pub fn reopen(&mut self) {
        let config = self.config().clone();
        if let Some(collection) = self.collection.take() {
            collection.close();
        }
        self.collection =
            Some(Collection::open(self.path(), config).expect("Failed to reopen collection"));
    }

    /// Closes the collection, runs `f` on the files, then reopens it.
    pub fn while_closed<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&Path) -> R,
    {
        let config = self.config().clone();
        if let Some(collection) = self.collection.take() {
            collection.close();
        }
        let result = f(&self.path());
        self.collection =
            Some(Collection::open(self.path(), config).expect("Failed to reopen collection"));
        result
    }

    /// Takes the collection out, keeping the directory alive.
    pub fn into_parts(mut self) -> (Collection, TempDir) {
        let collection = self.collection.take().expect("collection is open");
        (collection, self.temp_dir)
    }
}

impl Default for TestCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCollection {
    type Target = Collection;

    fn deref(&self) -> &Self::Target {
        self.collection.as_ref().expect("collection is open")
    }
}

impl std::ops::DerefMut for TestCollection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.collection.as_mut().expect("collection is open")
    }
}

/// Runs a test with a temporary collection.
pub fn with_temp_collection<F, R>(f: F) -> R
where
    F: FnOnce(&mut Collection) -> R,
{
    let mut col = TestCollection::new();
    f(&mut col)
}

/// Returns every id stored under `hash(value)` in the index on `path`.
///
/// Reads the hash table file directly without confirming candidates against
/// the stored documents, so stale entries show up here but not in `lookup`.
pub fn raw_index_entries(collection: &Collection, path: &[&str], value: &Value) -> Vec<u64> {
    let conf = collection
        .index_conf(path)
        .expect("path is not indexed")
        .clone();
    let table = HashTable::open(
        &collection.dir().join(&conf.file_name),
        conf.hash_bits,
        conf.bucket_capacity,
    )
    .expect("Failed to open index file");
    table
        .get(hash_value(value), 0, |_| true)
        .expect("Failed to read index")
}

/// Appends raw bytes to a closed collection's document file.
pub fn append_raw_document(dir: &Path, bytes: &[u8]) -> u64 {
    let data = DocumentFile::open(&dir.join("data")).expect("Failed to open data file");
    let id = data.insert(bytes).expect("Failed to append document");
    data.close().expect("Failed to close data file");
    id
}

/// Lists index files (everything that is not a collection bookkeeping file).
pub fn index_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to list collection directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !matches!(name.as_str(), "LOCK" | "data" | "config" | "config.bak"))
        .collect();
    names.sort();
    names
}
