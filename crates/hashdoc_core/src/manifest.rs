//! Persisted index configuration.
//!
//! Stored as JSON in the collection's `config` file:
//!
//! ```text
//! {"indexes":[{"fileName":"a,b1700000000000000000","bucketCapacity":200,"hashBits":14,"indexedPath":["a","b"]}]}
//! ```

use serde::{Deserialize, Serialize};

/// Delimiter between path segments in an indexed-path key.
pub const PATH_DELIMITER: &str = ",";

/// Longest prefix of the joined path kept in an index file name.
pub const MAX_FILE_NAME_PREFIX: usize = 100;

/// Joins path segments into the key used to look up an index.
pub fn path_key<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|segment| segment.as_ref())
        .collect::<Vec<_>>()
        .join(PATH_DELIMITER)
}

/// Derives an index file name from its path and a nanosecond timestamp.
///
/// The joined path is cut to at most [`MAX_FILE_NAME_PREFIX`] bytes, on a
/// char boundary, and path separators are replaced, so the name always stays
/// inside the collection directory and under the file system's name limit.
pub fn index_file_name<S: AsRef<str>>(path: &[S], nanos: u128) -> String {
    let key = path_key(path);
    let end = key
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= MAX_FILE_NAME_PREFIX)
        .last()
        .unwrap_or(0);
    let prefix: String = key[..end]
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{prefix}{nanos}")
}

/// Description of one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConf {
    /// Hash table file name, relative to the collection directory.
    pub file_name: String,
    /// Entries per hash bucket.
    pub bucket_capacity: u64,
    /// Hash bits selecting the head bucket.
    pub hash_bits: u32,
    /// Field path whose values are indexed.
    pub indexed_path: Vec<String>,
}

impl IndexConf {
    /// Returns the indexed-path key of this index.
    #[must_use]
    pub fn key(&self) -> String {
        path_key(&self.indexed_path)
    }
}

/// The ordered list of index definitions of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Index definitions in the order they were added.
    pub indexes: Vec<IndexConf>,
}

impl Manifest {
    /// Parses a manifest. Empty (or whitespace-only) input is an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed input.
    pub fn decode(data: &[u8]) -> serde_json::Result<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(data)
    }

    /// Serializes the manifest.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if serialization fails.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Returns the position of the index on exactly this path.
    #[must_use]
    pub fn position<S: AsRef<str>>(&self, path: &[S]) -> Option<usize> {
        self.indexes.iter().position(|conf| {
            conf.indexed_path.len() == path.len()
                && conf
                    .indexed_path
                    .iter()
                    .zip(path)
                    .all(|(a, b)| a == b.as_ref())
        })
    }

    /// Returns the index on exactly this path.
    #[must_use]
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&IndexConf> {
        self.position(path).map(|i| &self.indexes[i])
    }
}
