//! On-disk bucketed hash table mapping 64-bit keys to 64-bit values.
//!
//! ## Format
//!
//! ```text
//! Bucket {
//!     next: u64                  // index of the overflow bucket, 0 = end of chain (LE)
//!     entries: [Entry; capacity]
//! }
//! Entry {
//!     valid: u8                  // 1 = occupied, 0 = free
//!     key: u64                   // LE
//!     value: u64                 // LE
//! }
//! ```
//!
//! Buckets `0..2^hash_bits` are chain heads. Overflow buckets are appended
//! after the head region, so index 0 never appears as an overflow link.
//! Any bucket region past the end of the file reads as an empty bucket,
//! which keeps a fresh table file small until keys actually land in it.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

const BUCKET_HEADER_SIZE: u64 = 8;
const ENTRY_SIZE: u64 = 17;

/// Largest accepted `hash_bits`.
pub const MAX_HASH_BITS: u32 = 32;

/// Largest accepted entries-per-bucket.
pub const MAX_BUCKET_CAPACITY: u64 = 1 << 16;

/// A disk-backed hash table with chained, fixed-size buckets.
///
/// Keys are not unique: the same key may map to many values, and the same
/// `(key, value)` pair may be stored more than once.
///
/// # Example
///
/// ```rust
/// use hashdoc_storage::{HashTable, InMemoryBackend};
///
/// let table = HashTable::new(InMemoryBackend::new(), 4, 8).unwrap();
/// table.put(97, 1).unwrap();
/// assert_eq!(table.get(97, 0, |_| true).unwrap(), vec![1]);
/// ```
#[derive(Debug)]
pub struct HashTable<B: StorageBackend = FileBackend> {
    backend: Mutex<B>,
    hash_bits: u32,
    bucket_capacity: u64,
    bucket_size: u64,
}

impl HashTable<FileBackend> {
    /// Opens or creates a hash table file.
    ///
    /// The geometry must match the one the file was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the geometry is invalid.
    pub fn open(path: &Path, hash_bits: u32, bucket_capacity: u64) -> StorageResult<Self> {
        Self::new(FileBackend::open(path)?, hash_bits, bucket_capacity)
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.backend.lock().path().to_path_buf()
    }
}

impl<B: StorageBackend> HashTable<B> {
    /// Wraps a backend with the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidGeometry`] if `hash_bits` is outside
    /// `1..=32` or `bucket_capacity` is outside `1..=65536`.
    pub fn new(backend: B, hash_bits: u32, bucket_capacity: u64) -> StorageResult<Self> {
        if hash_bits == 0 || hash_bits > MAX_HASH_BITS {
            return Err(StorageError::InvalidGeometry(format!(
                "hash_bits must be within 1..={MAX_HASH_BITS}, got {hash_bits}"
            )));
        }
        if bucket_capacity == 0 || bucket_capacity > MAX_BUCKET_CAPACITY {
            return Err(StorageError::InvalidGeometry(format!(
                "bucket_capacity must be within 1..={MAX_BUCKET_CAPACITY}, got {bucket_capacity}"
            )));
        }

        Ok(Self {
            backend: Mutex::new(backend),
            hash_bits,
            bucket_capacity,
            bucket_size: BUCKET_HEADER_SIZE + bucket_capacity * ENTRY_SIZE,
        })
    }

    /// Returns the number of hash bits selecting the head bucket.
    #[must_use]
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    /// Returns the number of entries per bucket.
    #[must_use]
    pub fn bucket_capacity(&self) -> u64 {
        self.bucket_capacity
    }

    fn head_buckets(&self) -> u64 {
        1u64 << self.hash_bits
    }

    fn head_bucket(&self, key: u64) -> u64 {
        key & (self.head_buckets() - 1)
    }

    fn entry_offset(&self, bucket: u64, slot: u64) -> u64 {
        bucket * self.bucket_size + BUCKET_HEADER_SIZE + slot * ENTRY_SIZE
    }

    fn read_bucket(&self, backend: &B, bucket: u64) -> StorageResult<Bucket> {
        let offset = bucket * self.bucket_size;
        let size = backend.size()?;
        let mut bytes = vec![0u8; self.bucket_size as usize];
        if offset < size {
            let available = (size - offset).min(self.bucket_size) as usize;
            bytes[..available].copy_from_slice(&backend.read_at(offset, available)?);
        }
        Ok(Bucket { bytes })
    }

    fn next_free_bucket(&self, backend: &B) -> StorageResult<u64> {
        let used = backend.size()?.div_ceil(self.bucket_size);
        Ok(used.max(self.head_buckets()))
    }

    /// Upper bound on overflow links in any chain: every overflow bucket in
    /// the file once, plus one link past the end.
    fn max_hops(&self, backend: &B) -> StorageResult<u64> {
        Ok(self.next_free_bucket(backend)? - self.head_buckets() + 1)
    }

    fn follow(
        &self,
        bucket: &Bucket,
        hops: &mut u64,
        max_hops: u64,
    ) -> StorageResult<Option<u64>> {
        match bucket.next() {
            0 => Ok(None),
            next if next < self.head_buckets() => Err(StorageError::Corrupted(format!(
                "overflow link {next} points into the head region"
            ))),
            _ if *hops >= max_hops => Err(StorageError::Corrupted(format!(
                "overflow chain is longer than the {max_hops} links the file can hold"
            ))),
            next => {
                *hops += 1;
                Ok(Some(next))
            }
        }
    }

    /// Walks the chain for `key`, returning the entry offsets and values of
    /// matching entries, at most `limit` of them (0 = no limit).
    fn find<F>(
        &self,
        backend: &B,
        key: u64,
        limit: usize,
        mut predicate: F,
    ) -> StorageResult<Vec<(u64, u64)>>
    where
        F: FnMut(u64) -> bool,
    {
        let mut found = Vec::new();
        let mut index = self.head_bucket(key);
        let max_hops = self.max_hops(backend)?;
        let mut hops = 0;

        loop {
            let bucket = self.read_bucket(backend, index)?;
            for slot in 0..self.bucket_capacity {
                let Some((entry_key, value)) = bucket.entry(slot) else {
                    continue;
                };
                if entry_key == key && predicate(value) {
                    found.push((self.entry_offset(index, slot), value));
                    if limit != 0 && found.len() >= limit {
                        return Ok(found);
                    }
                }
            }
            match self.follow(&bucket, &mut hops, max_hops)? {
                Some(next) => index = next,
                None => return Ok(found),
            }
        }
    }

    /// Stores `key → value` in the first free slot of the key's chain,
    /// extending the chain with a new bucket when every slot is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is corrupted or the backend fails.
    pub fn put(&self, key: u64, value: u64) -> StorageResult<()> {
        let mut backend = self.backend.lock();
        let mut index = self.head_bucket(key);
        let max_hops = self.max_hops(&backend)?;
        let mut hops = 0;

        loop {
            let bucket = self.read_bucket(&backend, index)?;
            let free = (0..self.bucket_capacity).find(|&slot| bucket.entry(slot).is_none());
            if let Some(slot) = free {
                let mut entry = [0u8; ENTRY_SIZE as usize];
                entry[0] = 1;
                entry[1..9].copy_from_slice(&key.to_le_bytes());
                entry[9..17].copy_from_slice(&value.to_le_bytes());
                return backend.write_at(self.entry_offset(index, slot), &entry);
            }

            index = match self.follow(&bucket, &mut hops, max_hops)? {
                Some(next) => next,
                None => {
                    let next = self.next_free_bucket(&backend)?;
                    backend.write_at(index * self.bucket_size, &next.to_le_bytes())?;
                    next
                }
            };
        }
    }

    /// Returns the values stored under `key` that satisfy `predicate`,
    /// at most `limit` of them (0 = no limit), in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is corrupted or the backend fails.
    pub fn get<F>(&self, key: u64, limit: usize, predicate: F) -> StorageResult<Vec<u64>>
    where
        F: FnMut(u64) -> bool,
    {
        let backend = self.backend.lock();
        let found = self.find(&backend, key, limit, predicate)?;
        Ok(found.into_iter().map(|(_, value)| value).collect())
    }

    /// Frees up to `limit` entries (0 = no limit) stored under `key` whose
    /// value satisfies `predicate`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain is corrupted or the backend fails.
    pub fn remove_matching<F>(&self, key: u64, limit: usize, predicate: F) -> StorageResult<usize>
    where
        F: FnMut(u64) -> bool,
    {
        let mut backend = self.backend.lock();
        let found = self.find(&backend, key, limit, predicate)?;
        for (offset, _) in &found {
            backend.write_at(*offset, &[0])?;
        }
        Ok(found.len())
    }

    /// Pushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns the backend's flush error.
    pub fn flush(&self) -> StorageResult<()> {
        self.backend.lock().flush()
    }

    /// Makes all writes durable.
    ///
    /// # Errors
    ///
    /// Returns the backend's sync error.
    pub fn sync(&self) -> StorageResult<()> {
        self.backend.lock().sync()
    }

    /// Flushes, syncs and releases the table.
    ///
    /// # Errors
    ///
    /// Returns the first flush or sync error; the handle is dropped either way.
    pub fn close(self) -> StorageResult<()> {
        let mut backend = self.backend.into_inner();
        backend.flush()?;
        backend.sync()
    }
}

struct Bucket {
    bytes: Vec<u8>,
}

impl Bucket {
    fn next(&self) -> u64 {
        read_u64(&self.bytes[..8])
    }

    fn entry(&self, slot: u64) -> Option<(u64, u64)> {
        let start = (BUCKET_HEADER_SIZE + slot * ENTRY_SIZE) as usize;
        let entry = &self.bytes[start..start + ENTRY_SIZE as usize];
        if entry[0] == 0 {
            return None;
        }
        Some((read_u64(&entry[1..9]), read_u64(&entry[9..17])))
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use tempfile::tempdir;

    fn table(hash_bits: u32, capacity: u64) -> HashTable<InMemoryBackend> {
        HashTable::new(InMemoryBackend::new(), hash_bits, capacity).unwrap()
    }

    #[test]
    fn put_and_get() {
        let table = table(4, 4);
        table.put(7, 100).unwrap();
        table.put(7, 200).unwrap();
        table.put(8, 300).unwrap();

        assert_eq!(table.get(7, 0, |_| true).unwrap(), vec![100, 200]);
        assert_eq!(table.get(8, 0, |_| true).unwrap(), vec![300]);
        assert!(table.get(9, 0, |_| true).unwrap().is_empty());
    }

    #[test]
    fn get_respects_limit_and_predicate() {
        let table = table(2, 8);
        for value in 1..=5 {
            table.put(3, value).unwrap();
        }

        assert_eq!(table.get(3, 2, |_| true).unwrap(), vec![1, 2]);
        assert_eq!(table.get(3, 0, |v| v % 2 == 0).unwrap(), vec![2, 4]);
    }

    #[test]
    fn keys_sharing_a_head_bucket_stay_apart() {
        let table = table(2, 4);
        // 1 and 5 both land in head bucket 1
        table.put(1, 10).unwrap();
        table.put(5, 50).unwrap();

        assert_eq!(table.get(1, 0, |_| true).unwrap(), vec![10]);
        assert_eq!(table.get(5, 0, |_| true).unwrap(), vec![50]);
    }

    #[test]
    fn full_bucket_chains_into_overflow() {
        let table = table(1, 2);
        for value in 0..7 {
            table.put(0, value).unwrap();
        }

        assert_eq!(table.get(0, 0, |_| true).unwrap(), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn remove_matching_caps_at_limit() {
        let table = table(3, 4);
        table.put(42, 1).unwrap();
        table.put(42, 1).unwrap();
        table.put(42, 2).unwrap();

        assert_eq!(table.remove_matching(42, 1, |v| v == 1).unwrap(), 1);
        assert_eq!(table.get(42, 0, |_| true).unwrap(), vec![1, 2]);

        assert_eq!(table.remove_matching(42, 0, |_| true).unwrap(), 2);
        assert!(table.get(42, 0, |_| true).unwrap().is_empty());
    }

    #[test]
    fn freed_slot_is_reused() {
        let table = table(1, 2);
        table.put(0, 1).unwrap();
        table.put(0, 2).unwrap();
        table.remove_matching(0, 1, |v| v == 1).unwrap();
        table.put(0, 3).unwrap();

        assert_eq!(table.get(0, 0, |_| true).unwrap(), vec![3, 2]);
    }

    #[test]
    fn invalid_geometry_rejected() {
        assert!(matches!(
            HashTable::new(InMemoryBackend::new(), 0, 4),
            Err(StorageError::InvalidGeometry(_))
        ));
        assert!(matches!(
            HashTable::new(InMemoryBackend::new(), 33, 4),
            Err(StorageError::InvalidGeometry(_))
        ));
        assert!(matches!(
            HashTable::new(InMemoryBackend::new(), 4, 0),
            Err(StorageError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn corrupt_overflow_link_detected() {
        let table = table(2, 1);
        table.put(1, 10).unwrap();
        table.put(1, 11).unwrap();
        // point bucket 1's overflow link back at head bucket 3
        {
            let mut backend = table.backend.lock();
            backend.write_at(table.bucket_size, &3u64.to_le_bytes()).unwrap();
        }

        assert!(matches!(
            table.get(1, 0, |_| true),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn overflow_cycle_detected() {
        let table = table(2, 1);
        table.put(1, 10).unwrap();
        table.put(1, 11).unwrap();
        // overflow bucket 4 links to itself
        {
            let mut backend = table.backend.lock();
            backend
                .write_at(4 * table.bucket_size, &4u64.to_le_bytes())
                .unwrap();
        }

        assert!(matches!(
            table.get(1, 0, |_| true),
            Err(StorageError::Corrupted(_))
        ));
        assert!(matches!(
            table.put(1, 12),
            Err(StorageError::Corrupted(_))
        ));
        assert!(matches!(
            table.remove_matching(1, 0, |_| false),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");

        {
            let table = HashTable::open(&path, 8, 16).unwrap();
            for value in 0..40 {
                table.put(value % 3, value).unwrap();
            }
            assert_eq!(table.path(), path);
            table.close().unwrap();
        }

        let table = HashTable::open(&path, 8, 16).unwrap();
        let values = table.get(2, 0, |_| true).unwrap();
        assert_eq!(values, (0..40).filter(|v| v % 3 == 2).collect::<Vec<_>>());
    }

    mod model {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u64, u64),
            Remove(u64, u64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u64..16, 0u64..8).prop_map(|(k, v)| Op::Put(k, v)),
                (0u64..16, 0u64..8).prop_map(|(k, v)| Op::Remove(k, v)),
            ]
        }

        proptest! {
            #[test]
            fn behaves_like_a_multimap(ops in prop::collection::vec(op(), 0..200)) {
                let table = HashTable::new(InMemoryBackend::new(), 2, 3).unwrap();
                let mut model: HashMap<u64, Vec<u64>> = HashMap::new();

                for op in ops {
                    match op {
                        Op::Put(k, v) => {
                            table.put(k, v).unwrap();
                            model.entry(k).or_default().push(v);
                        }
                        Op::Remove(k, v) => {
                            let removed = table.remove_matching(k, 1, |stored| stored == v).unwrap();
                            let values = model.entry(k).or_default();
                            let expected = match values.iter().position(|&x| x == v) {
                                Some(pos) => {
                                    values.remove(pos);
                                    1
                                }
                                None => 0,
                            };
                            prop_assert_eq!(removed, expected);
                        }
                    }
                }

                for key in 0u64..16 {
                    let mut actual = table.get(key, 0, |_| true).unwrap();
                    let mut expected = model.get(&key).cloned().unwrap_or_default();
                    actual.sort_unstable();
                    expected.sort_unstable();
                    prop_assert_eq!(actual, expected);
                }
            }
        }
    }
}
