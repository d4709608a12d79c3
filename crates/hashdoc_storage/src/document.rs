//! Document file: the byte-blob store behind a collection.
//!
//! ## Format
//!
//! The file is a sequence of records, each addressed by the offset of its
//! header. That offset is the document id.
//!
//! ```text
//! Record {
//!     status: u8      // 1 = live, 0 = deleted
//!     room: u32       // payload bytes reserved for this record (LE)
//!     len: u32        // payload bytes in use (LE)
//!     payload: [u8; room]
//! }
//! ```
//!
//! Inserts reserve twice the payload length so that documents can grow in
//! place. An update that no longer fits tombstones the record and appends a
//! new one, which changes the id.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Size of a record header in bytes.
pub const RECORD_HEADER_SIZE: u64 = 9;

/// Largest payload accepted for a single document.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

const STATUS_DELETED: u8 = 0;
const STATUS_LIVE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordHeader {
    status: u8,
    room: u32,
    len: u32,
}

impl RecordHeader {
    fn encode(&self) -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut buf = [0u8; RECORD_HEADER_SIZE as usize];
        buf[0] = self.status;
        buf[1..5].copy_from_slice(&self.room.to_le_bytes());
        buf[5..9].copy_from_slice(&self.len.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut room = [0u8; 4];
        let mut len = [0u8; 4];
        room.copy_from_slice(&bytes[1..5]);
        len.copy_from_slice(&bytes[5..9]);
        Self {
            status: bytes[0],
            room: u32::from_le_bytes(room),
            len: u32::from_le_bytes(len),
        }
    }

    fn is_well_formed(&self) -> bool {
        (self.status == STATUS_LIVE || self.status == STATUS_DELETED) && self.len <= self.room
    }

    fn record_size(&self) -> u64 {
        RECORD_HEADER_SIZE + u64::from(self.room)
    }
}

/// Append-mostly store of opaque document payloads keyed by a relocatable id.
///
/// All methods take `&self`; the backend sits behind a mutex so a document
/// file can be shared between threads.
///
/// # Example
///
/// ```rust
/// use hashdoc_storage::{DocumentFile, InMemoryBackend};
///
/// let docs = DocumentFile::new(InMemoryBackend::new());
/// let id = docs.insert(b"{\"a\":1}").unwrap();
/// assert_eq!(docs.read(id).unwrap().as_deref(), Some(&b"{\"a\":1}"[..]));
/// ```
#[derive(Debug)]
pub struct DocumentFile<B: StorageBackend = FileBackend> {
    backend: Mutex<B>,
}

impl DocumentFile<FileBackend> {
    /// Opens or creates a document file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::new(FileBackend::open(path)?))
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.backend.lock().path().to_path_buf()
    }
}

impl<B: StorageBackend> DocumentFile<B> {
    /// Wraps a backend. Existing records in it are kept.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Stores a new payload and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DocumentTooLarge`] for oversized payloads, or
    /// the backend's I/O error.
    pub fn insert(&self, data: &[u8]) -> StorageResult<u64> {
        check_document_size(data)?;
        let mut backend = self.backend.lock();
        append_record(&mut *backend, data)
    }

    /// Reads the payload stored under `id`.
    ///
    /// Returns `None` when `id` does not address a live record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub fn read(&self, id: u64) -> StorageResult<Option<Vec<u8>>> {
        let backend = self.backend.lock();
        let Some(header) = live_header(&*backend, id)? else {
            return Ok(None);
        };
        let payload = backend.read_at(id + RECORD_HEADER_SIZE, header.len as usize)?;
        Ok(Some(payload))
    }

    /// Replaces the payload under `id` and returns the id it now lives at.
    ///
    /// The id is unchanged when the new payload fits the record's reserved
    /// room. Otherwise the old record is deleted and the payload is appended
    /// under a fresh id; the old id is invalid from then on.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RecordNotFound`] if `id` is not live,
    /// [`StorageError::DocumentTooLarge`] for oversized payloads, or an I/O error.
    pub fn update(&self, id: u64, data: &[u8]) -> StorageResult<u64> {
        check_document_size(data)?;
        let mut backend = self.backend.lock();
        let Some(header) = live_header(&*backend, id)? else {
            return Err(StorageError::RecordNotFound { id });
        };

        if data.len() <= header.room as usize {
            let header = RecordHeader {
                len: data.len() as u32,
                ..header
            };
            backend.write_at(id, &header.encode())?;
            backend.write_at(id + RECORD_HEADER_SIZE, data)?;
            return Ok(id);
        }

        backend.write_at(id, &[STATUS_DELETED])?;
        append_record(&mut *backend, data)
    }

    /// Deletes the record under `id`. Returns whether a live record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn delete(&self, id: u64) -> StorageResult<bool> {
        let mut backend = self.backend.lock();
        if live_header(&*backend, id)?.is_none() {
            return Ok(false);
        }
        backend.write_at(id, &[STATUS_DELETED])?;
        Ok(true)
    }

    /// Visits every live record in file order.
    ///
    /// The lock is released while the visitor runs, so the visitor may call
    /// back into this file. Records appended during the scan are not visited.
    /// Scanning stops early when the visitor breaks, or with a warning at the
    /// first malformed record header.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend read fails.
    pub fn for_each<F>(&self, mut visitor: F) -> StorageResult<()>
    where
        F: FnMut(u64, &[u8]) -> ControlFlow<()>,
    {
        let end = self.backend.lock().size()?;
        let mut id = 0u64;

        while id + RECORD_HEADER_SIZE <= end {
            let record = {
                let backend = self.backend.lock();
                let header =
                    RecordHeader::decode(&backend.read_at(id, RECORD_HEADER_SIZE as usize)?);
                if !header.is_well_formed() || id + header.record_size() > end {
                    warn!(id, "malformed document record header, stopping scan");
                    return Ok(());
                }
                let payload = if header.status == STATUS_LIVE {
                    Some(backend.read_at(id + RECORD_HEADER_SIZE, header.len as usize)?)
                } else {
                    None
                };
                (header.record_size(), payload)
            };

            let (record_size, payload) = record;
            if let Some(payload) = payload {
                if visitor(id, &payload).is_break() {
                    return Ok(());
                }
            }
            id += record_size;
        }

        Ok(())
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

    /// Flushes, syncs and releases the file.
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

/// Checks that `data` fits in one record.
///
/// # Errors
///
/// Returns [`StorageError::DocumentTooLarge`] past [`MAX_DOCUMENT_SIZE`].
pub fn check_document_size(data: &[u8]) -> StorageResult<()> {
    if data.len() > MAX_DOCUMENT_SIZE {
        return Err(StorageError::DocumentTooLarge {
            len: data.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }
    Ok(())
}

fn live_header<B: StorageBackend + ?Sized>(
    backend: &B,
    id: u64,
) -> StorageResult<Option<RecordHeader>> {
    let size = backend.size()?;
    if id.saturating_add(RECORD_HEADER_SIZE) > size {
        return Ok(None);
    }
    let header = RecordHeader::decode(&backend.read_at(id, RECORD_HEADER_SIZE as usize)?);
    if header.status != STATUS_LIVE
        || !header.is_well_formed()
        || id + header.record_size() > size
    {
        return Ok(None);
    }
    Ok(Some(header))
}

fn append_record<B: StorageBackend + ?Sized>(backend: &mut B, data: &[u8]) -> StorageResult<u64> {
    let room = data.len() * 2;
    let header = RecordHeader {
        status: STATUS_LIVE,
        room: room as u32,
        len: data.len() as u32,
    };

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE as usize + room);
    record.extend_from_slice(&header.encode());
    record.extend_from_slice(data);
    record.resize(RECORD_HEADER_SIZE as usize + room, 0);

    backend.append(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use tempfile::tempdir;

    fn docs() -> DocumentFile<InMemoryBackend> {
        DocumentFile::new(InMemoryBackend::new())
    }

    fn collect(docs: &DocumentFile<InMemoryBackend>) -> Vec<(u64, Vec<u8>)> {
        let mut seen = Vec::new();
        docs.for_each(|id, data| {
            seen.push((id, data.to_vec()));
            ControlFlow::Continue(())
        })
        .unwrap();
        seen
    }

    #[test]
    fn insert_and_read() {
        let docs = docs();
        let a = docs.insert(b"alpha").unwrap();
        let b = docs.insert(b"beta").unwrap();

        assert_eq!(a, 0);
        assert_eq!(b, RECORD_HEADER_SIZE + 10);
        assert_eq!(docs.read(a).unwrap().unwrap(), b"alpha");
        assert_eq!(docs.read(b).unwrap().unwrap(), b"beta");
    }

    #[test]
    fn read_unknown_id_is_none() {
        let docs = docs();
        docs.insert(b"alpha").unwrap();

        assert!(docs.read(1).unwrap().is_none());
        assert!(docs.read(10_000).unwrap().is_none());
        assert!(docs.read(u64::MAX).unwrap().is_none());
    }

    #[test]
    fn update_in_place_keeps_id() {
        let docs = docs();
        let id = docs.insert(b"abcd").unwrap();

        assert_eq!(docs.update(id, b"abcdefgh").unwrap(), id);
        assert_eq!(docs.read(id).unwrap().unwrap(), b"abcdefgh");

        assert_eq!(docs.update(id, b"x").unwrap(), id);
        assert_eq!(docs.read(id).unwrap().unwrap(), b"x");
    }

    #[test]
    fn update_that_outgrows_room_relocates() {
        let docs = docs();
        let id = docs.insert(b"ab").unwrap();
        let next = docs.insert(b"cd").unwrap();

        let moved = docs.update(id, b"much longer payload").unwrap();
        assert_ne!(moved, id);
        assert!(docs.read(id).unwrap().is_none());
        assert_eq!(docs.read(moved).unwrap().unwrap(), b"much longer payload");
        assert_eq!(docs.read(next).unwrap().unwrap(), b"cd");
    }

    #[test]
    fn update_missing_record_fails() {
        let docs = docs();
        assert!(matches!(
            docs.update(42, b"x"),
            Err(StorageError::RecordNotFound { id: 42 })
        ));
    }

    #[test]
    fn delete_is_reported_once() {
        let docs = docs();
        let id = docs.insert(b"gone").unwrap();

        assert!(docs.delete(id).unwrap());
        assert!(!docs.delete(id).unwrap());
        assert!(docs.read(id).unwrap().is_none());
    }

    #[test]
    fn for_each_skips_deleted_records() {
        let docs = docs();
        let a = docs.insert(b"a").unwrap();
        let b = docs.insert(b"b").unwrap();
        let c = docs.insert(b"c").unwrap();
        docs.delete(b).unwrap();

        assert_eq!(collect(&docs), vec![(a, b"a".to_vec()), (c, b"c".to_vec())]);
    }

    #[test]
    fn for_each_stops_on_break() {
        let docs = docs();
        for payload in [&b"1"[..], b"2", b"3"] {
            docs.insert(payload).unwrap();
        }

        let mut visited = 0;
        docs.for_each(|_, _| {
            visited += 1;
            if visited == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(visited, 2);
    }

    #[test]
    fn for_each_stops_at_garbage() {
        let mut bytes = Vec::new();
        let good = RecordHeader {
            status: STATUS_LIVE,
            room: 2,
            len: 1,
        };
        bytes.extend_from_slice(&good.encode());
        bytes.extend_from_slice(b"x\0");
        bytes.extend_from_slice(&[7u8; 12]);

        let docs = DocumentFile::new(InMemoryBackend::with_data(bytes));
        assert_eq!(collect(&docs), vec![(0, b"x".to_vec())]);
    }

    #[test]
    fn oversized_document_rejected() {
        let docs = docs();
        let big = vec![0u8; MAX_DOCUMENT_SIZE + 1];
        assert!(matches!(
            docs.insert(&big),
            Err(StorageError::DocumentTooLarge { .. })
        ));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");

        let id = {
            let docs = DocumentFile::open(&path).unwrap();
            let id = docs.insert(b"kept").unwrap();
            docs.close().unwrap();
            id
        };

        let docs = DocumentFile::open(&path).unwrap();
        assert_eq!(docs.path(), path);
        assert_eq!(docs.read(id).unwrap().unwrap(), b"kept");
    }
}
