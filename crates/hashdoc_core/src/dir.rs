//! Collection directory management.
//!
//! ```text
//! <collection>/
//! ├─ LOCK          # Advisory lock for single-writer
//! ├─ data          # Document file
//! ├─ config        # Index manifest (JSON)
//! ├─ config.bak    # Previous manifest, written before every change
//! └─ <fileName>    # One hash table file per index
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::index_file_name;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "data";
const CONFIG_FILE: &str = "config";
const CONFIG_BACKUP_FILE: &str = "config.bak";
const CONFIG_TEMP_FILE: &str = "config.tmp";

/// Owns the collection directory and its exclusive lock.
#[derive(Debug)]
pub struct CollectionDir {
    path: PathBuf,
    _lock_file: File,
}

impl CollectionDir {
    /// Opens or creates a collection directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another handle holds the lock (`CollectionLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("collection directory does not exist: {}", path.display()),
                )));
            }
            fs::create_dir_all(path)?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::CollectionLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the collection directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the document file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    /// Returns the path of the index manifest.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    /// Returns the path of the manifest backup.
    #[must_use]
    pub fn config_backup_path(&self) -> PathBuf {
        self.path.join(CONFIG_BACKUP_FILE)
    }

    /// Returns the path of an index file.
    #[must_use]
    pub fn index_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Creates an empty manifest file if there is none yet.
    pub fn ensure_config(&self) -> CoreResult<()> {
        let path = self.config_path();
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map(drop)
            .map_err(|source| CoreError::config_io(path, source))
    }

    /// Reads the raw manifest bytes.
    pub fn read_config(&self) -> CoreResult<Vec<u8>> {
        let path = self.config_path();
        fs::read(&path).map_err(|source| CoreError::config_io(path, source))
    }

    /// Writes `bytes` to the manifest backup.
    pub fn write_config_backup(&self, bytes: &[u8]) -> CoreResult<()> {
        let path = self.config_backup_path();
        fs::write(&path, bytes).map_err(|source| CoreError::config_io(path, source))
    }

    /// Replaces the manifest with `bytes`.
    ///
    /// Writes a temporary file, syncs it and renames it over `config`.
    pub fn write_config(&self, bytes: &[u8]) -> CoreResult<()> {
        let temp_path = self.path.join(CONFIG_TEMP_FILE);
        let write_temp = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()
        };
        write_temp().map_err(|source| CoreError::config_io(&temp_path, source))?;

        let path = self.config_path();
        fs::rename(&temp_path, &path).map_err(|source| CoreError::config_io(&path, source))?;
        self.sync_directory()
            .map_err(|source| CoreError::config_io(&path, source))
    }

    /// Picks a file name for a new index on `path` that no file uses yet.
    #[must_use]
    pub fn new_index_file_name<S: AsRef<str>>(&self, path: &[S]) -> String {
        let mut nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        loop {
            let name = index_file_name(path, nanos);
            if !self.index_path(&name).exists() {
                return name;
            }
            nanos += 1;
        }
    }

    /// Deletes an index file.
    pub fn remove_index_file(&self, file_name: &str) -> CoreResult<()> {
        let path = self.index_path(file_name);
        fs::remove_file(&path).map_err(|source| CoreError::index_file_io(&path, source))?;
        self.sync_directory()
            .map_err(|source| CoreError::index_file_io(&path, source))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> std::io::Result<()> {
        File::open(&self.path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> std::io::Result<()> {
        Ok(())
    }
}
