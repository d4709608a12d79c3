//! Loading and saving the index manifest.

use super::Collection;
use crate::error::{CoreError, CoreResult};
use crate::indexer::Indexes;
use crate::manifest::Manifest;
use tracing::debug;

impl Collection {
    /// Reloads the manifest from disk and reopens every index it names.
    ///
    /// The previous handles are dropped; callers close them first when they
    /// need close errors reported.
    pub(crate) fn load_config(&mut self) -> CoreResult<()> {
        let bytes = self.dir.read_config()?;
        self.manifest = Manifest::decode(&bytes).map_err(|source| CoreError::ConfigCorrupt {
            path: self.dir.config_path(),
            source,
        })?;
        self.indexes = Indexes::open(&self.dir, &self.manifest)?;

        debug!(
            dir = %self.dir.path().display(),
            indexes = self.manifest.indexes.len(),
            "index manifest loaded"
        );
        Ok(())
    }

    /// Copies the manifest on disk to `config.bak`, then writes the
    /// in-memory manifest over it.
    ///
    /// The backup is written first, so a backup failure leaves `config`
    /// untouched.
    pub(crate) fn backup_and_save_config(&self) -> CoreResult<()> {
        let previous = self.dir.read_config()?;
        self.dir.write_config_backup(&previous)?;
        self.dir.write_config(&self.manifest.encode()?)
    }
}
