//! Whole-collection scans, flush and close.

use super::Collection;
use crate::error::CoreResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ops::ControlFlow;
use tracing::{debug, error, warn};

impl Collection {
    /// Calls `visitor` with every document that parses, in storage order.
    ///
    /// Documents that do not parse are logged and skipped. The visitor stops
    /// the scan by returning [`ControlFlow::Break`].
    ///
    /// # Errors
    ///
    /// Returns the document file's read error.
    pub fn for_all<F>(&self, mut visitor: F) -> CoreResult<()>
    where
        F: FnMut(u64, Value) -> ControlFlow<()>,
    {
        self.data.for_each(|id, bytes| match serde_json::from_slice(bytes) {
            Ok(doc) => visitor(id, doc),
            Err(err) => {
                warn!(
                    id,
                    dir = %self.dir.path().display(),
                    error = %err,
                    "cannot parse document, skipping"
                );
                ControlFlow::Continue(())
            }
        })?;
        Ok(())
    }

    /// Decodes every document into the same `target` and calls `visitor`
    /// after each successful decode.
    ///
    /// Documents that do not fit `T` are skipped. The visitor stops the scan
    /// by returning [`ControlFlow::Break`].
    ///
    /// # Errors
    ///
    /// Returns the document file's read error.
    pub fn deserialize_all<T, F>(&self, target: &mut T, mut visitor: F) -> CoreResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(u64, &T) -> ControlFlow<()>,
    {
        self.data.for_each(|id, bytes| {
            let mut de = serde_json::Deserializer::from_slice(bytes);
            match T::deserialize_in_place(&mut de, target).and_then(|()| de.end()) {
                Ok(()) => visitor(id, target),
                Err(err) => {
                    debug!(id, error = %err, "document does not fit target, skipping");
                    ControlFlow::Continue(())
                }
            }
        })?;
        Ok(())
    }

    /// Flushes the document file, then every index.
    ///
    /// With [`crate::Config::sync_on_flush`] every file is also fsynced.
    ///
    /// # Errors
    ///
    /// Returns the first failure; files after it are left unflushed.
    pub fn flush(&self) -> CoreResult<()> {
        let sync = self.config.sync_on_flush;
        let result = self
            .data
            .flush()
            .and_then(|()| if sync { self.data.sync() } else { Ok(()) });
        if let Err(err) = result {
            error!(path = %self.dir.data_path().display(), error = %err, "failed to flush documents");
            return Err(err.into());
        }
        self.indexes.flush(sync)?;
        Ok(())
    }

    /// Closes the document file and every index.
    ///
    /// Every file gets a close attempt; failures are logged.
    pub fn close(self) {
        let Self {
            dir, data, indexes, ..
        } = self;

        if let Err(err) = data.close() {
            error!(path = %dir.data_path().display(), error = %err, "failed to close documents");
        }
        indexes.close_all();
        debug!(dir = %dir.path().display(), "collection closed");
    }
}
