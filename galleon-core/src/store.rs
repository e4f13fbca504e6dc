//! Wallet persistence capability
//!
//! The coordinator never interprets wallet state; it moves opaque bytes and
//! tracks the on-disk fingerprint. The serialization format belongs to the
//! wallet layer above.

use crate::{Error, Fingerprint, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Opaque wallet persistence.
pub trait WalletStore: Send + Sync {
    /// Load the serialized wallet state.
    fn load(&self, path: &Path) -> Result<Vec<u8>>;

    /// Durably save serialized state, returning the resulting fingerprint.
    fn save(&self, state: &[u8], path: &Path) -> Result<Fingerprint>;

    /// Capture the current on-disk fingerprint without reading the file.
    fn fingerprint(&self, path: &Path) -> Result<Fingerprint>;
}

/// Filesystem-backed [`WalletStore`].
///
/// Saves go through a sibling temp file followed by a rename so a crash
/// mid-write never leaves a torn primary.
pub struct FileStore;

impl FileStore {
    /// Create a new file store.
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletStore for FileStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn save(&self, state: &[u8], path: &Path) -> Result<Fingerprint> {
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(state)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), len = state.len(), "Saved wallet state");
        self.fingerprint(path)
    }

    fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let meta = fs::metadata(path)
            .map_err(|_| Error::NotFound(path.display().to_string()))?;
        Fingerprint::from_metadata(&meta)
    }
}
