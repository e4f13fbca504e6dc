//! On-disk wallet fingerprints
//!
//! A fingerprint is a cheap external-change detector: file size plus
//! modification time, captured at load/save. It is advisory by design; a
//! content hash would be stronger but costs a full read on every check.

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::SystemTime;

/// Size + modification-time pair for a persisted wallet file.
///
/// Two fingerprints comparing unequal means some other process touched the
/// file since we last loaded or saved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File length in bytes
    pub len: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl Fingerprint {
    /// Capture a fingerprint from filesystem metadata.
    pub fn from_metadata(meta: &Metadata) -> crate::Result<Self> {
        Ok(Self {
            len: meta.len(),
            modified: meta.modified()?,
        })
    }
}
