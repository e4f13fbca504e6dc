//! Backup records and reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One redundant copy of the primary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCopy {
    /// Where the copy lives
    pub path: PathBuf,
    /// Whether the copy is independently file-level encrypted
    pub encrypted: bool,
    /// Hex digest of the primary content this copy was made from
    pub digest: String,
}

/// Pairs a primary artifact with its redundant copies and the encryption
/// posture each copy satisfies. Serialized next to the copies as a
/// manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// The primary wallet file
    pub primary: PathBuf,
    /// When this backup pass ran
    pub created_at: DateTime<Utc>,
    /// Copies written or confirmed by this pass
    pub copies: Vec<BackupCopy>,
}

/// A copy that could not be written.
#[derive(Debug, Clone)]
pub struct BackupFailure {
    /// Destination that failed
    pub path: PathBuf,
    /// Why
    pub reason: String,
}

/// Best-effort outcome of one backup pass.
#[derive(Debug)]
pub struct BackupReport {
    /// What was written or confirmed
    pub record: BackupRecord,
    /// Copies that failed; reported, never fatal to the mutation
    pub failures: Vec<BackupFailure>,
}

impl BackupReport {
    /// Whether every configured copy was written or confirmed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
