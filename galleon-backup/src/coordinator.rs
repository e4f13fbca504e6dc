//! The backup coordinator

use crate::record::{BackupCopy, BackupFailure, BackupRecord, BackupReport};
use crate::Result;
use chrono::Utc;
use galleon_core::{DerivedKey, WalletStore};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Encryption posture a backup copy must satisfy.
#[derive(Clone)]
pub enum BackupPosture {
    /// Primary is unencrypted; copies are plain.
    Plaintext,
    /// Primary is password-protected; copies are independently encrypted
    /// with the same password-derived key so a backup never leaks key
    /// material the primary protects.
    Encrypted(DerivedKey),
}

impl BackupPosture {
    fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }
}

/// Backup configuration
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Directories to write redundant copies into
    pub backup_dirs: Vec<PathBuf>,
}

impl BackupConfig {
    /// Back up into a single directory.
    pub fn single(dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dirs: vec![dir.into()],
        }
    }
}

/// Writes redundant copies of wallet state after successful durable
/// mutations.
pub struct BackupCoordinator {
    store: Arc<dyn WalletStore>,
    config: BackupConfig,
}

impl BackupCoordinator {
    /// Create a coordinator over the given persistence capability.
    pub fn new(store: Arc<dyn WalletStore>, config: BackupConfig) -> Self {
        Self { store, config }
    }

    /// Run a backup pass for the wallet at `primary`.
    ///
    /// Best-effort: each configured directory is attempted independently and
    /// per-copy failures land in the report. Errors here only mean the
    /// primary itself could not be read; durability of the primary always
    /// takes precedence over backup completeness.
    pub fn backup_after_mutation(
        &self,
        primary: &Path,
        posture: &BackupPosture,
    ) -> Result<BackupReport> {
        let bytes = self.store.load(primary)?;
        let digest = hex::encode(&Sha256::digest(&bytes)[..8]);
        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wallet".to_string());
        let suffix = if posture.is_encrypted() { "bak.enc" } else { "bak" };
        let file_name = format!("{stem}-{digest}.{suffix}");

        let mut copies = Vec::new();
        let mut failures = Vec::new();

        for dir in &self.config.backup_dirs {
            let dest = dir.join(&file_name);
            match self.write_copy(dir, &dest, &bytes, posture) {
                Ok(()) => copies.push(BackupCopy {
                    path: dest,
                    encrypted: posture.is_encrypted(),
                    digest: digest.clone(),
                }),
                Err(e) => {
                    failures.push(BackupFailure {
                        path: dest,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let record = BackupRecord {
            primary: primary.to_path_buf(),
            created_at: Utc::now(),
            copies,
        };

        for dir in &self.config.backup_dirs {
            let manifest = dir.join(format!("{stem}.manifest.json"));
            if let Err(e) = self.write_manifest(&manifest, &record) {
                warn!(path = %manifest.display(), error = %e, "Manifest write failed");
                failures.push(BackupFailure {
                    path: manifest,
                    reason: e.to_string(),
                });
            }
        }

        info!(
            primary = %primary.display(),
            copies = record.copies.len(),
            failures = failures.len(),
            "Backup pass finished"
        );
        Ok(BackupReport { record, failures })
    }

    fn write_copy(
        &self,
        dir: &Path,
        dest: &Path,
        bytes: &[u8],
        posture: &BackupPosture,
    ) -> Result<()> {
        fs::create_dir_all(dir)?;

        // Digest-named: an existing copy already holds this exact content.
        if dest.exists() {
            debug!(path = %dest.display(), "Backup copy already current");
            return Ok(());
        }

        let payload = match posture {
            BackupPosture::Plaintext => bytes.to_vec(),
            BackupPosture::Encrypted(key) => key.encrypt(bytes)?,
        };

        let tmp = dest.with_extension("tmp");
        fs::write(&tmp, &payload)?;
        fs::rename(&tmp, dest)?;
        debug!(path = %dest.display(), "Wrote backup copy");
        Ok(())
    }

    fn write_manifest(&self, path: &Path, record: &BackupRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        fs::write(path, json)?;
        Ok(())
    }
}
