//! Redundant wallet backups
//!
//! After every successful durable mutation the coordinator writes redundant
//! copies of the wallet's persisted state into one or more backup
//! directories. A copy never weakens the primary's protection: if the
//! primary is password-protected, every copy is independently file-level
//! encrypted with the same password-derived key.
//!
//! Copies are named by a digest of the primary's content, so repeating a
//! backup of an unchanged wallet is a no-op and back-to-back passes are
//! byte-for-byte idempotent. Backup is best-effort: per-copy failures are
//! collected and reported, never escalated into a mutation failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coordinator;
pub mod error;
pub mod record;

pub use coordinator::{BackupConfig, BackupCoordinator, BackupPosture};
pub use error::{Error, Result};
pub use record::{BackupCopy, BackupFailure, BackupRecord, BackupReport};
