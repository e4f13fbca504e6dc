//! Error types for coordination

use crate::handle::WalletId;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Coordination errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wallet file was changed by an external process; mutation refused
    /// before the gate was even contended.
    #[error("Wallet changed on disk by another process: {0}")]
    StaleWallet(WalletId),

    /// Another mutation holds the gate; the label tells the user what is
    /// running.
    #[error("Wallet is busy: {label}")]
    WalletBusy {
        /// Label of the in-flight operation
        label: String,
    },

    /// The mutating operation itself raised a domain error.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Save or backup I/O failure.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] galleon_core::Error),

    /// Unexpected/unclassified fault inside a worker.
    #[error("Worker fault: {0}")]
    Fault(String),

    /// Scan engine error.
    #[error("Scan error: {0}")]
    Scan(String),

    /// Wallet is not registered with the coordinator.
    #[error("Wallet not open: {0}")]
    NotOpen(WalletId),
}
