//! Error types

/// Backup errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Persistence or crypto capability error
    #[error("Capability error: {0}")]
    Capability(#[from] galleon_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest serialization error
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
