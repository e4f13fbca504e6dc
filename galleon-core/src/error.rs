//! Error types

/// Capability errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Wallet file not found
    #[error("Wallet file not found: {0}")]
    NotFound(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
