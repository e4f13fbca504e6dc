//! Capability layer for the Galleon wallet coordinator
//!
//! Provides the narrow interfaces the coordinator consumes: password-derived
//! keyring crypto, opaque wallet persistence with fingerprint metadata, and
//! the fingerprint type itself.
//!
//! The on-disk wallet format and the key-material layout are deliberately
//! opaque here; this crate only promises "bytes in, bytes out" plus enough
//! file metadata to detect external changes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod store;

pub use crypto::{ArgonCrypto, DerivedKey, EncryptionAlgorithm, KeyringCrypto, SALT_LEN};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use store::{FileStore, WalletStore};
