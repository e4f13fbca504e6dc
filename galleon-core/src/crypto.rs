//! Keyring crypto capability
//!
//! Password-derived keys via Argon2id, file-level authenticated encryption
//! via AES-256-GCM or ChaCha20-Poly1305, and key zeroization.
//!
//! Derivation is intentionally expensive (64 MiB memory, 3 iterations, 4
//! lanes) to resist brute force; callers must keep it off the interactive
//! thread.

use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;
use zeroize::Zeroizing;

/// Salt length in bytes for key derivation.
pub const SALT_LEN: usize = 16;

/// Argon2id parameters: m_cost (KiB), t_cost, p_cost.
const ARGON2_PARAMS: (u32, u32, u32) = (65536, 3, 4);

/// Ciphertext envelope version.
const ENVELOPE_VERSION: u8 = 1;

/// Encryption algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// AES-256-GCM
    AesGcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    fn tag(self) -> u8 {
        match self {
            Self::AesGcm => 0,
            Self::ChaCha20Poly1305 => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::AesGcm),
            1 => Ok(Self::ChaCha20Poly1305),
            other => Err(Error::Encryption(format!(
                "Unknown algorithm tag: {}",
                other
            ))),
        }
    }
}

/// Password-derived key for file-level encryption.
///
/// Key bytes are zeroized on drop.
#[derive(Clone)]
pub struct DerivedKey {
    key: Zeroizing<[u8; 32]>,
    algorithm: EncryptionAlgorithm,
}

impl DerivedKey {
    /// Create from raw key bytes.
    pub fn from_bytes(bytes: &[u8], algorithm: EncryptionAlgorithm) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::Encryption("Invalid key length".to_string()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self {
            key: Zeroizing::new(key),
            algorithm,
        })
    }

    /// Encrypt plaintext.
    ///
    /// Output format: `[version(1)][algorithm(1)][nonce(12)][ciphertext]`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = match self.algorithm {
            EncryptionAlgorithm::AesGcm => {
                let cipher = Aes256Gcm::new(self.key.as_ref().into());
                cipher
                    .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
                    .map_err(|e| Error::Encryption(e.to_string()))?
            }
            EncryptionAlgorithm::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new(self.key.as_ref().into());
                cipher
                    .encrypt(chacha20poly1305::Nonce::from_slice(&nonce_bytes), plaintext)
                    .map_err(|e| Error::Encryption(e.to_string()))?
            }
        };

        let mut result = Vec::with_capacity(2 + 12 + ciphertext.len());
        result.push(ENVELOPE_VERSION);
        result.push(self.algorithm.tag());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt an envelope produced by [`DerivedKey::encrypt`].
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < 14 {
            return Err(Error::Encryption("Invalid ciphertext length".to_string()));
        }

        let version = data[0];
        if version != ENVELOPE_VERSION {
            return Err(Error::Encryption(format!(
                "Unsupported encryption version: {}",
                version
            )));
        }

        let algorithm = EncryptionAlgorithm::from_tag(data[1])?;
        if algorithm != self.algorithm {
            return Err(Error::Encryption(format!(
                "Algorithm mismatch: expected {:?}, got {:?}",
                self.algorithm, algorithm
            )));
        }

        let nonce = &data[2..14];
        let ciphertext = &data[14..];

        match self.algorithm {
            EncryptionAlgorithm::AesGcm => {
                let cipher = Aes256Gcm::new(self.key.as_ref().into());
                cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|e| Error::Encryption(e.to_string()))
            }
            EncryptionAlgorithm::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new(self.key.as_ref().into());
                cipher
                    .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
                    .map_err(|e| Error::Encryption(e.to_string()))
            }
        }
    }
}

/// Keyring crypto capability.
///
/// The coordinator treats this as opaque and potentially slow; the trait
/// seam exists so tests can substitute a cheap derivation.
pub trait KeyringCrypto: Send + Sync {
    /// Derive an encryption key from a password and salt.
    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<DerivedKey>;

    /// Hash a password for storage (PHC string format).
    fn hash_password(&self, password: &str) -> Result<String>;

    /// Verify a password against a stored PHC string.
    fn check_password(&self, password: &str, stored: &str) -> Result<bool>;
}

/// Argon2id-backed implementation of [`KeyringCrypto`].
pub struct ArgonCrypto {
    algorithm: EncryptionAlgorithm,
}

impl ArgonCrypto {
    /// Create with the given file-encryption algorithm.
    pub fn new(algorithm: EncryptionAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Generate a random derivation salt.
    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    fn argon2() -> Result<Argon2<'static>> {
        let params = ParamsBuilder::new()
            .m_cost(ARGON2_PARAMS.0)
            .t_cost(ARGON2_PARAMS.1)
            .p_cost(ARGON2_PARAMS.2)
            .build()
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for ArgonCrypto {
    fn default() -> Self {
        Self::new(EncryptionAlgorithm::ChaCha20Poly1305)
    }
}

impl KeyringCrypto for ArgonCrypto {
    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<DerivedKey> {
        if salt.len() < 8 {
            return Err(Error::KeyDerivation("Salt too short".to_string()));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        Self::argon2()?
            .hash_password_into(password.as_bytes(), salt, key.as_mut())
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        DerivedKey::from_bytes(key.as_ref(), self.algorithm)
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::KeyDerivation(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn check_password(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
