//! Symmetric encryption of session secrets before they are persisted.
//!
//! # Format
//!
//! `base64(nonce || ciphertext || tag)` using ChaCha20-Poly1305 with a fresh
//! 12-byte nonce per message.
//!
//! # Key sources
//!
//! - a per-install random key file (`load_or_create`)
//! - an Argon2id key derived from an operator passphrase (`from_passphrase`)
//! - raw key bytes (`new`)

use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use super::CryptoError;

/// Key length in bytes
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 12;

/// Argon2id memory cost in KiB (19 MiB)
const ARGON2_MEMORY_KB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// Encrypts and decrypts short secrets for the key-value store
#[derive(Clone)]
pub struct EncryptionBox {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for EncryptionBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionBox { .. }")
    }
}

impl EncryptionBox {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Derive the key from a passphrase with Argon2id.
    pub fn from_passphrase(passphrase: &[u8], salt: &[u8]) -> Result<Self, CryptoError> {
        let params = Params::new(
            ARGON2_MEMORY_KB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase, salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self::new(key))
    }

    /// Load the install key from `path`, generating it on first use.
    pub fn load_or_create(path: &Path) -> Result<Self, CryptoError> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path)
                .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", path.display())))?;
            let bytes = hex::decode(encoded.trim())
                .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", path.display())))?;
            let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
                CryptoError::KeyFile(format!("{}: expected {KEY_LEN} bytes", path.display()))
            })?;
            return Ok(Self::new(key));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", parent.display())))?;
        }

        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        std::fs::write(path, hex::encode(key))
            .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", path.display())))?;
        }

        info!(path = %path.display(), "Generated new storage key");
        Ok(Self::new(key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(framed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let framed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        if framed.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed(format!(
                "ciphertext too short: {} bytes",
                framed.len()
            )));
        }

        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
    }
}
