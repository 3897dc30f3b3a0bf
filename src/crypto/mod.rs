//! Cryptography used by the TimeNode session
//!
//! - **encryption**: secrets at rest (keystore, attached DAY account)
//! - **signature**: DAY ownership proofs signed by an external wallet tool
//! - **keystore**: Web3 Secret Storage password checks

pub mod encryption;
pub mod keystore;
pub mod signature;

pub use encryption::EncryptionBox;
pub use keystore::{KeystoreError, V3Keystore};
pub use signature::{OwnershipProof, SignatureError, SignatureVerifier};

use sha3::{Digest, Keccak256};

/// Errors from the at-rest encryption layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed")]
    Decrypt,

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Key file error: {0}")]
    KeyFile(String),
}

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Normalize an Ethereum address to lowercase `0x`-prefixed form
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", bare.to_ascii_lowercase())
}
