//! Web3 Secret Storage (v3) keystores
//!
//! Only the parts the supervisor needs: reading the account address and
//! checking a password against the keystore MAC. Decrypting the private key
//! is left to the worker.

use pbkdf2::pbkdf2_hmac;
use serde::Deserialize;
use sha2::Sha256;

use super::keccak256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeystoreError {
    #[error("Key derivation failed - possibly wrong passphrase")]
    WrongPassphrase,

    #[error("Invalid keystore: {0}")]
    Invalid(String),

    #[error("Unsupported key derivation function: {0}")]
    UnsupportedKdf(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct V3Keystore {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoSection {
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KdfParams {
    pub dklen: usize,
    pub salt: String,
    // scrypt
    pub n: Option<u64>,
    pub r: Option<u32>,
    pub p: Option<u32>,
    // pbkdf2
    pub c: Option<u32>,
    pub prf: Option<String>,
}

impl V3Keystore {
    pub fn parse(json: &str) -> Result<Self, KeystoreError> {
        serde_json::from_str(json).map_err(|e| KeystoreError::Invalid(e.to_string()))
    }

    /// Account address, always `0x`-prefixed.
    pub fn address(&self) -> Option<String> {
        self.address.as_deref().filter(|a| !a.is_empty()).map(|a| {
            if a.starts_with("0x") {
                a.to_string()
            } else {
                format!("0x{a}")
            }
        })
    }

    /// Check `password` against the keystore MAC.
    pub fn verify_password(&self, password: &str) -> Result<(), KeystoreError> {
        let derived = self.derive_key(password)?;
        if derived.len() < 32 {
            return Err(KeystoreError::Invalid(format!("dklen {} too short", derived.len())));
        }

        let ciphertext = decode_hex(&self.crypto.ciphertext)?;
        let expected = decode_hex(&self.crypto.mac)?;

        let mut mac_input = derived[16..32].to_vec();
        mac_input.extend_from_slice(&ciphertext);

        if keccak256(&mac_input).as_slice() == expected.as_slice() {
            Ok(())
        } else {
            Err(KeystoreError::WrongPassphrase)
        }
    }

    fn derive_key(&self, password: &str) -> Result<Vec<u8>, KeystoreError> {
        let params = &self.crypto.kdfparams;
        let salt = decode_hex(&params.salt)?;
        let mut derived = vec![0u8; params.dklen];

        match self.crypto.kdf.as_str() {
            "scrypt" => {
                let n = params.n.ok_or_else(|| missing("n"))?;
                if !n.is_power_of_two() || n < 2 {
                    return Err(KeystoreError::Invalid(format!("scrypt n={n} is not a power of two")));
                }
                let log_n = n.trailing_zeros() as u8;
                let r = params.r.ok_or_else(|| missing("r"))?;
                let p = params.p.ok_or_else(|| missing("p"))?;

                let scrypt_params = scrypt::Params::new(log_n, r, p, params.dklen)
                    .map_err(|e| KeystoreError::Invalid(e.to_string()))?;
                scrypt::scrypt(password.as_bytes(), &salt, &scrypt_params, &mut derived)
                    .map_err(|e| KeystoreError::Invalid(e.to_string()))?;
            }
            "pbkdf2" => {
                let rounds = params.c.ok_or_else(|| missing("c"))?;
                match params.prf.as_deref() {
                    Some("hmac-sha256") | None => {}
                    Some(other) => return Err(KeystoreError::UnsupportedKdf(format!("pbkdf2/{other}"))),
                }
                pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut derived);
            }
            other => return Err(KeystoreError::UnsupportedKdf(other.to_string())),
        }

        Ok(derived)
    }
}

fn missing(field: &str) -> KeystoreError {
    KeystoreError::Invalid(format!("missing kdf parameter `{field}`"))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, KeystoreError> {
    let bare = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(bare).map_err(|e| KeystoreError::Invalid(e.to_string()))
}

#[cfg(test)]
pub(crate) fn fixture_keystore(address: &str, password: &str) -> String {
    let salt = [3u8; 16];
    let ciphertext = [9u8; 32];
    let rounds = 2;
    let mut derived = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut derived);

    let mut mac_input = derived[16..32].to_vec();
    mac_input.extend_from_slice(&ciphertext);
    let mac = keccak256(&mac_input);

    serde_json::json!({
        "version": 3,
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "address": address.trim_start_matches("0x"),
        "crypto": {
            "ciphertext": hex::encode(ciphertext),
            "cipherparams": { "iv": "6087dab2f9fdbbfaddc31a909735c1e6" },
            "cipher": "aes-128-ctr",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": rounds,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": hex::encode(salt)
            },
            "mac": hex::encode(mac)
        }
    })
    .to_string()
}
