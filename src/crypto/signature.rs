//! Verification of DAY ownership proofs
//!
//! An operator proves they control the DAY-holding account by signing the
//! TimeNode's own address with an external wallet tool and pasting the
//! resulting JSON. Two encodings are seen in practice:
//!
//! ```text
//! MyEtherWallet: {"address": "0x..", "msg": "...", "sig": "0x..", "version": "3"}
//! MyCrypto:      {"address": "0x..", "message": "...", "signature": "0x.."}
//! ```
//!
//! A proof is accepted when either scheme recovers the claimed address:
//! the EIP-191 personal-message hash of the message text, or the same hash
//! of the hex-decoded message for tools that sign a `0x`-hex payload.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{keccak256, normalize_address};

/// Prefix applied by `personal_sign`
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of an `r || s || v` signature
const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Malformed signature payload: {0}")]
    MalformedPayload(String),
}

/// A parsed ownership proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipProof {
    /// Account claimed to have produced the signature
    pub address: String,
    /// Signed message text
    #[serde(alias = "msg")]
    pub message: String,
    /// Hex encoded `r || s || v`
    #[serde(alias = "sig")]
    pub signature: String,
}

impl OwnershipProof {
    /// Parse the JSON emitted by a wallet tool.
    pub fn parse(payload: &str) -> Result<Self, SignatureError> {
        serde_json::from_str(payload.trim())
            .map_err(|e| SignatureError::MalformedPayload(e.to_string()))
    }
}

/// The hashing schemes tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// `personal_sign` over the UTF-8 message text
    PersonalMessage,
    /// `personal_sign` over the hex-decoded message
    HexPersonalMessage,
}

/// Validates ownership proofs against the TimeNode address
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Accept the proof if any scheme validates it.
    pub fn verify(proof: &OwnershipProof, timenode_address: &str) -> Result<SignatureScheme, SignatureError> {
        for scheme in [SignatureScheme::PersonalMessage, SignatureScheme::HexPersonalMessage] {
            if Self::verify_with(scheme, proof, timenode_address) {
                debug!(address = %proof.address, ?scheme, "Ownership proof accepted");
                return Ok(scheme);
            }
        }
        Err(SignatureError::InvalidSignature)
    }

    /// Validate a proof under a single scheme.
    pub fn verify_with(scheme: SignatureScheme, proof: &OwnershipProof, timenode_address: &str) -> bool {
        let Some(message) = scheme_message(scheme, &proof.message) else {
            return false;
        };

        if !references_address(&message, timenode_address) {
            return false;
        }

        match recover_address(&message, &proof.signature) {
            Ok(recovered) => recovered == normalize_address(&proof.address),
            Err(_) => false,
        }
    }
}

/// EIP-191 personal message hash
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut data = format!("{PERSONAL_MESSAGE_PREFIX}{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Ethereum address of a secp256k1 public key
pub fn address_of(key: &VerifyingKey) -> String {
    let point = k256::PublicKey::from(key).to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Recover the signer of a personal message.
pub fn recover_address(message: &[u8], signature_hex: &str) -> Result<String, SignatureError> {
    let bytes = decode_hex(signature_hex).ok_or(SignatureError::InvalidSignature)?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(SignatureError::InvalidSignature);
    }

    let v = match bytes[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        _ => return Err(SignatureError::InvalidSignature),
    };

    let mut signature =
        Signature::from_slice(&bytes[..64]).map_err(|_| SignatureError::InvalidSignature)?;
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(SignatureError::InvalidSignature)?;

    // High-S signatures are flipped to their low-S twin with the opposite parity
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let hash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
        .map_err(|_| SignatureError::InvalidSignature)?;

    Ok(address_of(&key))
}

fn scheme_message(scheme: SignatureScheme, message: &str) -> Option<Vec<u8>> {
    match scheme {
        SignatureScheme::PersonalMessage => Some(message.as_bytes().to_vec()),
        SignatureScheme::HexPersonalMessage => {
            let trimmed = message.trim();
            trimmed.strip_prefix("0x")?;
            decode_hex(trimmed)
        }
    }
}

fn references_address(message: &[u8], address: &str) -> bool {
    let bare = normalize_address(address);
    let bare = &bare[2..];
    if bare.is_empty() {
        return false;
    }
    String::from_utf8_lossy(message).to_ascii_lowercase().contains(bare)
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let trimmed = value.trim();
    let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(bare).ok()
}
