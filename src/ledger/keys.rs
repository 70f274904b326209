//! Sui account keys.
//!
//! Parses the account's Ed25519 private key, derives the Sui address from
//! it, and signs transaction bytes with the Sui intent scheme:
//!
//! - digest    = Blake2b-256(intent ‖ tx_bytes), intent = `[0, 0, 0]`
//! - signature = flag(0x00) ‖ ed25519(digest) ‖ public key, base64
//! - address   = `0x` ‖ hex(Blake2b-256(flag ‖ public key))
//!
//! Accepted key encodings: `suiprivkey1…` (bech32, flag-prefixed) and
//! base64 of either the raw 32-byte seed or the flag-prefixed 33 bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::types::SweeperError;

type Blake2b256 = Blake2b<U32>;

/// Signature scheme flag for Ed25519.
const ED25519_FLAG: u8 = 0x00;

/// Human-readable part of bech32-encoded Sui private keys.
const PRIVATE_KEY_HRP: &str = "suiprivkey";

/// Intent prefix for transaction data: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// The account's signing key plus its derived address.
pub struct SuiKeypair {
    signing_key: SigningKey,
    address: String,
}

impl SuiKeypair {
    /// Parse a private key in any of the accepted encodings.
    pub fn from_secret(secret: &SecretString) -> Result<Self, SweeperError> {
        let raw = secret.expose_secret().trim();
        if raw.is_empty() {
            return Err(SweeperError::InvalidKey("empty key".into()));
        }

        let bytes = if raw.starts_with(PRIVATE_KEY_HRP) {
            let (hrp, data) = bech32::decode(raw)
                .map_err(|e| SweeperError::InvalidKey(format!("bech32 decode failed: {e}")))?;
            if hrp.as_str() != PRIVATE_KEY_HRP {
                return Err(SweeperError::InvalidKey(format!(
                    "unexpected bech32 prefix {}",
                    hrp.as_str()
                )));
            }
            data
        } else {
            STANDARD
                .decode(raw)
                .map_err(|e| SweeperError::InvalidKey(format!("base64 decode failed: {e}")))?
        };

        Self::from_bytes(&bytes)
    }

    /// Build from decoded key bytes (32-byte seed or flag ‖ seed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SweeperError> {
        let seed: [u8; 32] = match bytes.len() {
            32 => bytes.try_into().map_err(|_| SweeperError::InvalidKey("bad seed".into()))?,
            33 => {
                if bytes[0] != ED25519_FLAG {
                    return Err(SweeperError::InvalidKey(format!(
                        "unsupported signature scheme flag 0x{:02x}, only Ed25519 is supported",
                        bytes[0]
                    )));
                }
                bytes[1..]
                    .try_into()
                    .map_err(|_| SweeperError::InvalidKey("bad seed".into()))?
            }
            n => {
                return Err(SweeperError::InvalidKey(format!(
                    "expected 32 or 33 key bytes, got {n}"
                )))
            }
        };

        let signing_key = SigningKey::from_bytes(&seed);
        let address = derive_address(&signing_key.verifying_key().to_bytes());
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// The account address derived from the public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Raw Ed25519 public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign base64 transaction bytes, returning the base64 serialized signature.
    pub fn sign_transaction(&self, tx_bytes_b64: &str) -> Result<String, SweeperError> {
        let tx_bytes = STANDARD
            .decode(tx_bytes_b64)
            .map_err(|e| SweeperError::InvalidKey(format!("tx bytes are not base64: {e}")))?;

        let digest = intent_digest(&tx_bytes);
        let signature = self.signing_key.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.public_key());
        Ok(STANDARD.encode(serialized))
    }
}

impl fmt::Debug for SuiKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiKeypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Blake2b-256 of the transaction intent followed by the BCS tx bytes.
fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    hasher.finalize().into()
}

/// Sui address for an Ed25519 public key.
fn derive_address(public_key: &[u8; 32]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    format!("0x{}", hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
