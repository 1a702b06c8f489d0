//! Sealing key pairs: the per-permit key that re-encrypted outputs are
//! addressed to.
//!
//! A value is sealed as its big-endian minimal byte string (zero seals the
//! empty string) inside a NaCl box, then wrapped in a [`CipherEnvelope`].

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::crypto::{box_open, box_seal, X25519PublicKey, X25519StaticSecret, KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::envelope::CipherEnvelope;
use crate::error::{CoreError, Result};
use crate::types::decode_hex;

/// An X25519 key pair used to unseal values addressed to a permit.
#[derive(Clone)]
pub struct SealingKeyPair {
    secret: X25519StaticSecret,
    public: X25519PublicKey,
}

/// Hex form of a sealing key pair, as stored inside a serialized permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSealingPair {
    pub private_key: String,
    pub public_key: String,
}

impl SealingKeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let secret = X25519StaticSecret::generate();
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Build from raw key bytes.
    ///
    /// Both keys must be 32 bytes, and the public key must be the one
    /// derived from the private key.
    pub fn new(private_key: &[u8], public_key: &[u8]) -> Result<Self> {
        let secret_bytes: [u8; 32] =
            private_key
                .try_into()
                .map_err(|_| CoreError::InvalidKeyLength {
                    expected: KEY_LEN,
                    got: private_key.len(),
                })?;
        let public = X25519PublicKey::from_slice(public_key)?;
        let secret = X25519StaticSecret::from_bytes(secret_bytes);

        if secret.public_key() != public {
            return Err(CoreError::InvalidPublicKey(
                "public key does not match private key".into(),
            ));
        }

        Ok(Self { secret, public })
    }

    /// Build from a private key alone, deriving the public half.
    pub fn from_private_key(private_key: [u8; 32]) -> Self {
        let secret = X25519StaticSecret::from_bytes(private_key);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Build from hex-encoded keys (with or without `0x`).
    pub fn from_hex(private_key: &str, public_key: &str) -> Result<Self> {
        let private = decode_hex(private_key)?;
        let public = decode_hex(public_key)
            .map_err(|_| CoreError::InvalidPublicKey(format!("not hex: {}", public_key)))?;
        Self::new(&private, &public)
    }

    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public
    }

    /// Public key as lowercase hex, no prefix.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Private key as lowercase hex, no prefix.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret.as_bytes())
    }

    pub fn to_serialized(&self) -> SerializedSealingPair {
        SerializedSealingPair {
            private_key: self.private_key_hex(),
            public_key: self.public_key_hex(),
        }
    }

    pub fn from_serialized(serialized: &SerializedSealingPair) -> Result<Self> {
        Self::from_hex(&serialized.private_key, &serialized.public_key)
    }

    /// Seal `value` to `public_key`, returning the hex transport form.
    pub fn seal(value: U256, public_key: &[u8]) -> Result<String> {
        let recipient = X25519PublicKey::from_slice(public_key).map_err(|_| {
            CoreError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                public_key.len()
            ))
        })?;

        let plaintext = minimal_be_bytes(value);
        let boxed = box_seal(&plaintext, &recipient)?;
        Ok(CipherEnvelope::from(boxed).to_hex())
    }

    /// Seal a decimal (or `0x` hex) integer string.
    ///
    /// Negative or non-integral input is `InvalidValue`.
    pub fn seal_str(value: &str, public_key: &[u8]) -> Result<String> {
        Self::seal(parse_uint(value)?, public_key)
    }

    /// Unseal an envelope addressed to this key pair.
    ///
    /// Exactly one box-open runs on every path, including malformed input,
    /// before the error is chosen.
    pub fn unseal(&self, ciphertext: impl AsRef<[u8]>) -> Result<U256> {
        let parsed = CipherEnvelope::decode(ciphertext.as_ref());

        let dummy_ciphertext = [0u8; TAG_LEN + 32];
        let (ct, nonce, ephem) = match &parsed {
            Ok(env) => (env.ciphertext.as_slice(), env.nonce, env.ephemeral_public),
            Err(_) => (&dummy_ciphertext[..], [0u8; NONCE_LEN], self.public),
        };
        let opened = box_open(ct, &nonce, &ephem, &self.secret);

        match (parsed, opened) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(_)) => Err(CoreError::DecryptionFailed),
            (Ok(_), Ok(bytes)) => {
                if bytes.len() > 32 {
                    return Err(CoreError::InvalidValue(format!(
                        "plaintext of {} bytes exceeds 256 bits",
                        bytes.len()
                    )));
                }
                Ok(U256::from_be_slice(&bytes))
            }
        }
    }
}

impl std::fmt::Debug for SealingKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKeyPair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl PartialEq for SealingKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public && self.secret.as_bytes() == other.secret.as_bytes()
    }
}

impl Eq for SealingKeyPair {}

/// Big-endian bytes with leading zeros stripped; zero is empty.
fn minimal_be_bytes(value: U256) -> Vec<u8> {
    let full = value.to_be_bytes::<32>();
    let first = full.iter().position(|b| *b != 0).unwrap_or(full.len());
    full[first..].to_vec()
}

/// Parse a non-negative integer from decimal or `0x` hex text.
pub fn parse_uint(value: &str) -> Result<U256> {
    let s = value.trim();
    if s.is_empty() {
        return Err(CoreError::InvalidValue("empty integer".into()));
    }
    if s.starts_with('-') {
        return Err(CoreError::InvalidValue(format!("negative value: {}", s)));
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_body) => U256::from_str_radix(hex_body, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| CoreError::InvalidValue(format!("not a non-negative integer: {}", s)))
}
