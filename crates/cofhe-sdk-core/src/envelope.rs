//! Sealed-value envelope wire format.
//!
//! A sealed value travels as the hex encoding of a JSON object:
//!
//! ```text
//! {"version":"x25519-xsalsa20-poly1305","nonce":"<b64>","ephemPublicKey":"<b64>","ciphertext":"<b64>"}
//! ```
//!
//! Decoding accepts the JSON text itself, its hex form (with or without
//! `0x`), or the raw JSON bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::{BoxedMessage, X25519PublicKey, KEY_LEN, NONCE_LEN};
use crate::error::{CoreError, Result};
use crate::types::strip_0x;

/// The only envelope version understood.
pub const ENVELOPE_VERSION: &str = "x25519-xsalsa20-poly1305";

/// JSON form of the envelope, exactly as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeJson {
    version: String,
    nonce: String,
    ephem_public_key: String,
    ciphertext: String,
}

/// A decoded cipher envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    pub nonce: [u8; NONCE_LEN],
    pub ephemeral_public: X25519PublicKey,
    pub ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    /// Serialize to the JSON text form.
    pub fn to_json(&self) -> String {
        let json = EnvelopeJson {
            version: ENVELOPE_VERSION.to_string(),
            nonce: STANDARD.encode(self.nonce),
            ephem_public_key: STANDARD.encode(self.ephemeral_public.as_bytes()),
            ciphertext: STANDARD.encode(&self.ciphertext),
        };
        // A struct of plain strings always serializes.
        serde_json::to_string(&json).unwrap_or_default()
    }

    /// Serialize to the transport form: lowercase hex of the JSON bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_json().as_bytes())
    }

    /// Decode from any accepted transport form.
    pub fn decode(input: &[u8]) -> Result<Self> {
        let trimmed = trim_ascii(input);
        if trimmed.first() == Some(&b'{') {
            return Self::from_json_bytes(trimmed);
        }

        let text = std::str::from_utf8(trimmed)
            .map_err(|_| CoreError::MalformedEnvelope("neither JSON nor hex text".into()))?;
        let bytes = hex::decode(strip_0x(text))
            .map_err(|e| CoreError::MalformedEnvelope(format!("invalid hex: {}", e)))?;
        Self::from_json_bytes(&bytes)
    }

    fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let json: EnvelopeJson = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::MalformedEnvelope(format!("invalid JSON: {}", e)))?;

        if json.version != ENVELOPE_VERSION {
            return Err(CoreError::MalformedEnvelope(format!(
                "unsupported version: {}",
                json.version
            )));
        }

        let nonce: [u8; NONCE_LEN] = decode_b64(&json.nonce, "nonce")?
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::MalformedEnvelope("nonce must be 24 bytes".into()))?;

        let ephem = decode_b64(&json.ephem_public_key, "ephemPublicKey")?;
        if ephem.len() != KEY_LEN {
            return Err(CoreError::MalformedEnvelope(
                "ephemPublicKey must be 32 bytes".into(),
            ));
        }
        let ephemeral_public = X25519PublicKey::from_slice(&ephem)?;

        let ciphertext = decode_b64(&json.ciphertext, "ciphertext")?;

        Ok(Self {
            nonce,
            ephemeral_public,
            ciphertext,
        })
    }
}

impl From<BoxedMessage> for CipherEnvelope {
    fn from(msg: BoxedMessage) -> Self {
        Self {
            nonce: msg.nonce,
            ephemeral_public: msg.ephemeral_public,
            ciphertext: msg.ciphertext,
        }
    }
}

fn decode_b64(s: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CoreError::MalformedEnvelope(format!("{} is not base64: {}", field, e)))
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CipherEnvelope {
        CipherEnvelope {
            nonce: [7u8; NONCE_LEN],
            ephemeral_public: X25519PublicKey::from_bytes([9u8; 32]),
            ciphertext: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn test_json_field_names() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json()).unwrap();
        assert_eq!(json["version"], ENVELOPE_VERSION);
        assert!(json.get("ephemPublicKey").is_some());
        assert!(json.get("nonce").is_some());
        assert!(json.get("ciphertext").is_some());
    }

    #[test]
    fn test_decode_accepts_all_forms() {
        let env = sample();
        let json = env.to_json();
        let hex_form = env.to_hex();

        assert_eq!(CipherEnvelope::decode(json.as_bytes()).unwrap(), env);
        assert_eq!(CipherEnvelope::decode(hex_form.as_bytes()).unwrap(), env);
        let prefixed = format!("0x{}", hex_form);
        assert_eq!(CipherEnvelope::decode(prefixed.as_bytes()).unwrap(), env);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for input in [&b"not hex at all"[..], b"0xabc", b"{\"version\":1}", b""] {
            assert!(matches!(
                CipherEnvelope::decode(input),
                Err(CoreError::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let json = sample().to_json().replace(ENVELOPE_VERSION, "x25519-chacha20");
        assert!(matches!(
            CipherEnvelope::decode(json.as_bytes()),
            Err(CoreError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_rejects_short_nonce() {
        let json = format!(
            r#"{{"version":"{}","nonce":"{}","ephemPublicKey":"{}","ciphertext":"AA=="}}"#,
            ENVELOPE_VERSION,
            STANDARD.encode([0u8; 12]),
            STANDARD.encode([0u8; 32]),
        );
        assert!(matches!(
            CipherEnvelope::decode(json.as_bytes()),
            Err(CoreError::MalformedEnvelope(_))
        ));
    }
}
