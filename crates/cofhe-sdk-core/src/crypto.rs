//! X25519 key material and the NaCl box primitive.
//!
//! Sealing keys are X25519 key-agreement keys. Sealed payloads use the
//! `x25519-xsalsa20-poly1305` box with a fresh ephemeral sender key.

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{CoreError, Result};

/// Length of an X25519 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of an XSalsa20 nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidKeyLength {
            expected: KEY_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    fn to_box_key(self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret. Zeroized on drop.
#[derive(Clone)]
pub struct X25519StaticSecret([u8; 32]);

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        Self(secret.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&StaticSecret::from(self.0)))
    }

    fn to_box_key(&self) -> crypto_box::SecretKey {
        crypto_box::SecretKey::from(self.0)
    }
}

impl Drop for X25519StaticSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for X25519StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("X25519StaticSecret(..)")
    }
}

/// Output of a box seal: everything the recipient needs besides its secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxedMessage {
    pub nonce: [u8; NONCE_LEN],
    pub ephemeral_public: X25519PublicKey,
    pub ciphertext: Vec<u8>,
}

/// Seal `plaintext` to `recipient` with a fresh ephemeral key and nonce.
pub fn box_seal(plaintext: &[u8], recipient: &X25519PublicKey) -> Result<BoxedMessage> {
    let ephemeral = X25519StaticSecret::generate();
    let ephemeral_public = ephemeral.public_key();

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let salsa = SalsaBox::new(&recipient.to_box_key(), &ephemeral.to_box_key());
    let ciphertext = salsa
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|e| CoreError::Encoding(format!("box seal failed: {}", e)))?;

    Ok(BoxedMessage {
        nonce,
        ephemeral_public,
        ciphertext,
    })
}

/// Open a box addressed to `recipient`.
///
/// Authentication failure is reported as `DecryptionFailed` with no detail.
pub fn box_open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
    ephemeral_public: &X25519PublicKey,
    recipient: &X25519StaticSecret,
) -> Result<Vec<u8>> {
    let salsa = SalsaBox::new(&ephemeral_public.to_box_key(), &recipient.to_box_key());
    salsa
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CoreError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_derivation_deterministic() {
        let secret = X25519StaticSecret::from_bytes([0x42; 32]);
        assert_eq!(secret.public_key(), secret.public_key());
        assert_ne!(secret.public_key().0, [0x42; 32]);
    }

    #[test]
    fn test_box_roundtrip() {
        let recipient = X25519StaticSecret::generate();
        let boxed = box_seal(b"hello, sealed world", &recipient.public_key()).unwrap();
        assert_eq!(boxed.ciphertext.len(), 19 + TAG_LEN);

        let opened = box_open(
            &boxed.ciphertext,
            &boxed.nonce,
            &boxed.ephemeral_public,
            &recipient,
        )
        .unwrap();
        assert_eq!(opened, b"hello, sealed world");
    }

    #[test]
    fn test_box_wrong_recipient_fails() {
        let recipient = X25519StaticSecret::generate();
        let other = X25519StaticSecret::generate();
        let boxed = box_seal(b"secret", &recipient.public_key()).unwrap();

        let result = box_open(&boxed.ciphertext, &boxed.nonce, &boxed.ephemeral_public, &other);
        assert!(matches!(result, Err(CoreError::DecryptionFailed)));
    }

    #[test]
    fn test_box_empty_plaintext() {
        let recipient = X25519StaticSecret::generate();
        let boxed = box_seal(&[], &recipient.public_key()).unwrap();
        let opened = box_open(
            &boxed.ciphertext,
            &boxed.nonce,
            &boxed.ephemeral_public,
            &recipient,
        )
        .unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn test_public_key_from_slice_length() {
        assert!(X25519PublicKey::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            X25519PublicKey::from_slice(&[0u8; 31]),
            Err(CoreError::InvalidKeyLength { expected: 32, got: 31 })
        ));
    }
}
