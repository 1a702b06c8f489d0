//! Error types for the CoFHE SDK core.

use thiserror::Error;

/// Errors raised by the core primitives.
///
/// `MalformedEnvelope` and `DecryptionFailed` are kept apart so callers can
/// tell a garbled transport payload from a payload sealed to another key.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("typed data error: {0}")]
    TypedData(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
