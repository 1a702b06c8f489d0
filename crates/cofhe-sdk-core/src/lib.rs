//! # CoFHE SDK Core
//!
//! Pure primitives for the CoFHE SDK: sealing keys, cipher envelopes,
//! permit identity hashing, and EIP-712 typed-data hashing.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`SealingKeyPair`] - X25519 key pair that sealed outputs are addressed to
//! - [`CipherEnvelope`] - Wire format of a sealed value
//! - [`PermitHash`] - Identity of a permit, Blake3 over its base fields
//! - [`TypedData`] - EIP-712 payload with local hashing and signer recovery
//! - [`FheType`] - FHE value type tags
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe_sdk_core::{SealingKeyPair, U256};
//!
//! let pair = SealingKeyPair::generate();
//! let sealed = SealingKeyPair::seal(U256::from(42u64), pair.public_key().as_bytes()).unwrap();
//! assert_eq!(pair.unseal(&sealed).unwrap(), U256::from(42u64));
//! ```

pub mod canonical;
pub mod crypto;
pub mod eip712;
pub mod envelope;
pub mod error;
pub mod sealing;
pub mod types;

pub use alloy_primitives::{Address, B256, U256};
pub use canonical::PermitIdentity;
pub use crypto::{X25519PublicKey, X25519StaticSecret};
pub use eip712::{Eip712Domain, TypedData, TypedField};
pub use envelope::{CipherEnvelope, ENVELOPE_VERSION};
pub use error::{CoreError, Result};
pub use sealing::{parse_uint, SealingKeyPair, SerializedSealingPair};
pub use types::{address_hex, decode_hex, now_secs, parse_address, FheType, PermitHash};
