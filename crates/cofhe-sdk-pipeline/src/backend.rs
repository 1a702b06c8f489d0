//! External collaborators: the FHE engine and the verification backend.
//!
//! Neither is implemented here. The pipeline only needs an engine that can
//! build a proven ciphertext list and a backend that verifies it and hands
//! back one handle per input, in input order.

use async_trait::async_trait;
use cofhe_sdk_core::U256;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::VerifiedHandle;

/// An opaque, deserialized FHE public key.
#[derive(Clone, PartialEq, Eq)]
pub struct FhePublicKey(Vec<u8>);

impl FhePublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for FhePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FhePublicKey({} bytes)", self.0.len())
    }
}

/// An opaque ciphertext list with its proof of knowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenCiphertextList(Vec<u8>);

impl ProvenCiphertextList {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Accumulates typed plaintexts for one proven ciphertext list.
pub trait CiphertextListBuilder: Send {
    fn push_bool(&mut self, value: bool);
    fn push_u8(&mut self, value: u8);
    fn push_u16(&mut self, value: u16);
    fn push_u32(&mut self, value: u32);
    fn push_u64(&mut self, value: u64);
    fn push_u128(&mut self, value: u128);
    fn push_u256(&mut self, value: U256);

    /// Number of values pushed so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encrypt the pushed values and prove knowledge of them, binding
    /// `metadata` into the proof.
    fn build_with_proof(self: Box<Self>, metadata: &[u8]) -> Result<ProvenCiphertextList>;
}

/// The homomorphic-encryption engine.
pub trait FheEngine: Send + Sync {
    /// Deserialize a network public key as served by the backend.
    fn deserialize_public_key(&self, bytes: &[u8]) -> Result<FhePublicKey>;

    /// Start a ciphertext list encrypted under `key`.
    fn builder(&self, key: &FhePublicKey) -> Box<dyn CiphertextListBuilder>;
}

/// Body of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Hex of the proven ciphertext list.
    pub packed_list: String,
    /// Lowercase `0x` hex account the proof is bound to.
    pub account: String,
    pub security_zone: u8,
}

/// The proof verification service.
#[async_trait]
pub trait VerifierBackend: Send + Sync {
    /// Verify a proven list. Returns one handle per packed value, in order.
    async fn verify(&self, request: &VerifyRequest) -> Result<Vec<VerifiedHandle>>;

    /// The serialized network FHE public key for `security_zone`.
    async fn network_public_key(&self, security_zone: u8) -> Result<Vec<u8>>;
}
