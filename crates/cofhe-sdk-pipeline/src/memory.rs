//! Deterministic in-process collaborators for tests and demos.
//!
//! [`MemoryFheEngine`] does no encryption: its "proven list" is a JSON record
//! of the pushed values. [`MemoryVerifier`] reads that record back and issues
//! one handle per entry, derived with Blake3 so the same input always yields
//! the same handle.

use std::collections::HashMap;

use async_trait::async_trait;
use cofhe_sdk_core::{FheType, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::{
    CiphertextListBuilder, FheEngine, FhePublicKey, ProvenCiphertextList, VerifierBackend,
    VerifyRequest,
};
use crate::error::{PipelineError, Result};
use crate::value::VerifiedHandle;

/// One pushed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedEntry {
    pub utype: FheType,
    pub value: U256,
}

impl PackedEntry {
    pub fn new(utype: FheType, value: U256) -> Self {
        Self { utype, value }
    }
}

/// The memory engine's proven-list encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedList {
    pub key: Vec<u8>,
    pub metadata: Vec<u8>,
    pub entries: Vec<PackedEntry>,
}

impl PackedList {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::Backend(format!("malformed packed list: {}", e)))
    }
}

/// FHE engine that records pushes instead of encrypting them.
#[derive(Debug, Default, Clone)]
pub struct MemoryFheEngine;

impl MemoryFheEngine {
    pub fn new() -> Self {
        Self
    }
}

impl FheEngine for MemoryFheEngine {
    fn deserialize_public_key(&self, bytes: &[u8]) -> Result<FhePublicKey> {
        if bytes.is_empty() {
            return Err(PipelineError::Engine("empty public key".into()));
        }
        Ok(FhePublicKey::from_bytes(bytes.to_vec()))
    }

    fn builder(&self, key: &FhePublicKey) -> Box<dyn CiphertextListBuilder> {
        Box::new(MemoryListBuilder {
            key: key.as_bytes().to_vec(),
            entries: Vec::new(),
        })
    }
}

struct MemoryListBuilder {
    key: Vec<u8>,
    entries: Vec<PackedEntry>,
}

impl MemoryListBuilder {
    fn push(&mut self, utype: FheType, value: U256) {
        self.entries.push(PackedEntry::new(utype, value));
    }
}

impl CiphertextListBuilder for MemoryListBuilder {
    fn push_bool(&mut self, value: bool) {
        self.push(FheType::Bool, U256::from(value as u8));
    }

    fn push_u8(&mut self, value: u8) {
        self.push(FheType::Uint8, U256::from(value));
    }

    fn push_u16(&mut self, value: u16) {
        self.push(FheType::Uint16, U256::from(value));
    }

    fn push_u32(&mut self, value: u32) {
        self.push(FheType::Uint32, U256::from(value));
    }

    fn push_u64(&mut self, value: u64) {
        self.push(FheType::Uint64, U256::from(value));
    }

    fn push_u128(&mut self, value: u128) {
        self.push(FheType::Uint128, U256::from(value));
    }

    fn push_u256(&mut self, value: U256) {
        self.push(FheType::Uint256, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn build_with_proof(self: Box<Self>, metadata: &[u8]) -> Result<ProvenCiphertextList> {
        let list = PackedList {
            key: self.key,
            metadata: metadata.to_vec(),
            entries: self.entries,
        };
        let bytes = serde_json::to_vec(&list).map_err(|e| PipelineError::Engine(e.to_string()))?;
        Ok(ProvenCiphertextList::from_bytes(bytes))
    }
}

/// Misbehavior a [`MemoryVerifier`] can be told to exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierFault {
    /// Return one handle fewer than requested.
    DropLast,
    /// Return one handle more than requested.
    Extra,
    /// Reject every proof.
    Reject,
}

/// Verification backend holding one network key per security zone.
pub struct MemoryVerifier {
    keys: HashMap<u8, Vec<u8>>,
    fault: Option<VerifierFault>,
    requests: Mutex<Vec<VerifyRequest>>,
}

impl MemoryVerifier {
    /// A verifier serving a key for zone 0.
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            fault: None,
            requests: Mutex::new(Vec::new()),
        }
        .with_zone_key(0, b"cofhe-memory-network-key-0".to_vec())
    }

    pub fn with_zone_key(mut self, zone: u8, key: Vec<u8>) -> Self {
        self.keys.insert(zone, key);
        self
    }

    pub fn with_fault(mut self, fault: VerifierFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<VerifyRequest> {
        self.requests.lock().await.clone()
    }

    fn handle(list: &PackedList, index: usize, entry: &PackedEntry, zone: u8) -> VerifiedHandle {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&list.metadata);
        hasher.update(&(index as u64).to_be_bytes());
        hasher.update(&[entry.utype.to_u8(), zone]);
        hasher.update(&entry.value.to_be_bytes::<32>());
        let digest = hasher.finalize();

        VerifiedHandle {
            hash: U256::from_be_bytes(*digest.as_bytes()),
            security_zone: zone,
            utype: entry.utype,
            signature: format!("0x{}", hex::encode(blake3::hash(digest.as_bytes()).as_bytes())),
        }
    }
}

impl Default for MemoryVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerifierBackend for MemoryVerifier {
    async fn verify(&self, request: &VerifyRequest) -> Result<Vec<VerifiedHandle>> {
        self.requests.lock().await.push(request.clone());

        if self.fault == Some(VerifierFault::Reject) {
            return Err(PipelineError::Backend("proof rejected".into()));
        }

        let bytes = hex::decode(&request.packed_list)
            .map_err(|e| PipelineError::Backend(format!("packed list is not hex: {}", e)))?;
        let list = PackedList::decode(&bytes)?;

        let key = self.keys.get(&request.security_zone).ok_or_else(|| {
            PipelineError::Backend(format!("unknown security zone {}", request.security_zone))
        })?;
        if &list.key != key {
            return Err(PipelineError::Backend("list encrypted under a foreign key".into()));
        }

        let metadata: serde_json::Value = serde_json::from_slice(&list.metadata)
            .map_err(|e| PipelineError::Backend(format!("malformed proof metadata: {}", e)))?;
        if metadata["address"] != request.account.as_str()
            || metadata["securityZone"] != request.security_zone
        {
            return Err(PipelineError::Backend(
                "proof is not bound to the requesting account and zone".into(),
            ));
        }

        let mut handles: Vec<VerifiedHandle> = list
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| Self::handle(&list, i, entry, request.security_zone))
            .collect();

        match self.fault {
            Some(VerifierFault::DropLast) => {
                handles.pop();
            }
            Some(VerifierFault::Extra) => {
                let extra = PackedEntry::new(FheType::Bool, U256::ZERO);
                handles.push(Self::handle(&list, handles.len(), &extra, request.security_zone));
            }
            _ => {}
        }
        Ok(handles)
    }

    async fn network_public_key(&self, security_zone: u8) -> Result<Vec<u8>> {
        self.keys
            .get(&security_zone)
            .cloned()
            .ok_or_else(|| PipelineError::Backend(format!("no network key for zone {}", security_zone)))
    }
}
