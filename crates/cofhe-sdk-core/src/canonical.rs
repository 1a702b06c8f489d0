//! Canonical CBOR encoding for permit identity.
//!
//! A permit's identity hash covers only its base fields (issuer, expiration,
//! contracts, projects, recipient, validatorId, validatorContract). Names,
//! kinds, sealing keys and signatures never enter the hash, so re-keying or
//! re-signing a permit keeps its identity.
//!
//! Encoding follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! **This encoding is frozen.** Changing it changes every stored permit key.

use alloy_primitives::{Address, U256};
use ciborium::value::Value;

use crate::error::{CoreError, Result};
use crate::types::PermitHash;

/// Domain separation prefix for permit identity hashing.
pub const ID_DOMAIN: &[u8] = b"cofhe/permit-id/v1";

/// Integer map keys (0-23 encode as a single byte).
mod keys {
    pub const ISSUER: u64 = 0;
    pub const EXPIRATION: u64 = 1;
    pub const CONTRACTS: u64 = 2;
    pub const PROJECTS: u64 = 3;
    pub const RECIPIENT: u64 = 4;
    pub const VALIDATOR_ID: u64 = 5;
    pub const VALIDATOR_CONTRACT: u64 = 6;
}

/// The base fields that define a permit's identity.
#[derive(Debug, Clone, Copy)]
pub struct PermitIdentity<'a> {
    pub issuer: &'a Address,
    pub expiration: u64,
    pub contracts: &'a [Address],
    pub projects: &'a [String],
    pub recipient: &'a Address,
    pub validator_id: &'a U256,
    pub validator_contract: &'a Address,
}

impl PermitIdentity<'_> {
    /// Canonical CBOR bytes of the identity fields.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let value = self.to_cbor_value();
        let mut buf = Vec::new();
        // Only integers, bytes, text and arrays are built here.
        if encode_value_to(&mut buf, &value).is_err() {
            buf.clear();
        }
        buf
    }

    /// Blake3 over the domain prefix and canonical bytes.
    pub fn hash(&self) -> PermitHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ID_DOMAIN);
        hasher.update(&self.canonical_bytes());
        PermitHash(*hasher.finalize().as_bytes())
    }

    fn to_cbor_value(&self) -> Value {
        let address = |a: &Address| Value::Bytes(a.as_slice().to_vec());

        let entries = vec![
            (Value::Integer(keys::ISSUER.into()), address(self.issuer)),
            (
                Value::Integer(keys::EXPIRATION.into()),
                Value::Integer(self.expiration.into()),
            ),
            (
                Value::Integer(keys::CONTRACTS.into()),
                Value::Array(self.contracts.iter().map(address).collect()),
            ),
            (
                Value::Integer(keys::PROJECTS.into()),
                Value::Array(self.projects.iter().map(|p| Value::Text(p.clone())).collect()),
            ),
            (Value::Integer(keys::RECIPIENT.into()), address(self.recipient)),
            (
                Value::Integer(keys::VALIDATOR_ID.into()),
                Value::Bytes(self.validator_id.to_be_bytes::<32>().to_vec()),
            ),
            (
                Value::Integer(keys::VALIDATOR_CONTRACT.into()),
                address(self.validator_contract),
            ),
        ];

        Value::Map(entries)
    }
}

/// Encode a CBOR value canonically.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::Encoding(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => return Err(CoreError::Encoding("unsupported CBOR value type".into())),
    }
    Ok(())
}

/// Major types 0 and 1.
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<()> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Keys are sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_parts() -> (Address, Vec<Address>, Vec<String>, Address, U256, Address) {
        (
            Address::repeat_byte(0x11),
            vec![Address::repeat_byte(0x22)],
            vec!["proj".to_string()],
            Address::ZERO,
            U256::ZERO,
            Address::ZERO,
        )
    }

    #[test]
    fn test_identity_hash_deterministic() {
        let (issuer, contracts, projects, recipient, vid, vc) = identity_parts();
        let id = PermitIdentity {
            issuer: &issuer,
            expiration: 1_700_000_000,
            contracts: &contracts,
            projects: &projects,
            recipient: &recipient,
            validator_id: &vid,
            validator_contract: &vc,
        };
        assert_eq!(id.canonical_bytes(), id.canonical_bytes());
        assert_eq!(id.hash(), id.hash());
    }

    #[test]
    fn test_identity_hash_sensitive_to_fields() {
        let (issuer, contracts, projects, recipient, vid, vc) = identity_parts();
        let base = PermitIdentity {
            issuer: &issuer,
            expiration: 1_700_000_000,
            contracts: &contracts,
            projects: &projects,
            recipient: &recipient,
            validator_id: &vid,
            validator_contract: &vc,
        };
        let later = PermitIdentity {
            expiration: 1_700_000_001,
            ..base
        };
        let no_projects = PermitIdentity {
            projects: &[],
            ..base
        };
        assert_ne!(base.hash(), later.hash());
        assert_ne!(base.hash(), no_projects.hash());
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 1_700_000_000);
        assert_eq!(buf[0], 0x1a);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_map_key_ordering() {
        let entries = vec![
            (Value::Integer(6.into()), Value::Integer(60.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(4.into()), Value::Integer(4.into())),
        ];
        let buf = encode_canonical(&Value::Map(entries)).unwrap();

        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00); // key 0
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x04); // key 4
        assert_eq!(buf[4], 0x04);
        assert_eq!(buf[5], 0x06); // key 6
        assert_eq!(buf[6], 0x18);
        assert_eq!(buf[7], 60);
    }

    #[test]
    fn test_floats_rejected() {
        assert!(encode_canonical(&Value::Float(1.5)).is_err());
    }
}
