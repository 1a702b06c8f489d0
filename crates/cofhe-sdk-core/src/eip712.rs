//! EIP-712 typed-data encoding, hashing and signer recovery.
//!
//! Supports the closed set of field types used by permit signatures:
//! `address`, `bool`, `uintN`, `bytesN`, `bytes`, `string`, and
//! one-dimensional arrays of those. Struct-valued fields are not supported.
//!
//! The message is held as JSON so the same object can be handed to an
//! external wallet and hashed locally for recovery.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};
use crate::types::{decode_hex, parse_address};

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// The EIP-712 domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// `hashStruct(EIP712Domain)`.
    pub fn separator(&self) -> B256 {
        let mut enc = Vec::with_capacity(32 * 5);
        enc.extend_from_slice(keccak256(DOMAIN_TYPE.as_bytes()).as_slice());
        enc.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        enc.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        enc.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        enc.extend_from_slice(&address_word(&self.verifying_contract));
        keccak256(enc)
    }
}

/// One `{name, type}` member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedField {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// A complete typed-data payload: domain, types, primary type and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub message: Map<String, JsonValue>,
}

impl TypedData {
    /// The canonical type string, e.g. `Mail(address from,string contents)`.
    pub fn encode_type(&self) -> Result<String> {
        let fields = self.primary_fields()?;
        let members: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", f.ty, f.name))
            .collect();
        Ok(format!("{}({})", self.primary_type, members.join(",")))
    }

    pub fn type_hash(&self) -> Result<B256> {
        Ok(keccak256(self.encode_type()?.as_bytes()))
    }

    /// `hashStruct(message)`.
    pub fn struct_hash(&self) -> Result<B256> {
        let fields = self.primary_fields()?;
        let mut enc = Vec::with_capacity(32 * (fields.len() + 1));
        enc.extend_from_slice(self.type_hash()?.as_slice());

        for field in fields {
            let value = self.message.get(&field.name).ok_or_else(|| {
                CoreError::TypedData(format!("message is missing field `{}`", field.name))
            })?;
            let word = encode_field(&field.ty, value)
                .map_err(|e| CoreError::TypedData(format!("field `{}`: {}", field.name, e)))?;
            enc.extend_from_slice(&word);
        }

        Ok(keccak256(enc))
    }

    /// The digest a wallet signs: `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`.
    pub fn signing_hash(&self) -> Result<B256> {
        let mut buf = Vec::with_capacity(66);
        buf.extend_from_slice(&[0x19, 0x01]);
        buf.extend_from_slice(self.domain.separator().as_slice());
        buf.extend_from_slice(self.struct_hash()?.as_slice());
        Ok(keccak256(buf))
    }

    /// Recover the address that produced `signature` over this payload.
    pub fn recover_signer(&self, signature: &str) -> Result<Address> {
        recover_address(&self.signing_hash()?, signature)
    }

    fn primary_fields(&self) -> Result<&[TypedField]> {
        self.types
            .get(&self.primary_type)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                CoreError::TypedData(format!("primary type `{}` not in types", self.primary_type))
            })
    }
}

/// Encode one field value to its 32-byte `encodeData` word.
fn encode_field(ty: &str, value: &JsonValue) -> Result<[u8; 32]> {
    if let Some(inner) = ty.strip_suffix("[]") {
        let items = value
            .as_array()
            .ok_or_else(|| CoreError::TypedData(format!("expected array for {}", ty)))?;
        let mut enc = Vec::with_capacity(32 * items.len());
        for item in items {
            enc.extend_from_slice(&encode_field(inner, item)?);
        }
        return Ok(keccak256(enc).0);
    }

    match ty {
        "address" => {
            let s = expect_str(value, ty)?;
            Ok(address_word(&parse_address(s)?))
        }
        "bool" => match value {
            JsonValue::Bool(b) => Ok(U256::from(*b as u8).to_be_bytes::<32>()),
            _ => Err(CoreError::TypedData("expected bool".into())),
        },
        "string" => Ok(keccak256(expect_str(value, ty)?.as_bytes()).0),
        "bytes" => {
            let bytes = decode_hex(expect_str(value, ty)?)?;
            Ok(keccak256(bytes).0)
        }
        _ if ty.starts_with("uint") => {
            let bits: usize = ty[4..]
                .parse()
                .map_err(|_| CoreError::TypedData(format!("unknown type {}", ty)))?;
            let n = json_uint(value)?;
            if bits < 256 && n.bit_len() > bits {
                return Err(CoreError::TypedData(format!("value overflows {}", ty)));
            }
            Ok(n.to_be_bytes::<32>())
        }
        _ if ty.starts_with("bytes") => {
            let size: usize = ty[5..]
                .parse()
                .map_err(|_| CoreError::TypedData(format!("unknown type {}", ty)))?;
            let bytes = decode_hex(expect_str(value, ty)?)?;
            if size == 0 || size > 32 || bytes.len() != size {
                return Err(CoreError::TypedData(format!(
                    "expected {} bytes for {}, got {}",
                    size,
                    ty,
                    bytes.len()
                )));
            }
            let mut word = [0u8; 32];
            word[..size].copy_from_slice(&bytes);
            Ok(word)
        }
        _ => Err(CoreError::TypedData(format!("unsupported type {}", ty))),
    }
}

fn expect_str<'a>(value: &'a JsonValue, ty: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| CoreError::TypedData(format!("expected string for {}", ty)))
}

/// Accepts JSON numbers and decimal or `0x` hex strings.
fn json_uint(value: &JsonValue) -> Result<U256> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| CoreError::TypedData(format!("not an unsigned integer: {}", n))),
        JsonValue::String(s) => crate::sealing::parse_uint(s)
            .map_err(|_| CoreError::TypedData(format!("not an unsigned integer: {}", s))),
        _ => Err(CoreError::TypedData("expected integer".into())),
    }
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// Split a 65-byte `r‖s‖v` hex signature, normalizing to low-S.
pub fn parse_signature(signature: &str) -> Result<(Signature, RecoveryId)> {
    let bytes = decode_hex(signature)
        .map_err(|_| CoreError::InvalidSignature("signature is not hex".into()))?;
    if bytes.len() != 65 {
        return Err(CoreError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        0 | 1 => bytes[64],
        27 | 28 => bytes[64] - 27,
        other => {
            return Err(CoreError::InvalidSignature(format!(
                "invalid recovery byte {}",
                other
            )))
        }
    };

    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;

    let (sig, v) = match sig.normalize_s() {
        Some(low) => (low, v ^ 1),
        None => (sig, v),
    };
    let recid = RecoveryId::from_byte(v)
        .ok_or_else(|| CoreError::InvalidSignature("invalid recovery id".into()))?;

    Ok((sig, recid))
}

/// Recover the signing address from a prehashed digest.
pub fn recover_address(digest: &B256, signature: &str) -> Result<Address> {
    let (sig, recid) = parse_signature(signature)?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)
        .map_err(|e| CoreError::InvalidSignature(format!("recovery failed: {}", e)))?;
    Ok(address_from_verifying_key(&key))
}

/// The Ethereum address of a secp256k1 public key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use serde_json::json;

    fn mail() -> TypedData {
        // The canonical example from the EIP-712 reference, flattened to
        // atomic members.
        let mut types = BTreeMap::new();
        types.insert(
            "Note".to_string(),
            vec![
                TypedField::new("owner", "address"),
                TypedField::new("amount", "uint64"),
                TypedField::new("tags", "string[]"),
                TypedField::new("key", "bytes32"),
                TypedField::new("blob", "bytes"),
            ],
        );
        let message = json!({
            "owner": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826",
            "amount": 7,
            "tags": ["a", "b"],
            "key": format!("0x{}", "11".repeat(32)),
            "blob": "0x",
        });
        TypedData {
            domain: Eip712Domain {
                name: "Test".into(),
                version: "1".into(),
                chain_id: 1,
                verifying_contract: Address::ZERO,
            },
            types,
            primary_type: "Note".into(),
            message: message.as_object().unwrap().clone(),
        }
    }

    fn sign(key: &SigningKey, digest: &B256) -> String {
        let (sig, recid) = key.sign_prehash_recoverable(digest.as_slice()).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recid.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn test_encode_type() {
        assert_eq!(
            mail().encode_type().unwrap(),
            "Note(address owner,uint64 amount,string[] tags,bytes32 key,bytes blob)"
        );
    }

    #[test]
    fn test_domain_separator_known_vector() {
        // Domain from the EIP-712 specification example.
        let domain = Eip712Domain {
            name: "Ether Mail".into(),
            version: "1".into(),
            chain_id: 1,
            verifying_contract: "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC".parse().unwrap(),
        };
        assert_eq!(
            hex::encode(domain.separator()),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
    }

    #[test]
    fn test_signing_hash_deterministic() {
        let td = mail();
        assert_eq!(td.signing_hash().unwrap(), td.signing_hash().unwrap());

        let mut other = mail();
        other.domain.chain_id = 2;
        assert_ne!(td.signing_hash().unwrap(), other.signing_hash().unwrap());
    }

    #[test]
    fn test_sign_and_recover() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let expected = address_from_verifying_key(key.verifying_key());

        let td = mail();
        let signature = sign(&key, &td.signing_hash().unwrap());
        assert_eq!(td.recover_signer(&signature).unwrap(), expected);
    }

    #[test]
    fn test_recover_with_zero_one_v() {
        let key = SigningKey::from_slice(&[0x07; 32]).unwrap();
        let expected = address_from_verifying_key(key.verifying_key());
        let digest = mail().signing_hash().unwrap();

        let (sig, recid) = key.sign_prehash_recoverable(digest.as_slice()).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recid.to_byte());
        let signature = hex::encode(bytes);

        assert_eq!(recover_address(&digest, &signature).unwrap(), expected);
    }

    #[test]
    fn test_tampered_message_recovers_other_address() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let expected = address_from_verifying_key(key.verifying_key());

        let td = mail();
        let signature = sign(&key, &td.signing_hash().unwrap());

        let mut tampered = mail();
        tampered.message.insert("amount".into(), json!(8));
        match tampered.recover_signer(&signature) {
            Ok(addr) => assert_ne!(addr, expected),
            Err(e) => assert!(matches!(e, CoreError::InvalidSignature(_))),
        }
    }

    #[test]
    fn test_missing_field_is_error() {
        let mut td = mail();
        td.message.remove("tags");
        assert!(matches!(td.struct_hash(), Err(CoreError::TypedData(_))));
    }

    #[test]
    fn test_uint_overflow_rejected() {
        let mut td = mail();
        td.message.insert("amount".into(), json!("18446744073709551616"));
        assert!(matches!(td.struct_hash(), Err(CoreError::TypedData(_))));
    }

    #[test]
    fn test_bad_signatures_rejected() {
        let digest = mail().signing_hash().unwrap();
        assert!(recover_address(&digest, "0x1234").is_err());
        let mut bad_v = vec![1u8; 65];
        bad_v[64] = 5;
        assert!(recover_address(&digest, &hex::encode(bad_v)).is_err());
    }
}
