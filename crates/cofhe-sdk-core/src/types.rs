//! Strong type definitions shared across the SDK.
//!
//! FHE type tags, the permit identity hash, and helpers for the hex and
//! address forms that cross the wire.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// FHE value type tags.
///
/// The numbering matches the FHE engine's wire tags, so a tag read from a
/// sealed output can be matched directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint4 = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    /// 160-bit value, used for addresses.
    Uint160 = 7,
    Uint256 = 8,
}

impl FheType {
    /// Tags that can be encrypted as inputs.
    pub const ENCRYPTABLE: [FheType; 7] = [
        FheType::Bool,
        FheType::Uint8,
        FheType::Uint16,
        FheType::Uint32,
        FheType::Uint64,
        FheType::Uint128,
        FheType::Uint256,
    ];

    /// Tags that can appear on sealed outputs.
    pub const SEALABLE: [FheType; 8] = [
        FheType::Bool,
        FheType::Uint8,
        FheType::Uint16,
        FheType::Uint32,
        FheType::Uint64,
        FheType::Uint128,
        FheType::Uint160,
        FheType::Uint256,
    ];

    /// Convert from the numeric wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FheType::Bool),
            1 => Some(FheType::Uint4),
            2 => Some(FheType::Uint8),
            3 => Some(FheType::Uint16),
            4 => Some(FheType::Uint32),
            5 => Some(FheType::Uint64),
            6 => Some(FheType::Uint128),
            7 => Some(FheType::Uint160),
            8 => Some(FheType::Uint256),
            _ => None,
        }
    }

    /// The numeric wire tag.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Width of the plaintext in bits.
    pub const fn bit_width(self) -> usize {
        match self {
            FheType::Bool => 1,
            FheType::Uint4 => 4,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Uint160 => 160,
            FheType::Uint256 => 256,
        }
    }

    pub fn is_encryptable(self) -> bool {
        Self::ENCRYPTABLE.contains(&self)
    }

    pub fn is_sealable(self) -> bool {
        Self::SEALABLE.contains(&self)
    }
}

impl TryFrom<u8> for FheType {
    type Error = String;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        FheType::from_u8(tag).ok_or_else(|| format!("unknown FHE type tag: {}", tag))
    }
}

impl From<FheType> for u8 {
    fn from(t: FheType) -> u8 {
        t.to_u8()
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FheType::Bool => "bool",
            FheType::Uint4 => "uint4",
            FheType::Uint8 => "uint8",
            FheType::Uint16 => "uint16",
            FheType::Uint32 => "uint32",
            FheType::Uint64 => "uint64",
            FheType::Uint128 => "uint128",
            FheType::Uint160 => "address",
            FheType::Uint256 => "uint256",
        };
        f.write_str(name)
    }
}

/// A 32-byte permit identity, Blake3 over the canonical encoding of the
/// permit's base fields.
///
/// Rendered as `0x`-prefixed lowercase hex; that string form is also the
/// storage key component.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermitHash(pub [u8; 32]);

impl PermitHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = decode_hex(s)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidKeyLength {
                expected: 32,
                got: bytes.len(),
            }
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for PermitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermitHash({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for PermitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PermitHash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for PermitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PermitHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PermitHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Strip an optional `0x` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode hex with or without the `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(strip_0x(s)).map_err(|e| CoreError::Encoding(format!("invalid hex: {}", e)))
}

/// Parse a 20-byte address from hex.
///
/// Checksums are not enforced; mixed-case input is accepted as-is.
pub fn parse_address(s: &str) -> Result<Address> {
    let body = strip_0x(s);
    if body.len() != 40 {
        return Err(CoreError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            body.len()
        )));
    }
    Address::from_str(body).map_err(|e| CoreError::InvalidAddress(format!("{}: {}", s, e)))
}

/// Lowercase `0x` hex form of an address.
pub fn address_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
