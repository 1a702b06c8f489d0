//! The closed value model walked by the pipeline.
//!
//! Request and response payloads arrive as arbitrary JSON. They are mapped
//! once, at the boundary, onto [`Value`]; every walk then matches on a closed
//! set of variants instead of inspecting shapes at runtime.
//!
//! JSON shapes recognized by [`Value::from_json`]:
//!
//! | shape                                                    | variant            |
//! |----------------------------------------------------------|--------------------|
//! | `{data: string\|number\|bool, securityZone: n, utype: t}` with `t` encryptable | `Encryptable` |
//! | `{data: string, utype: t}` with `t` sealable, no `securityZone` | `Sealed`     |
//! | the string `"permission"`                                | `PermissionMarker` |
//! | array                                                    | `Sequence`         |
//! | any other object                                         | `Keyed`            |
//! | null, bool, number, string                               | `Scalar`           |

use cofhe_sdk_core::{address_hex, Address, FheType, U256};
use cofhe_sdk_permits::Permission;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{PipelineError, Result};

/// Reserved leaf replaced by the caller's current permission.
pub const PERMISSION_MARKER: &str = "permission";

/// A leaf that is neither structure nor marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar::Number(n.into())
    }
}

/// Payload of an encryptable item, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemData {
    Bool(bool),
    /// Decimal or `0x` hex integer text.
    Text(String),
}

impl ItemData {
    fn to_json(&self) -> JsonValue {
        match self {
            ItemData::Bool(b) => JsonValue::Bool(*b),
            ItemData::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

/// A request leaf to be encrypted with proof before transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptableItem {
    pub data: ItemData,
    pub security_zone: u8,
    pub utype: FheType,
}

impl EncryptableItem {
    pub fn new(utype: FheType, data: ItemData, security_zone: u8) -> Self {
        Self {
            data,
            security_zone,
            utype,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(FheType::Bool, ItemData::Bool(value), 0)
    }

    /// An integer item of type `utype`, from decimal or hex text.
    pub fn uint(utype: FheType, value: impl Into<String>) -> Self {
        Self::new(utype, ItemData::Text(value.into()), 0)
    }

    pub fn in_zone(mut self, security_zone: u8) -> Self {
        self.security_zone = security_zone;
        self
    }

    fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert("data".into(), self.data.to_json());
        map.insert("securityZone".into(), JsonValue::from(self.security_zone));
        map.insert("utype".into(), JsonValue::from(self.utype.to_u8()));
        JsonValue::Object(map)
    }
}

/// A response leaf holding a sealed scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedItem {
    /// The cipher envelope, in any form `SealingKeyPair::unseal` accepts.
    pub data: String,
    pub utype: FheType,
}

impl SealedItem {
    pub fn new(utype: FheType, data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            utype,
        }
    }

    fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert("data".into(), JsonValue::String(self.data.clone()));
        map.insert("utype".into(), JsonValue::from(self.utype.to_u8()));
        JsonValue::Object(map)
    }
}

/// A backend-issued reference standing in for an encrypted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedHandle {
    #[serde(with = "decimal")]
    pub hash: U256,
    pub security_zone: u8,
    pub utype: FheType,
    pub signature: String,
}

mod decimal {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<U256, D::Error> {
        match JsonValue::deserialize(d)? {
            JsonValue::String(s) => {
                cofhe_sdk_core::parse_uint(&s).map_err(serde::de::Error::custom)
            }
            JsonValue::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| serde::de::Error::custom("expected unsigned integer")),
            other => Err(serde::de::Error::custom(format!(
                "expected integer, got {}",
                other
            ))),
        }
    }
}

/// A recovered plaintext, converted to the sealed item's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plaintext {
    Bool(bool),
    Uint(U256),
    Address(Address),
}

impl Plaintext {
    /// Interpret an unsealed integer as `utype`.
    ///
    /// Booleans are any non-zero value. Addresses take the low 20 bytes.
    pub fn from_uint(utype: FheType, value: U256) -> Self {
        match utype {
            FheType::Bool => Plaintext::Bool(value != U256::ZERO),
            FheType::Uint160 => {
                let bytes = value.to_be_bytes::<32>();
                Plaintext::Address(Address::from_slice(&bytes[12..]))
            }
            _ => Plaintext::Uint(value),
        }
    }

    /// JSON form: bool, decimal string, or lowercase `0x` address.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Plaintext::Bool(b) => JsonValue::Bool(*b),
            Plaintext::Uint(n) => JsonValue::String(n.to_string()),
            Plaintext::Address(a) => JsonValue::String(address_hex(a)),
        }
    }
}

/// A node of a request or response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    /// Entries in insertion order.
    Keyed(Vec<(String, Value)>),
    Encryptable(EncryptableItem),
    Sealed(SealedItem),
    PermissionMarker,
    /// Output of substitution.
    Handle(VerifiedHandle),
    /// Output of permission injection.
    Permission(Box<Permission>),
    /// Output of unsealing.
    Unsealed(Plaintext),
}

impl Value {
    pub fn scalar(s: impl Into<Scalar>) -> Self {
        Value::Scalar(s.into())
    }

    pub fn keyed<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Keyed(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a key of a keyed value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Keyed(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Map JSON onto the value model, rejecting nesting deeper than
    /// `max_depth`.
    pub fn from_json(json: &JsonValue, max_depth: usize) -> Result<Self> {
        from_json_at(json, 0, max_depth)
    }

    /// Render back to JSON.
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(match self {
            Value::Scalar(Scalar::Null) => JsonValue::Null,
            Value::Scalar(Scalar::Bool(b)) => JsonValue::Bool(*b),
            Value::Scalar(Scalar::Number(n)) => JsonValue::Number(n.clone()),
            Value::Scalar(Scalar::String(s)) => JsonValue::String(s.clone()),
            Value::Sequence(items) => JsonValue::Array(
                items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            ),
            Value::Keyed(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json()?);
                }
                JsonValue::Object(map)
            }
            Value::Encryptable(item) => item.to_json(),
            Value::Sealed(item) => item.to_json(),
            Value::PermissionMarker => JsonValue::String(PERMISSION_MARKER.to_string()),
            Value::Handle(handle) => serde_json::to_value(handle)
                .map_err(|e| PipelineError::UnrecognizedShape(e.to_string()))?,
            Value::Permission(permission) => serde_json::to_value(permission.as_ref())
                .map_err(|e| PipelineError::UnrecognizedShape(e.to_string()))?,
            Value::Unsealed(plaintext) => plaintext.to_json(),
        })
    }
}

impl From<EncryptableItem> for Value {
    fn from(item: EncryptableItem) -> Self {
        Value::Encryptable(item)
    }
}

impl From<SealedItem> for Value {
    fn from(item: SealedItem) -> Self {
        Value::Sealed(item)
    }
}

fn from_json_at(json: &JsonValue, depth: usize, max_depth: usize) -> Result<Value> {
    if depth > max_depth {
        return Err(PipelineError::MaxDepthExceeded { limit: max_depth });
    }

    Ok(match json {
        JsonValue::Null => Value::Scalar(Scalar::Null),
        JsonValue::Bool(b) => Value::Scalar(Scalar::Bool(*b)),
        JsonValue::Number(n) => Value::Scalar(Scalar::Number(n.clone())),
        JsonValue::String(s) if s == PERMISSION_MARKER => Value::PermissionMarker,
        JsonValue::String(s) => Value::Scalar(Scalar::String(s.clone())),
        JsonValue::Array(items) => Value::Sequence(
            items
                .iter()
                .map(|item| from_json_at(item, depth + 1, max_depth))
                .collect::<Result<_>>()?,
        ),
        JsonValue::Object(map) => {
            if let Some(item) = encryptable_from_json(map)? {
                Value::Encryptable(item)
            } else if let Some(item) = sealed_from_json(map) {
                Value::Sealed(item)
            } else {
                Value::Keyed(
                    map.iter()
                        .map(|(k, v)| -> Result<(String, Value)> {
                            Ok((k.clone(), from_json_at(v, depth + 1, max_depth)?))
                        })
                        .collect::<Result<_>>()?,
                )
            }
        }
    })
}

fn utype_of(map: &Map<String, JsonValue>) -> Option<FheType> {
    map.get("utype")
        .and_then(JsonValue::as_u64)
        .and_then(|tag| u8::try_from(tag).ok())
        .and_then(FheType::from_u8)
}

fn encryptable_from_json(map: &Map<String, JsonValue>) -> Result<Option<EncryptableItem>> {
    let Some(utype) = utype_of(map).filter(|t| t.is_encryptable()) else {
        return Ok(None);
    };
    let Some(zone) = map.get("securityZone").and_then(JsonValue::as_number) else {
        return Ok(None);
    };
    let data = match map.get("data") {
        Some(JsonValue::Bool(b)) => ItemData::Bool(*b),
        Some(JsonValue::String(s)) => ItemData::Text(s.clone()),
        Some(JsonValue::Number(n)) => ItemData::Text(n.to_string()),
        _ => return Ok(None),
    };
    let security_zone = zone
        .as_u64()
        .and_then(|z| u8::try_from(z).ok())
        .ok_or_else(|| {
            PipelineError::UnrecognizedShape(format!("security zone {} out of range", zone))
        })?;

    Ok(Some(EncryptableItem {
        data,
        security_zone,
        utype,
    }))
}

fn sealed_from_json(map: &Map<String, JsonValue>) -> Option<SealedItem> {
    if map.contains_key("securityZone") {
        return None;
    }
    let utype = utype_of(map).filter(|t| t.is_sealable())?;
    let data = map.get("data")?.as_str()?;
    Some(SealedItem::new(utype, data))
}
