//! The permit entity and its permission projection.
//!
//! A permit authorizes an issuer, or a recipient the issuer shared it with, to
//! request sealed outputs of confidential values. Three kinds exist:
//!
//! - **Self**: the issuer signs everything, including its own sealing key.
//! - **Sharing**: the issuer signs the base fields for a named recipient. The
//!   sealing key is not signed because the recipient has not chosen one yet.
//! - **Recipient**: a sharing permit adopted by its recipient, who supplies a
//!   fresh sealing key and signs `{sealingKey, issuerSignature}`.

use std::fmt;

use cofhe_sdk_core::{
    address_hex, now_secs, Address, PermitHash, PermitIdentity, SealingKeyPair,
    SerializedSealingPair, U256,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{PermitError, Result};
use crate::signature::{SignatureSchema, SigningRole};
use crate::signer::{sign_with_capability, TypedDataSigner};
use crate::validation::{self, Validity};

/// Name given to permits created without one.
pub const DEFAULT_PERMIT_NAME: &str = "Unnamed Permit";

/// Default lifetime of a new permit, in seconds (7 days).
pub const DEFAULT_PERMIT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// The three permit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermitKind {
    #[serde(rename = "self")]
    SelfIssued,
    Sharing,
    Recipient,
}

impl PermitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PermitKind::SelfIssued => "self",
            PermitKind::Sharing => "sharing",
            PermitKind::Recipient => "recipient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "self" => Some(PermitKind::SelfIssued),
            "sharing" => Some(PermitKind::Sharing),
            "recipient" => Some(PermitKind::Recipient),
            _ => None,
        }
    }

    /// The role that signs a permit of this kind.
    pub fn signing_role(self) -> SigningRole {
        match self {
            PermitKind::SelfIssued | PermitKind::Sharing => SigningRole::Issuer,
            PermitKind::Recipient => SigningRole::Recipient,
        }
    }
}

impl fmt::Display for PermitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for [`Permit::create`].
///
/// Unset fields take defaults: empty scopes, zero recipient and validator,
/// expiration in [`DEFAULT_PERMIT_TTL_SECS`], a fresh sealing pair.
#[derive(Debug, Clone)]
pub struct PermitOptions {
    pub kind: PermitKind,
    pub issuer: Address,
    pub name: Option<String>,
    pub expiration: Option<u64>,
    pub contracts: Vec<Address>,
    pub projects: Vec<String>,
    pub recipient: Option<Address>,
    pub validator_id: Option<U256>,
    pub validator_contract: Option<Address>,
    pub sealing_pair: Option<SealingKeyPair>,
    pub issuer_signature: Option<String>,
    pub recipient_signature: Option<String>,
}

impl PermitOptions {
    fn empty(kind: PermitKind, issuer: Address) -> Self {
        Self {
            kind,
            issuer,
            name: None,
            expiration: None,
            contracts: Vec::new(),
            projects: Vec::new(),
            recipient: None,
            validator_id: None,
            validator_contract: None,
            sealing_pair: None,
            issuer_signature: None,
            recipient_signature: None,
        }
    }

    /// A permit the issuer uses for its own data.
    pub fn self_permit(issuer: Address) -> Self {
        Self::empty(PermitKind::SelfIssued, issuer)
    }

    /// A permit the issuer grants to `recipient`.
    pub fn sharing(issuer: Address, recipient: Address) -> Self {
        Self {
            recipient: Some(recipient),
            ..Self::empty(PermitKind::Sharing, issuer)
        }
    }

    /// A shared permit adopted by its recipient.
    pub fn recipient(issuer: Address, recipient: Address, issuer_signature: impl Into<String>) -> Self {
        Self {
            recipient: Some(recipient),
            issuer_signature: Some(issuer_signature.into()),
            ..Self::empty(PermitKind::Recipient, issuer)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_contracts(mut self, contracts: Vec<Address>) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_projects(mut self, projects: Vec<String>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_validator(mut self, validator_id: U256, validator_contract: Address) -> Self {
        self.validator_id = Some(validator_id);
        self.validator_contract = Some(validator_contract);
        self
    }

    pub fn with_sealing_pair(mut self, pair: SealingKeyPair) -> Self {
        self.sealing_pair = Some(pair);
        self
    }

    pub fn with_issuer_signature(mut self, signature: impl Into<String>) -> Self {
        self.issuer_signature = Some(signature.into());
        self
    }

    pub fn with_recipient_signature(mut self, signature: impl Into<String>) -> Self {
        self.recipient_signature = Some(signature.into());
        self
    }
}

/// A signed authorization record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SerializedPermit", try_from = "SerializedPermit")]
pub struct Permit {
    /// Free-form label, not signed.
    pub name: String,
    pub kind: PermitKind,
    pub issuer: Address,
    /// Unix seconds. The permit is expired at and after this instant.
    pub expiration: u64,
    pub contracts: Vec<Address>,
    pub projects: Vec<String>,
    /// Zero for self permits.
    pub recipient: Address,
    pub validator_id: U256,
    pub validator_contract: Address,
    pub sealing_pair: SealingKeyPair,
    pub issuer_signature: Option<String>,
    pub recipient_signature: Option<String>,
    /// Chain the current signature layer was produced for.
    pub signed_chain_id: Option<u64>,
}

impl Permit {
    /// Build a permit from options, without signing it.
    ///
    /// Fails with `ShapeValidationFailed` when the options violate the rules
    /// of their kind.
    pub fn create(options: PermitOptions) -> Result<Self> {
        let permit = Permit {
            name: options.name.unwrap_or_else(|| DEFAULT_PERMIT_NAME.to_string()),
            kind: options.kind,
            issuer: options.issuer,
            expiration: options
                .expiration
                .unwrap_or_else(|| now_secs() + DEFAULT_PERMIT_TTL_SECS),
            contracts: options.contracts,
            projects: options.projects,
            recipient: options.recipient.unwrap_or(Address::ZERO),
            validator_id: options.validator_id.unwrap_or(U256::ZERO),
            validator_contract: options.validator_contract.unwrap_or(Address::ZERO),
            sealing_pair: options.sealing_pair.unwrap_or_else(SealingKeyPair::generate),
            issuer_signature: options.issuer_signature,
            recipient_signature: options.recipient_signature,
            signed_chain_id: None,
        };
        validation::check_shape(&permit).into_result()?;
        Ok(permit)
    }

    /// Create a permit and sign it with `signer` for `chain_id`.
    pub async fn create_and_sign(
        options: PermitOptions,
        chain_id: u64,
        signer: &dyn TypedDataSigner,
    ) -> Result<Self> {
        let mut permit = Self::create(options)?;
        permit.sign(chain_id, signer).await?;
        Ok(permit)
    }

    /// Sign the layer this permit's kind calls for.
    ///
    /// Self and sharing permits receive the issuer signature, recipient
    /// permits the recipient signature. The signer's account must be the
    /// issuer or recipient respectively.
    pub async fn sign(&mut self, chain_id: u64, signer: &dyn TypedDataSigner) -> Result<()> {
        let role = self.kind.signing_role();
        let schema = SignatureSchema::select(self.kind, role)?;
        let expected = match role {
            SigningRole::Issuer => self.issuer,
            SigningRole::Recipient => self.recipient,
        };

        let account = signer.address().await?;
        if account != expected {
            return Err(PermitError::Signer(format!(
                "signer {} is not the permit {} {}",
                address_hex(&account),
                role,
                address_hex(&expected)
            )));
        }

        let data = schema.typed_data(self, chain_id)?;
        let signature = sign_with_capability(signer, &data).await?;
        match role {
            SigningRole::Issuer => self.issuer_signature = Some(signature),
            SigningRole::Recipient => self.recipient_signature = Some(signature),
        }
        self.signed_chain_id = Some(chain_id);

        tracing::debug!(kind = %self.kind, hash = %self.hash(), chain_id, "signed permit");
        Ok(())
    }

    /// Turn a signed sharing permit into the recipient's own permit.
    ///
    /// Base fields and the issuer signature carry over. The sealing pair is
    /// replaced with a fresh one and the recipient signature is left for
    /// [`Permit::sign`].
    pub fn into_recipient(self) -> Result<Self> {
        if self.kind != PermitKind::Sharing {
            return Err(PermitError::InvalidTransition(format!(
                "only sharing permits can be adopted, got {}",
                self.kind
            )));
        }
        if self.issuer_signature.is_none() {
            return Err(PermitError::InvalidTransition(
                "sharing permit has no issuer signature".into(),
            ));
        }

        let permit = Permit {
            kind: PermitKind::Recipient,
            sealing_pair: SealingKeyPair::generate(),
            recipient_signature: None,
            signed_chain_id: None,
            ..self
        };
        validation::check_shape(&permit).into_result()?;
        Ok(permit)
    }

    fn identity(&self) -> PermitIdentity<'_> {
        PermitIdentity {
            issuer: &self.issuer,
            expiration: self.expiration,
            contracts: &self.contracts,
            projects: &self.projects,
            recipient: &self.recipient,
            validator_id: &self.validator_id,
            validator_contract: &self.validator_contract,
        }
    }

    /// Identity hash over the base fields.
    ///
    /// The sealing pair, signatures, name and kind do not contribute.
    pub fn hash(&self) -> PermitHash {
        self.identity().hash()
    }

    /// `0x`-prefixed hex of the sealing public key, as signed.
    pub fn sealing_key_hex(&self) -> String {
        format!("0x{}", self.sealing_pair.public_key_hex())
    }

    /// The signature-free projection attached to outbound requests.
    pub fn permission(&self) -> Permission {
        Permission {
            issuer: self.issuer,
            expiration: self.expiration,
            contracts: self.contracts.clone(),
            projects: self.projects.clone(),
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
            sealing_key: self.sealing_key_hex(),
            issuer_signature: signature_or_empty(&self.issuer_signature),
            recipient_signature: signature_or_empty(&self.recipient_signature),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expiration
    }

    /// Trust validation against the current time.
    pub fn is_valid(&self) -> Validity {
        self.check_validity(now_secs())
    }

    /// Trust validation at `now`.
    pub fn check_validity(&self, now: u64) -> Validity {
        validation::validate_trust(self, now)
    }

    /// Unseal a ciphertext addressed to this permit's sealing key.
    pub fn unseal_ciphertext(&self, ciphertext: impl AsRef<[u8]>) -> Result<U256> {
        Ok(self.sealing_pair.unseal(ciphertext)?)
    }

    pub fn to_serialized(&self) -> SerializedPermit {
        SerializedPermit::from(self.clone())
    }

    /// Parse and shape-validate a serialized permit.
    pub fn from_serialized(serialized: &SerializedPermit) -> Result<Self> {
        validation::parse_serialized(serialized)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_serialized())
            .map_err(|e| PermitError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let serialized: SerializedPermit =
            serde_json::from_str(json).map_err(|e| PermitError::Serialization(e.to_string()))?;
        Self::from_serialized(&serialized)
    }
}

fn signature_or_empty(signature: &Option<String>) -> String {
    signature.clone().unwrap_or_else(|| "0x".to_string())
}

/// JSON wire form of a permit.
///
/// Every field is kept loosely typed so that shape validation can report
/// problems per field instead of failing on the first bad value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPermit {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub expiration: JsonValue,
    #[serde(default)]
    pub contracts: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub validator_id: JsonValue,
    #[serde(default)]
    pub validator_contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealing_pair: Option<SerializedSealingPair>,
    #[serde(default)]
    pub issuer_signature: String,
    #[serde(default)]
    pub recipient_signature: String,
    #[serde(rename = "_signedChainId", default, skip_serializing_if = "Option::is_none")]
    pub signed_chain_id: Option<String>,
}

impl From<Permit> for SerializedPermit {
    fn from(permit: Permit) -> Self {
        SerializedPermit {
            name: permit.name.clone(),
            kind: permit.kind.as_str().to_string(),
            issuer: address_hex(&permit.issuer),
            expiration: JsonValue::from(permit.expiration),
            contracts: permit.contracts.iter().map(address_hex).collect(),
            projects: permit.projects.clone(),
            recipient: address_hex(&permit.recipient),
            validator_id: JsonValue::String(permit.validator_id.to_string()),
            validator_contract: address_hex(&permit.validator_contract),
            sealing_pair: Some(permit.sealing_pair.to_serialized()),
            issuer_signature: signature_or_empty(&permit.issuer_signature),
            recipient_signature: signature_or_empty(&permit.recipient_signature),
            signed_chain_id: permit.signed_chain_id.map(|id| id.to_string()),
        }
    }
}

impl TryFrom<SerializedPermit> for Permit {
    type Error = PermitError;

    fn try_from(serialized: SerializedPermit) -> Result<Self> {
        validation::parse_serialized(&serialized)
    }
}

/// Transport-safe projection of a permit.
///
/// Carries the sealing public key but never the private key, the name or
/// the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(with = "address_str")]
    pub issuer: Address,
    pub expiration: u64,
    #[serde(with = "address_list")]
    pub contracts: Vec<Address>,
    pub projects: Vec<String>,
    #[serde(with = "address_str")]
    pub recipient: Address,
    #[serde(with = "decimal_u256")]
    pub validator_id: U256,
    #[serde(with = "address_str")]
    pub validator_contract: Address,
    pub sealing_key: String,
    pub issuer_signature: String,
    pub recipient_signature: String,
}

mod address_str {
    use super::*;

    pub fn serialize<S: Serializer>(address: &Address, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&address_hex(address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Address, D::Error> {
        let s = String::deserialize(d)?;
        cofhe_sdk_core::parse_address(&s).map_err(serde::de::Error::custom)
    }
}

mod address_list {
    use super::*;

    pub fn serialize<S: Serializer>(
        addresses: &[Address],
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(addresses.iter().map(address_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Vec<Address>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|s| cofhe_sdk_core::parse_address(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod decimal_u256 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    /// Accepts a JSON number or a decimal / `0x` hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<U256, D::Error> {
        match JsonValue::deserialize(d)? {
            JsonValue::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| serde::de::Error::custom("expected unsigned integer")),
            JsonValue::String(s) => {
                cofhe_sdk_core::parse_uint(&s).map_err(serde::de::Error::custom)
            }
            other => Err(serde::de::Error::custom(format!(
                "expected integer, got {}",
                other
            ))),
        }
    }
}
