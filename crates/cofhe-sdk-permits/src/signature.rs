//! EIP-712 payloads for permit signatures.
//!
//! Three schemas exist, selected by permit kind and signing role:
//!
//! | schema        | primary type               | fields                                                                                   |
//! |---------------|----------------------------|------------------------------------------------------------------------------------------|
//! | issuer-self   | `PermissionedIssuerSelf`   | issuer, expiration, contracts, projects, recipient, validatorId, validatorContract, sealingKey |
//! | issuer-shared | `PermissionedIssuerShared` | issuer, expiration, contracts, projects, recipient, validatorId, validatorContract        |
//! | recipient     | `PermissionedRecipient`    | sealingKey, issuerSignature                                                              |
//!
//! A shared permit's issuer signature omits the sealing key because the
//! recipient supplies its own key later and binds it with the recipient
//! signature.

use std::collections::BTreeMap;
use std::fmt;

use cofhe_sdk_core::{address_hex, Address, Eip712Domain, TypedData, TypedField};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::error::{PermitError, Result};
use crate::permit::{Permit, PermitKind};

/// EIP-712 domain name for permit signatures.
pub const DOMAIN_NAME: &str = "Fhenix Permission v2.0.0";

/// EIP-712 domain version for permit signatures.
pub const DOMAIN_VERSION: &str = "v2.0.0";

/// Every field a permit signature can cover, with its wire type.
const ALL_FIELDS: [(&str, &str); 9] = [
    ("issuer", "address"),
    ("expiration", "uint64"),
    ("contracts", "address[]"),
    ("projects", "string[]"),
    ("recipient", "address"),
    ("validatorId", "uint256"),
    ("validatorContract", "address"),
    ("sealingKey", "bytes32"),
    ("issuerSignature", "bytes"),
];

/// Who is signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningRole {
    Issuer,
    Recipient,
}

impl fmt::Display for SigningRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningRole::Issuer => f.write_str("issuer"),
            SigningRole::Recipient => f.write_str("recipient"),
        }
    }
}

/// The three permit signature schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSchema {
    IssuerSelf,
    IssuerShared,
    Recipient,
}

impl SignatureSchema {
    /// Select the schema used when `role` signs a permit of `kind`.
    ///
    /// A self permit has no recipient role. A recipient permit already carries
    /// the issuer signature, so only its recipient may sign it.
    pub fn select(kind: PermitKind, role: SigningRole) -> Result<Self> {
        match (kind, role) {
            (PermitKind::SelfIssued, SigningRole::Issuer) => Ok(SignatureSchema::IssuerSelf),
            (PermitKind::Sharing, SigningRole::Issuer) => Ok(SignatureSchema::IssuerShared),
            (PermitKind::Recipient, SigningRole::Recipient) => Ok(SignatureSchema::Recipient),
            (kind, role) => Err(PermitError::InvalidRole { kind, role }),
        }
    }

    pub fn primary_type(self) -> &'static str {
        match self {
            SignatureSchema::IssuerSelf => "PermissionedIssuerSelf",
            SignatureSchema::IssuerShared => "PermissionedIssuerShared",
            SignatureSchema::Recipient => "PermissionedRecipient",
        }
    }

    /// Field names covered by this schema, in signing order.
    pub fn field_names(self) -> &'static [&'static str] {
        match self {
            SignatureSchema::IssuerSelf => &[
                "issuer",
                "expiration",
                "contracts",
                "projects",
                "recipient",
                "validatorId",
                "validatorContract",
                "sealingKey",
            ],
            SignatureSchema::IssuerShared => &[
                "issuer",
                "expiration",
                "contracts",
                "projects",
                "recipient",
                "validatorId",
                "validatorContract",
            ],
            SignatureSchema::Recipient => &["sealingKey", "issuerSignature"],
        }
    }

    /// The `{name, type}` list for this schema.
    pub fn fields(self) -> Vec<TypedField> {
        let names = self.field_names();
        ALL_FIELDS
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, ty)| TypedField::new(*name, *ty))
            .collect()
    }

    /// Build the full typed-data payload for `permit` on `chain_id`.
    pub fn typed_data(self, permit: &Permit, chain_id: u64) -> Result<TypedData> {
        let mut types = BTreeMap::new();
        types.insert(self.primary_type().to_string(), self.fields());

        Ok(TypedData {
            domain: signature_domain(chain_id),
            types,
            primary_type: self.primary_type().to_string(),
            message: self.message(permit)?,
        })
    }

    fn message(self, permit: &Permit) -> Result<Map<String, JsonValue>> {
        let mut message = Map::new();
        for name in self.field_names() {
            let value = match *name {
                "issuer" => json!(address_hex(&permit.issuer)),
                "expiration" => json!(permit.expiration),
                "contracts" => JsonValue::Array(
                    permit.contracts.iter().map(|c| json!(address_hex(c))).collect(),
                ),
                "projects" => json!(permit.projects),
                "recipient" => json!(address_hex(&permit.recipient)),
                "validatorId" => json!(permit.validator_id.to_string()),
                "validatorContract" => json!(address_hex(&permit.validator_contract)),
                "sealingKey" => json!(permit.sealing_key_hex()),
                "issuerSignature" => {
                    let sig = permit.issuer_signature.as_deref().ok_or_else(|| {
                        PermitError::InvalidTransition(
                            "recipient signature requires the issuer signature".into(),
                        )
                    })?;
                    json!(sig)
                }
                other => {
                    return Err(PermitError::Serialization(format!(
                        "unknown signature field {}",
                        other
                    )))
                }
            };
            message.insert((*name).to_string(), value);
        }
        Ok(message)
    }
}

/// The EIP-712 domain for permit signatures on `chain_id`.
pub fn signature_domain(chain_id: u64) -> Eip712Domain {
    Eip712Domain {
        name: DOMAIN_NAME.to_string(),
        version: DOMAIN_VERSION.to_string(),
        chain_id,
        verifying_contract: Address::ZERO,
    }
}
