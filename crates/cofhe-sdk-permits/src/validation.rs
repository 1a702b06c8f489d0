//! Permit validation.
//!
//! Two levels:
//!
//! - **Shape**: required fields for the kind are present and well-formed.
//!   Failures are reported as a [`FieldErrors`] map.
//! - **Trust**: shape-valid, not expired, and every signature the kind
//!   calls for recovers to the right account. Failures are reported as a
//!   [`Validity`] value, never as an error, because imported permits are
//!   expected to be invalid sometimes.

use cofhe_sdk_core::{
    address_hex, decode_hex, parse_address, parse_uint, Address, SealingKeyPair, U256,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{FieldErrors, PermitError, Result};
use crate::permit::{Permit, PermitKind, SerializedPermit, DEFAULT_PERMIT_NAME};
use crate::signature::SignatureSchema;

/// Length of an `r‖s‖v` signature.
const SIGNATURE_LEN: usize = 65;

/// Outcome of trust validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validity {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }

    /// Convert to a `Result`, mapping an invalid outcome to
    /// `TrustValidationFailed`.
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(PermitError::TrustValidationFailed(
                self.error.unwrap_or_else(|| "invalid permit".to_string()),
            ))
        }
    }
}

/// Structural rules for a typed permit.
pub fn check_shape(permit: &Permit) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if permit.issuer == Address::ZERO {
        errors.add("issuer", "required");
    }
    if permit.expiration == 0 {
        errors.add("expiration", "must be a positive integer");
    }
    if permit.contracts.is_empty() && permit.projects.is_empty() {
        errors.add("contracts", "contracts and projects cannot both be empty");
        errors.add("projects", "contracts and projects cannot both be empty");
    }
    if permit.projects.iter().any(|p| p.is_empty()) {
        errors.add("projects", "project identifiers must not be empty");
    }
    if (permit.validator_id == U256::ZERO) != (permit.validator_contract == Address::ZERO) {
        let message = "validatorId and validatorContract must be set together";
        errors.add("validatorId", message);
        errors.add("validatorContract", message);
    }

    match permit.kind {
        PermitKind::SelfIssued => {
            if permit.recipient != Address::ZERO {
                errors.add("recipient", "must be empty for a self permit");
            }
            if permit.recipient_signature.is_some() {
                errors.add("recipientSignature", "must be empty for a self permit");
            }
        }
        PermitKind::Sharing => {
            if permit.recipient == Address::ZERO {
                errors.add("recipient", "required for a sharing permit");
            }
            if permit.recipient_signature.is_some() {
                errors.add("recipientSignature", "must be empty for a sharing permit");
            }
        }
        PermitKind::Recipient => {
            if permit.recipient == Address::ZERO {
                errors.add("recipient", "required for a recipient permit");
            }
            if permit.issuer_signature.is_none() {
                errors.add("issuerSignature", "required for a recipient permit");
            }
        }
    }

    for (field, signature) in [
        ("issuerSignature", &permit.issuer_signature),
        ("recipientSignature", &permit.recipient_signature),
    ] {
        if let Some(sig) = signature {
            if !is_signature_shaped(sig) {
                errors.add(field, "must be a 65-byte hex signature");
            }
        }
    }

    errors
}

fn is_signature_shaped(signature: &str) -> bool {
    decode_hex(signature)
        .map(|bytes| bytes.len() == SIGNATURE_LEN)
        .unwrap_or(false)
}

/// Parse a serialized permit, collecting every field violation.
///
/// A missing sealing pair is generated. Empty or `"0x"` signatures are
/// treated as absent.
pub fn parse_serialized(serialized: &SerializedPermit) -> Result<Permit> {
    let mut errors = FieldErrors::new();

    let kind = PermitKind::parse(&serialized.kind);
    if kind.is_none() {
        errors.add("type", "must be one of self, sharing, recipient");
    }

    let issuer = if serialized.issuer.is_empty() {
        errors.add("issuer", "required");
        None
    } else {
        address_field(&mut errors, "issuer", &serialized.issuer)
    };
    let recipient = optional_address(&mut errors, "recipient", &serialized.recipient);
    let validator_contract =
        optional_address(&mut errors, "validatorContract", &serialized.validator_contract);

    let expiration = match &serialized.expiration {
        JsonValue::Number(n) => match n.as_u64() {
            Some(v) => Some(v),
            None => {
                errors.add("expiration", "must be a positive integer");
                None
            }
        },
        JsonValue::Null => {
            errors.add("expiration", "required");
            None
        }
        _ => {
            errors.add("expiration", "must be a positive integer");
            None
        }
    };

    let validator_id = match &serialized.validator_id {
        JsonValue::Null => Some(U256::ZERO),
        JsonValue::Number(n) => n.as_u64().map(U256::from),
        JsonValue::String(s) if s.is_empty() => Some(U256::ZERO),
        JsonValue::String(s) => parse_uint(s).ok(),
        _ => None,
    };
    if validator_id.is_none() {
        errors.add("validatorId", "must be a non-negative integer");
    }

    let mut contracts = Vec::with_capacity(serialized.contracts.len());
    for contract in &serialized.contracts {
        if let Some(address) = address_field(&mut errors, "contracts", contract) {
            contracts.push(address);
        }
    }

    let sealing_pair = match &serialized.sealing_pair {
        None => Some(SealingKeyPair::generate()),
        Some(pair) => match SealingKeyPair::from_serialized(pair) {
            Ok(pair) => Some(pair),
            Err(e) => {
                errors.add("sealingPair", e.to_string());
                None
            }
        },
    };

    let signed_chain_id = match serialized.signed_chain_id.as_deref() {
        None | Some("") => None,
        Some(s) => match s.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("_signedChainId", "must be a decimal chain id");
                None
            }
        },
    };

    errors.clone().into_result()?;

    // Every Option above is Some once no errors were recorded.
    let (
        Some(kind),
        Some(issuer),
        Some(expiration),
        Some(recipient),
        Some(validator_id),
        Some(validator_contract),
        Some(sealing_pair),
    ) = (
        kind,
        issuer,
        expiration,
        recipient,
        validator_id,
        validator_contract,
        sealing_pair,
    )
    else {
        return Err(PermitError::ShapeValidationFailed(errors));
    };

    let permit = Permit {
        name: if serialized.name.is_empty() {
            DEFAULT_PERMIT_NAME.to_string()
        } else {
            serialized.name.clone()
        },
        kind,
        issuer,
        expiration,
        contracts,
        projects: serialized.projects.clone(),
        recipient,
        validator_id,
        validator_contract,
        sealing_pair,
        issuer_signature: optional_signature(&serialized.issuer_signature),
        recipient_signature: optional_signature(&serialized.recipient_signature),
        signed_chain_id,
    };
    check_shape(&permit).into_result()?;
    Ok(permit)
}

fn address_field(errors: &mut FieldErrors, field: &str, value: &str) -> Option<Address> {
    match parse_address(value) {
        Ok(address) => Some(address),
        Err(_) => {
            errors.add(field, format!("invalid address {}", value));
            None
        }
    }
}

fn optional_address(errors: &mut FieldErrors, field: &str, value: &str) -> Option<Address> {
    if value.is_empty() {
        Some(Address::ZERO)
    } else {
        address_field(errors, field, value)
    }
}

fn optional_signature(value: &str) -> Option<String> {
    match value {
        "" | "0x" => None,
        sig => Some(sig.to_string()),
    }
}

/// Trust validation at `now`.
pub fn validate_trust(permit: &Permit, now: u64) -> Validity {
    let shape = check_shape(permit);
    if !shape.is_empty() {
        return Validity::invalid(format!("invalid permit data:\n{}", shape));
    }
    if permit.is_expired_at(now) {
        return Validity::invalid("expired");
    }
    let Some(chain_id) = permit.signed_chain_id else {
        return Validity::invalid("not signed");
    };
    let Some(issuer_signature) = permit.issuer_signature.as_deref() else {
        return Validity::invalid("missing issuer signature");
    };

    let issuer_schema = match permit.kind {
        PermitKind::SelfIssued => SignatureSchema::IssuerSelf,
        PermitKind::Sharing | PermitKind::Recipient => SignatureSchema::IssuerShared,
    };
    if let Err(reason) = verify_signature(
        permit,
        issuer_schema,
        chain_id,
        issuer_signature,
        &permit.issuer,
    ) {
        return Validity::invalid(format!("issuer signature: {}", reason));
    }

    if permit.kind == PermitKind::Recipient {
        let Some(recipient_signature) = permit.recipient_signature.as_deref() else {
            return Validity::invalid("missing recipient signature");
        };
        if let Err(reason) = verify_signature(
            permit,
            SignatureSchema::Recipient,
            chain_id,
            recipient_signature,
            &permit.recipient,
        ) {
            return Validity::invalid(format!("recipient signature: {}", reason));
        }
    }

    Validity::ok()
}

fn verify_signature(
    permit: &Permit,
    schema: SignatureSchema,
    chain_id: u64,
    signature: &str,
    expected: &Address,
) -> std::result::Result<(), String> {
    let data = schema
        .typed_data(permit, chain_id)
        .map_err(|e| e.to_string())?;
    let signer = data.recover_signer(signature).map_err(|e| e.to_string())?;
    if &signer == expected {
        Ok(())
    } else {
        Err(format!(
            "recovered {} but expected {}",
            address_hex(&signer),
            address_hex(expected)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permit::PermitOptions;
    use crate::signer::LocalSigner;
    use cofhe_sdk_core::now_secs;
    use proptest::prelude::*;
    use serde_json::json;

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    async fn signed_self(signer: &LocalSigner) -> Permit {
        let options = PermitOptions::self_permit(signer.account())
            .with_contracts(vec![contract()])
            .with_expiration(now_secs() + 3600);
        Permit::create_and_sign(options, 1, signer).await.unwrap()
    }

    async fn signed_recipient(issuer: &LocalSigner, recipient: &LocalSigner) -> Permit {
        let options = PermitOptions::sharing(issuer.account(), recipient.account())
            .with_projects(vec!["demo".into()])
            .with_expiration(now_secs() + 3600);
        let sharing = Permit::create_and_sign(options, 1, issuer).await.unwrap();
        let mut adopted = sharing.into_recipient().unwrap();
        adopted.sign(1, recipient).await.unwrap();
        adopted
    }

    #[test]
    fn test_shape_collects_all_violations() {
        let serialized: SerializedPermit = serde_json::from_value(json!({
            "type": "bogus",
            "issuer": "0x1234",
            "expiration": -5,
            "contracts": ["not-an-address"],
            "validatorId": true,
        }))
        .unwrap();

        match parse_serialized(&serialized).unwrap_err() {
            PermitError::ShapeValidationFailed(errors) => {
                for field in ["type", "issuer", "expiration", "contracts", "validatorId"] {
                    assert!(errors.contains(field), "missing {field}: {errors}");
                }
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shape_kind_rules() {
        let base = json!({
            "type": "recipient",
            "issuer": address_hex(&Address::repeat_byte(1)),
            "expiration": 2_000_000_000u64,
            "projects": ["p"],
        });
        let serialized: SerializedPermit = serde_json::from_value(base).unwrap();
        match parse_serialized(&serialized).unwrap_err() {
            PermitError::ShapeValidationFailed(errors) => {
                assert!(errors.contains("recipient"));
                assert!(errors.contains("issuerSignature"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validator_pair_rule() {
        let options = PermitOptions::self_permit(Address::repeat_byte(1))
            .with_contracts(vec![contract()])
            .with_validator(U256::from(3u64), Address::ZERO);
        match Permit::create(options).unwrap_err() {
            PermitError::ShapeValidationFailed(errors) => {
                assert!(errors.contains("validatorId"));
                assert!(errors.contains("validatorContract"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validator_id_accepts_number_and_string() {
        for id in [json!(12), json!("12")] {
            let serialized: SerializedPermit = serde_json::from_value(json!({
                "type": "self",
                "issuer": address_hex(&Address::repeat_byte(1)),
                "expiration": 2_000_000_000u64,
                "projects": ["p"],
                "validatorId": id,
                "validatorContract": address_hex(&Address::repeat_byte(2)),
            }))
            .unwrap();
            let permit = parse_serialized(&serialized).unwrap();
            assert_eq!(permit.validator_id, U256::from(12u64));
        }
    }

    #[test]
    fn test_missing_sealing_pair_is_generated() {
        let serialized: SerializedPermit = serde_json::from_value(json!({
            "type": "self",
            "issuer": address_hex(&Address::repeat_byte(1)),
            "expiration": 2_000_000_000u64,
            "contracts": [address_hex(&contract())],
            "issuerSignature": "0x",
        }))
        .unwrap();
        let permit = parse_serialized(&serialized).unwrap();
        assert!(permit.issuer_signature.is_none());
        assert_eq!(permit.name, DEFAULT_PERMIT_NAME);
    }

    #[tokio::test]
    async fn test_self_permit_trust() {
        let signer = LocalSigner::from_seed([0x41; 32]);
        let permit = signed_self(&signer).await;
        assert_eq!(validate_trust(&permit, now_secs()), Validity::ok());

        let expired = validate_trust(&permit, permit.expiration);
        assert!(!expired.valid);
        assert_eq!(expired.error.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_unsigned_permit_is_invalid() {
        let permit = Permit::create(
            PermitOptions::self_permit(Address::repeat_byte(1)).with_contracts(vec![contract()]),
        )
        .unwrap();
        let validity = permit.is_valid();
        assert!(!validity.valid);
        assert!(validity.into_result().is_err());
    }

    #[tokio::test]
    async fn test_self_sealing_key_is_signed() {
        let signer = LocalSigner::from_seed([0x41; 32]);
        let mut permit = signed_self(&signer).await;
        permit.sealing_pair = SealingKeyPair::generate();
        assert!(!permit.is_valid().valid);
    }

    #[tokio::test]
    async fn test_wrong_chain_invalidates() {
        let signer = LocalSigner::from_seed([0x41; 32]);
        let mut permit = signed_self(&signer).await;
        permit.signed_chain_id = Some(5);
        assert!(!permit.is_valid().valid);
    }

    #[tokio::test]
    async fn test_recipient_requires_both_signatures() {
        let issuer = LocalSigner::from_seed([0x51; 32]);
        let recipient = LocalSigner::from_seed([0x52; 32]);
        let permit = signed_recipient(&issuer, &recipient).await;
        assert!(permit.is_valid().valid);

        let mut bad_issuer = permit.clone();
        bad_issuer.issuer_signature = Some(corrupt(bad_issuer.issuer_signature.as_deref().unwrap()));
        let validity = bad_issuer.is_valid();
        assert!(!validity.valid);

        let mut bad_recipient = permit.clone();
        bad_recipient.recipient_signature =
            Some(corrupt(bad_recipient.recipient_signature.as_deref().unwrap()));
        let validity = bad_recipient.is_valid();
        assert!(!validity.valid);
        assert!(validity.error.unwrap().starts_with("recipient signature"));

        let mut missing = permit;
        missing.recipient_signature = None;
        assert!(!missing.is_valid().valid);
    }

    #[tokio::test]
    async fn test_swapped_signers_invalid() {
        let issuer = LocalSigner::from_seed([0x51; 32]);
        let recipient = LocalSigner::from_seed([0x52; 32]);
        let mut permit = signed_recipient(&issuer, &recipient).await;
        std::mem::swap(&mut permit.issuer, &mut permit.recipient);
        assert!(!permit.is_valid().valid);
    }

    /// Flip one bit of `r` so the signature still parses but recovers a
    /// different key, or fails to recover at all.
    fn corrupt(signature: &str) -> String {
        let mut bytes = decode_hex(signature).unwrap();
        bytes[5] ^= 0x01;
        format!("0x{}", hex::encode(bytes))
    }

    fn tamper(permit: &mut Permit, field: usize) {
        match field {
            0 => permit.issuer = Address::repeat_byte(0x77),
            1 => permit.expiration += 60,
            2 => permit.contracts.push(Address::repeat_byte(0x78)),
            3 => permit.projects.push("extra".into()),
            4 => {
                permit.validator_id = U256::from(1u64);
                permit.validator_contract = Address::repeat_byte(0x79);
            }
            _ => permit.sealing_pair = SealingKeyPair::generate(),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn test_mutating_signed_field_invalidates(field in 0usize..6) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let signer = LocalSigner::from_seed([0x61; 32]);
            let mut permit = rt.block_on(signed_self(&signer));
            prop_assert!(permit.is_valid().valid);

            tamper(&mut permit, field);
            prop_assert!(!permit.is_valid().valid);
        }
    }
}
