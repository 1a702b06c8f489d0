//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cofhe_sdk_core::{Address, FheType, U256};
use cofhe_sdk_permits::PermitOptions;
use cofhe_sdk_pipeline::{EncryptableItem, Scalar, Value};

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from)
}

/// Generate a non-zero address.
pub fn nonzero_address() -> impl Strategy<Value = Address> {
    address().prop_filter("non-zero address", |a| *a != Address::ZERO)
}

/// Generate any 256-bit unsigned value.
pub fn uint256() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(|bytes| U256::from_be_bytes(bytes))
}

/// Generate a project identifier.
pub fn project() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate an encryptable item whose payload fits its type.
pub fn encryptable_item() -> impl Strategy<Value = EncryptableItem> {
    prop_oneof![
        any::<bool>().prop_map(EncryptableItem::bool),
        any::<u8>().prop_map(|v| EncryptableItem::uint(FheType::Uint8, v.to_string())),
        any::<u16>().prop_map(|v| EncryptableItem::uint(FheType::Uint16, v.to_string())),
        any::<u32>().prop_map(|v| EncryptableItem::uint(FheType::Uint32, v.to_string())),
        any::<u64>().prop_map(|v| EncryptableItem::uint(FheType::Uint64, v.to_string())),
        any::<u128>().prop_map(|v| EncryptableItem::uint(FheType::Uint128, v.to_string())),
        uint256().prop_map(|v| EncryptableItem::uint(FheType::Uint256, v.to_string())),
    ]
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Scalar(Scalar::Null)),
        any::<bool>().prop_map(Value::scalar),
        any::<u64>().prop_map(Value::scalar),
        // Too short to collide with the permission marker.
        "[a-z]{0,8}".prop_map(Value::scalar),
    ]
}

/// Generate a payload tree of plain scalars and encryptable leaves, at most
/// `depth` containers deep.
pub fn payload(depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![scalar(), encryptable_item().prop_map(Value::from)];
    leaf.prop_recursive(depth, 64, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(Value::Keyed),
        ]
    })
}

/// Generate self-permit options for `issuer` that pass shape validation.
pub fn self_permit_options(issuer: Address) -> impl Strategy<Value = PermitOptions> {
    (
        "[A-Za-z ]{1,24}",
        prop::collection::vec(address(), 0..3),
        prop::collection::vec(project(), 1..3),
        3_600u64..=365 * 24 * 3_600,
    )
        .prop_map(move |(name, contracts, projects, ttl)| {
            PermitOptions::self_permit(issuer)
                .with_name(name)
                .with_contracts(contracts)
                .with_projects(projects)
                .with_expiration(cofhe_sdk_core::now_secs() + ttl)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cofhe_sdk_pipeline::{extract_encryptables, WalkConfig};

    proptest! {
        #[test]
        fn test_generated_payloads_respect_depth(value in payload(4)) {
            let config = WalkConfig { max_depth: 4 };
            prop_assert!(extract_encryptables(&value, &config).is_ok());
        }

        #[test]
        fn test_generated_items_are_encryptable(item in encryptable_item()) {
            prop_assert!(item.utype.is_encryptable());
        }
    }
}
