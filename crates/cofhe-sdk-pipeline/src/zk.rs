//! Packing encryptable items and proving the packed list.

use cofhe_sdk_core::{address_hex, parse_uint, Address, FheType, U256};
use serde_json::json;

use crate::backend::{CiphertextListBuilder, FheEngine, FhePublicKey, ProvenCiphertextList};
use crate::error::{PipelineError, Result};
use crate::value::{EncryptableItem, ItemData};

/// Push every item into a fresh builder, in order.
///
/// Fails with `InvalidValue` when a payload is not an unsigned integer or
/// does not fit the item's type.
pub fn zk_pack(
    items: &[EncryptableItem],
    engine: &dyn FheEngine,
    key: &FhePublicKey,
) -> Result<Box<dyn CiphertextListBuilder>> {
    let mut builder = engine.builder(key);
    for (index, item) in items.iter().enumerate() {
        push_item(builder.as_mut(), item)
            .map_err(|e| PipelineError::InvalidValue(format!("item {}: {}", index, e)))?;
    }
    Ok(builder)
}

fn push_item(builder: &mut dyn CiphertextListBuilder, item: &EncryptableItem) -> Result<()> {
    if item.utype == FheType::Bool {
        builder.push_bool(item_bool(&item.data)?);
        return Ok(());
    }

    let value = item_uint(&item.data)?;
    if value.bit_len() > item.utype.bit_width() {
        return Err(PipelineError::InvalidValue(format!(
            "{} does not fit {}",
            value, item.utype
        )));
    }

    // The width check above makes every narrowing below lossless.
    let limb = value.as_limbs()[0];
    match item.utype {
        FheType::Uint8 => builder.push_u8(limb as u8),
        FheType::Uint16 => builder.push_u16(limb as u16),
        FheType::Uint32 => builder.push_u32(limb as u32),
        FheType::Uint64 => builder.push_u64(limb),
        FheType::Uint128 => {
            let limbs = value.as_limbs();
            builder.push_u128((limbs[1] as u128) << 64 | limbs[0] as u128)
        }
        FheType::Uint256 => builder.push_u256(value),
        other => {
            return Err(PipelineError::InvalidValue(format!(
                "{} is not encryptable",
                other
            )))
        }
    }
    Ok(())
}

fn item_bool(data: &ItemData) -> Result<bool> {
    match data {
        ItemData::Bool(b) => Ok(*b),
        ItemData::Text(s) => match s.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(PipelineError::InvalidValue(format!(
                "{} is not a boolean",
                other
            ))),
        },
    }
}

fn item_uint(data: &ItemData) -> Result<U256> {
    match data {
        ItemData::Bool(b) => Ok(U256::from(*b as u8)),
        ItemData::Text(s) => parse_uint(s).map_err(|e| PipelineError::InvalidValue(e.to_string())),
    }
}

/// Proof metadata binding the list to an account and security zone.
pub fn proof_metadata(account: &Address, security_zone: u8) -> Vec<u8> {
    json!({ "address": address_hex(account), "securityZone": security_zone })
        .to_string()
        .into_bytes()
}

/// Build the proven list, bound to `account` and `security_zone`.
pub fn zk_prove(
    builder: Box<dyn CiphertextListBuilder>,
    account: &Address,
    security_zone: u8,
) -> Result<ProvenCiphertextList> {
    let count = builder.len();
    let proven = builder.build_with_proof(&proof_metadata(account, security_zone))?;
    tracing::debug!(count, security_zone, bytes = proven.as_bytes().len(), "proved ciphertext list");
    Ok(proven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryFheEngine, PackedEntry, PackedList};

    fn key() -> FhePublicKey {
        FhePublicKey::from_bytes(vec![1, 2, 3])
    }

    fn pack(items: &[EncryptableItem]) -> Result<PackedList> {
        let builder = zk_pack(items, &MemoryFheEngine::new(), &key())?;
        let proven = zk_prove(builder, &Address::repeat_byte(9), 2)?;
        PackedList::decode(proven.as_bytes())
    }

    #[test]
    fn test_pack_preserves_order_and_types() {
        let packed = pack(&[
            EncryptableItem::bool(true),
            EncryptableItem::uint(FheType::Uint32, "42"),
            EncryptableItem::uint(FheType::Uint128, "0xffffffffffffffffff"),
            EncryptableItem::uint(FheType::Uint256, "1"),
        ])
        .unwrap();

        assert_eq!(
            packed.entries,
            vec![
                PackedEntry::new(FheType::Bool, U256::from(1u64)),
                PackedEntry::new(FheType::Uint32, U256::from(42u64)),
                PackedEntry::new(FheType::Uint128, U256::from(0xffffffffffffffffffu128)),
                PackedEntry::new(FheType::Uint256, U256::from(1u64)),
            ]
        );
        assert_eq!(packed.metadata, proof_metadata(&Address::repeat_byte(9), 2));
    }

    #[test]
    fn test_pack_rejects_overflow() {
        assert!(matches!(
            pack(&[EncryptableItem::uint(FheType::Uint8, "256")]),
            Err(PipelineError::InvalidValue(_))
        ));
        assert!(pack(&[EncryptableItem::uint(FheType::Uint8, "255")]).is_ok());
    }

    #[test]
    fn test_pack_rejects_non_integral() {
        for bad in ["-1", "1.5", "abc", ""] {
            assert!(
                matches!(
                    pack(&[EncryptableItem::uint(FheType::Uint32, bad)]),
                    Err(PipelineError::InvalidValue(_))
                ),
                "{bad}"
            );
        }
        assert!(matches!(
            pack(&[EncryptableItem::new(FheType::Bool, ItemData::Text("yes".into()), 0)]),
            Err(PipelineError::InvalidValue(_))
        ));
    }
}
