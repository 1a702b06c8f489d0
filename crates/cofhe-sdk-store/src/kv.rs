//! Permit repository over a string key-value store.
//!
//! Key scheme:
//!
//! - permit: `cofhe_permit_<hash>_<account>` holding the serialized permit JSON
//! - active pointer: `cofhe_permit_active_<account>` holding the permit hash
//!
//! Hashes and accounts are rendered as lowercase `0x` hex.

use std::collections::BTreeMap;

use cofhe_sdk_core::{address_hex, Address, PermitHash};
use cofhe_sdk_permits::Permit;

use crate::error::{Result, StoreError};
use crate::traits::{KeyValueStore, PermitRepository};

/// Prefix shared by every key this adapter writes.
pub const KEY_PREFIX: &str = "cofhe_permit_";

const ACTIVE_SEGMENT: &str = "active_";

/// Key holding a serialized permit.
pub fn permit_key(account: &Address, hash: &PermitHash) -> String {
    format!("{}{}_{}", KEY_PREFIX, hash.to_hex(), address_hex(account))
}

/// Key holding the active permit hash of an account.
pub fn active_key(account: &Address) -> String {
    format!("{}{}{}", KEY_PREFIX, ACTIVE_SEGMENT, address_hex(account))
}

/// Extract the permit hash from a permit key belonging to `account`.
fn hash_from_key(key: &str, account_suffix: &str) -> Option<PermitHash> {
    let middle = key.strip_prefix(KEY_PREFIX)?.strip_suffix(account_suffix)?;
    if middle.starts_with(ACTIVE_SEGMENT) {
        return None;
    }
    PermitHash::from_hex(middle).ok()
}

/// [`PermitRepository`] adapter persisting permits into a [`KeyValueStore`].
pub struct KvPermitStore<K> {
    kv: K,
}

impl<K: KeyValueStore> KvPermitStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn inner(&self) -> &K {
        &self.kv
    }

    fn decode(key: &str, json: &str) -> Result<Permit> {
        Permit::from_json(json)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", key, e)))
    }

    /// Permit keys stored for `account`, paired with their hashes.
    fn account_keys(&self, account: &Address) -> Result<Vec<(PermitHash, String)>> {
        let suffix = format!("_{}", address_hex(account));
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter_map(|key| hash_from_key(&key, &suffix).map(|hash| (hash, key)))
            .collect())
    }
}

impl<K: KeyValueStore> PermitRepository for KvPermitStore<K> {
    fn set_permit(&self, account: &Address, permit: &Permit) -> Result<()> {
        let json = permit.to_json()?;
        self.kv.set(&permit_key(account, &permit.hash()), &json)
    }

    fn get_permit(&self, account: &Address, hash: &PermitHash) -> Result<Option<Permit>> {
        let key = permit_key(account, hash);
        match self.kv.get(&key)? {
            Some(json) => Self::decode(&key, &json).map(Some),
            None => Ok(None),
        }
    }

    fn get_permits(&self, account: &Address) -> Result<BTreeMap<PermitHash, Permit>> {
        let mut permits = BTreeMap::new();
        for (hash, key) in self.account_keys(account)? {
            let Some(json) = self.kv.get(&key)? else {
                continue;
            };
            match Self::decode(&key, &json) {
                Ok(permit) => {
                    permits.insert(hash, permit);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping unreadable permit"),
            }
        }
        Ok(permits)
    }

    fn set_active_permit_hash(&self, account: &Address, hash: &PermitHash) -> Result<()> {
        self.kv.set(&active_key(account), &hash.to_hex())
    }

    fn get_active_permit_hash(&self, account: &Address) -> Result<Option<PermitHash>> {
        let key = active_key(account);
        match self.kv.get(&key)? {
            Some(value) => match PermitHash::from_hex(&value) {
                Ok(hash) => Ok(Some(hash)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "ignoring unreadable active pointer");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn remove_permit(&self, account: &Address, hash: &PermitHash) -> Result<()> {
        self.kv.remove(&permit_key(account, hash))?;
        if self.get_active_permit_hash(account)? == Some(*hash) {
            self.kv.remove(&active_key(account))?;
        }
        Ok(())
    }

    fn clear_account(&self, account: &Address) -> Result<()> {
        for (_, key) in self.account_keys(account)? {
            self.kv.remove(&key)?;
        }
        self.kv.remove(&active_key(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use crate::traits::PermitRepositoryExt;
    use cofhe_sdk_permits::PermitOptions;

    fn permit(issuer: Address, project: &str) -> Permit {
        Permit::create(PermitOptions::self_permit(issuer).with_projects(vec![project.into()]))
            .unwrap()
    }

    #[test]
    fn test_key_scheme() {
        let account = Address::repeat_byte(0xab);
        let hash = PermitHash::from_bytes([0x11; 32]);

        assert_eq!(
            permit_key(&account, &hash),
            format!("cofhe_permit_0x{}_0x{}", "11".repeat(32), "ab".repeat(20))
        );
        assert_eq!(
            active_key(&account),
            format!("cofhe_permit_active_0x{}", "ab".repeat(20))
        );

        let suffix = format!("_{}", address_hex(&account));
        assert_eq!(hash_from_key(&permit_key(&account, &hash), &suffix), Some(hash));
        assert_eq!(hash_from_key(&active_key(&account), &suffix), None);
    }

    #[test]
    fn test_round_trip_through_kv() {
        let store = KvPermitStore::new(MemoryKv::new());
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");

        store.set_permit(&account, &p).unwrap();
        let loaded = store.get_permit(&account, &p.hash()).unwrap().unwrap();
        assert_eq!(loaded, p);
        assert_eq!(loaded.sealing_pair, p.sealing_pair);
    }

    #[test]
    fn test_enumeration_per_account() {
        let store = KvPermitStore::new(MemoryKv::new());
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let p = permit(a, "a");
        let q = permit(a, "b");
        let r = permit(b, "c");

        for (account, permit) in [(a, &p), (a, &q), (b, &r)] {
            store.set_permit(&account, permit).unwrap();
        }
        store.set_active_permit_hash(&a, &p.hash()).unwrap();

        let all = store.get_permits(&a).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key(&p.hash()));
        assert!(all.contains_key(&q.hash()));
        assert_eq!(store.get_permits(&b).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_entry_skipped() {
        let kv = MemoryKv::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        kv.set(&permit_key(&account, &PermitHash::from_bytes([9; 32])), "{not json")
            .unwrap();

        let store = KvPermitStore::new(kv);
        store.set_permit(&account, &p).unwrap();

        let all = store.get_permits(&account).unwrap();
        assert_eq!(all.len(), 1);
        assert!(store
            .get_permit(&account, &PermitHash::from_bytes([9; 32]))
            .is_err());
    }

    #[test]
    fn test_remove_active_and_clear() {
        let store = KvPermitStore::new(MemoryKv::new());
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        store.set_permit(&account, &p).unwrap();
        store.set_active_permit_hash(&account, &p.hash()).unwrap();
        assert_eq!(store.get_active_permit(&account).unwrap(), Some(p.clone()));

        store.remove_permit(&account, &p.hash()).unwrap();
        assert_eq!(store.get_active_permit_hash(&account).unwrap(), None);

        store.set_permit(&account, &p).unwrap();
        store.set_active_permit_hash(&account, &p.hash()).unwrap();
        store.clear_account(&account).unwrap();
        assert!(store.inner().is_empty());
    }
}
