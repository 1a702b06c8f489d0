//! In-memory implementations.
//!
//! [`MemoryPermitStore`] is the default repository for a session.
//! [`MemoryKv`] backs the key-value adapter in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cofhe_sdk_core::{Address, PermitHash};
use cofhe_sdk_permits::Permit;

use crate::error::{Result, StoreError};
use crate::traits::{KeyValueStore, PermitRepository};

/// In-memory permit repository.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryPermitStore {
    inner: RwLock<MemoryPermitStoreInner>,
}

#[derive(Default)]
struct MemoryPermitStoreInner {
    /// Permits indexed by account, then hash.
    permits: HashMap<Address, BTreeMap<PermitHash, Permit>>,

    /// Active pointer per account.
    active: HashMap<Address, PermitHash>,
}

impl MemoryPermitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryPermitStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryPermitStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl PermitRepository for MemoryPermitStore {
    fn set_permit(&self, account: &Address, permit: &Permit) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .permits
            .entry(*account)
            .or_default()
            .insert(permit.hash(), permit.clone());
        Ok(())
    }

    fn get_permit(&self, account: &Address, hash: &PermitHash) -> Result<Option<Permit>> {
        let inner = self.read()?;
        Ok(inner
            .permits
            .get(account)
            .and_then(|permits| permits.get(hash))
            .cloned())
    }

    fn get_permits(&self, account: &Address) -> Result<BTreeMap<PermitHash, Permit>> {
        let inner = self.read()?;
        Ok(inner.permits.get(account).cloned().unwrap_or_default())
    }

    fn set_active_permit_hash(&self, account: &Address, hash: &PermitHash) -> Result<()> {
        self.write()?.active.insert(*account, *hash);
        Ok(())
    }

    fn get_active_permit_hash(&self, account: &Address) -> Result<Option<PermitHash>> {
        Ok(self.read()?.active.get(account).copied())
    }

    fn remove_permit(&self, account: &Address, hash: &PermitHash) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(permits) = inner.permits.get_mut(account) {
            permits.remove(hash);
            if permits.is_empty() {
                inner.permits.remove(account);
            }
        }
        if inner.active.get(account) == Some(hash) {
            inner.active.remove(account);
        }
        Ok(())
    }

    fn clear_account(&self, account: &Address) -> Result<()> {
        let mut inner = self.write()?;
        inner.permits.remove(account);
        inner.active.remove(account);
        Ok(())
    }
}

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PermitRepositoryExt;
    use cofhe_sdk_permits::PermitOptions;

    fn permit(issuer: Address, project: &str) -> Permit {
        Permit::create(PermitOptions::self_permit(issuer).with_projects(vec![project.into()]))
            .unwrap()
    }

    #[test]
    fn test_set_get_remove() {
        let store = MemoryPermitStore::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        let hash = p.hash();

        store.set_permit(&account, &p).unwrap();
        assert_eq!(store.get_permit(&account, &hash).unwrap(), Some(p));

        store.remove_permit(&account, &hash).unwrap();
        assert_eq!(store.get_permit(&account, &hash).unwrap(), None);
    }

    #[test]
    fn test_accounts_are_isolated() {
        let store = MemoryPermitStore::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let p = permit(a, "a");

        store.set_permit(&a, &p).unwrap();
        assert!(store.get_permit(&b, &p.hash()).unwrap().is_none());
        assert!(store.get_permits(&b).unwrap().is_empty());
        assert_eq!(store.get_permits(&a).unwrap().len(), 1);
    }

    #[test]
    fn test_set_overwrites_same_hash() {
        let store = MemoryPermitStore::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        let mut renamed = p.clone();
        renamed.name = "renamed".into();

        store.set_permit(&account, &p).unwrap();
        store.set_permit(&account, &renamed).unwrap();

        let all = store.get_permits(&account).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&p.hash()].name, "renamed");
    }

    #[test]
    fn test_removing_active_clears_pointer() {
        let store = MemoryPermitStore::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        let q = permit(account, "b");

        store.set_permit(&account, &p).unwrap();
        store.set_permit(&account, &q).unwrap();
        store.set_active_permit_hash(&account, &p.hash()).unwrap();

        store.remove_permit(&account, &q.hash()).unwrap();
        assert_eq!(store.get_active_permit_hash(&account).unwrap(), Some(p.hash()));

        store.remove_permit(&account, &p.hash()).unwrap();
        assert_eq!(store.get_active_permit_hash(&account).unwrap(), None);
    }

    #[test]
    fn test_dangling_active_pointer_resolves_to_none() {
        let store = MemoryPermitStore::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");

        store.set_active_permit_hash(&account, &p.hash()).unwrap();
        assert_eq!(store.get_active_permit_hash(&account).unwrap(), Some(p.hash()));
        assert!(store.get_active_permit(&account).unwrap().is_none());

        store.set_permit(&account, &p).unwrap();
        assert_eq!(store.get_active_permit(&account).unwrap(), Some(p));
    }

    #[test]
    fn test_clear_account() {
        let store = MemoryPermitStore::new();
        let account = Address::repeat_byte(1);
        let p = permit(account, "a");
        store.set_permit(&account, &p).unwrap();
        store.set_active_permit_hash(&account, &p.hash()).unwrap();

        store.clear_account(&account).unwrap();
        assert!(store.get_permits(&account).unwrap().is_empty());
        assert!(store.get_active_permit_hash(&account).unwrap().is_none());
    }

    #[test]
    fn test_memory_kv() {
        let kv = MemoryKv::new();
        kv.set("b", "2").unwrap();
        kv.set("a", "1").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(kv.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

        kv.remove("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
        assert_eq!(kv.len(), 1);
    }
}
