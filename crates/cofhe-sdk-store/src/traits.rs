//! Repository traits: the abstract interface for permit persistence.
//!
//! The SDK talks to a [`PermitRepository`] only. Implementations include the
//! in-memory default and [`KvPermitStore`](crate::KvPermitStore), an adapter
//! over any [`KeyValueStore`].
//!
//! There is no compare-and-swap. Writes are last-writer-wins, and callers
//! must serialize writes per account.

use std::collections::BTreeMap;

use cofhe_sdk_core::{Address, PermitHash};
use cofhe_sdk_permits::Permit;

use crate::error::Result;

/// Per-account permit storage with one active pointer per account.
pub trait PermitRepository: Send + Sync {
    /// Insert or overwrite by `(account, permit.hash())`.
    fn set_permit(&self, account: &Address, permit: &Permit) -> Result<()>;

    /// Look up one permit. Returns `None` when the account has no such permit.
    fn get_permit(&self, account: &Address, hash: &PermitHash) -> Result<Option<Permit>>;

    /// Snapshot of every permit stored for `account`.
    fn get_permits(&self, account: &Address) -> Result<BTreeMap<PermitHash, Permit>>;

    /// Point the account's active permit at `hash`.
    ///
    /// The permit does not need to be stored yet.
    fn set_active_permit_hash(&self, account: &Address, hash: &PermitHash) -> Result<()>;

    fn get_active_permit_hash(&self, account: &Address) -> Result<Option<PermitHash>>;

    /// Delete a permit. Clears the active pointer if it pointed at `hash`.
    fn remove_permit(&self, account: &Address, hash: &PermitHash) -> Result<()>;

    /// Drop every permit and the active pointer of `account`.
    fn clear_account(&self, account: &Address) -> Result<()>;
}

/// Conveniences derived from the core repository operations.
pub trait PermitRepositoryExt: PermitRepository {
    /// Resolve the active pointer. `None` when unset or dangling.
    fn get_active_permit(&self, account: &Address) -> Result<Option<Permit>> {
        match self.get_active_permit_hash(account)? {
            Some(hash) => self.get_permit(account, &hash),
            None => Ok(None),
        }
    }
}

impl<T: PermitRepository + ?Sized> PermitRepositoryExt for T {}

/// A string-keyed durable store, as provided by the host environment.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Every key, in ascending order.
    fn keys(&self) -> Result<Vec<String>>;
}
