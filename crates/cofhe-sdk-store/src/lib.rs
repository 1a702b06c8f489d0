//! # CoFHE SDK Store
//!
//! Per-account permit storage with an active-permit pointer.
//!
//! ## Overview
//!
//! The SDK depends on the [`PermitRepository`] trait only. Two
//! implementations are provided:
//!
//! - [`MemoryPermitStore`]: the in-memory default, lost with the session
//! - [`KvPermitStore`]: an adapter over any [`KeyValueStore`], writing
//!   serialized permits under `cofhe_permit_<hash>_<account>`
//!
//! [`SqliteKv`] is a durable [`KeyValueStore`] for hosts without one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe_sdk_store::{KvPermitStore, PermitRepository, SqliteKv};
//!
//! let store = KvPermitStore::new(SqliteKv::open("permits.db").unwrap());
//! // store.set_permit(&account, &permit)?;
//! // store.set_active_permit_hash(&account, &permit.hash())?;
//! ```

pub mod error;
pub mod kv;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use kv::{active_key, permit_key, KvPermitStore, KEY_PREFIX};
pub use memory::{MemoryKv, MemoryPermitStore};
pub use sqlite::SqliteKv;
pub use traits::{KeyValueStore, PermitRepository, PermitRepositoryExt};
