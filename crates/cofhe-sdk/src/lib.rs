//! # CoFHE SDK
//!
//! Client-side support for confidential (FHE) smart contracts: permits that
//! authorize sealed outputs, preparation of encrypted inputs, and unsealing
//! of what the network returns.
//!
//! ## Overview
//!
//! - **Permits**: signed, time-bounded authorizations bound to an X25519
//!   sealing key (self, sharing and recipient permits)
//! - **Inputs**: encryptable leaves of a request are packed, proven and
//!   verified, then replaced by verified handles
//! - **Outputs**: sealed leaves of a response are opened with the active
//!   permit's sealing key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cofhe_sdk::pipeline::memory::{MemoryFheEngine, MemoryVerifier};
//! use cofhe_sdk::store::MemoryPermitStore;
//! use cofhe_sdk::{Sdk, SdkConfig, TypedDataSigner};
//!
//! async fn example(wallet: Arc<dyn TypedDataSigner>) {
//!     let sdk = Sdk::new(
//!         SdkConfig::default().with_projects(vec!["my-dapp".into()]),
//!         MemoryPermitStore::new(),
//!         Arc::new(MemoryFheEngine::new()),
//!         Arc::new(MemoryVerifier::new()),
//!     );
//!
//!     // Connect the wallet; creates and activates a self permit.
//!     let permit = sdk.initialize(wallet).await.unwrap();
//!
//!     // let inputs = sdk.prepare_inputs(&value, 0).await.unwrap();
//!     // let clear = sdk.unseal(&response, None, None).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cofhe_sdk::core` - Sealing keys, envelopes, typed-data hashing
//! - `cofhe_sdk::permits` - Permits, signatures and validation
//! - `cofhe_sdk::store` - Permit repositories
//! - `cofhe_sdk::pipeline` - Payload walks and collaborator traits

pub mod config;
pub mod error;
pub mod sdk;

// Re-export component crates
pub use cofhe_sdk_core as core;
pub use cofhe_sdk_permits as permits;
pub use cofhe_sdk_pipeline as pipeline;
pub use cofhe_sdk_store as store;

// Re-export main types for convenience
pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use sdk::{ImportedPermit, Sdk};

// Re-export commonly used component types
pub use cofhe_sdk_core::{Address, FheType, PermitHash, SealingKeyPair, U256};
pub use cofhe_sdk_permits::{
    Permission, Permit, PermitKind, PermitOptions, SerializedPermit, TypedDataSigner,
};
pub use cofhe_sdk_pipeline::{EncryptableItem, SealedItem, Value};
pub use cofhe_sdk_store::{PermitRepository, PermitRepositoryExt};
