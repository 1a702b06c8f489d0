//! # CoFHE SDK Pipeline
//!
//! Recursive transformation of confidential request and response payloads.
//!
//! ## Overview
//!
//! Outbound: encryptable leaves are extracted in traversal order, packed and
//! proven by the FHE engine, verified by the backend, and replaced in place
//! by the verified handles. Permission markers are replaced by the caller's
//! permission.
//!
//! Inbound: sealed leaves are unsealed with a permit's sealing key and
//! converted to their declared type.
//!
//! ## Key Types
//!
//! - [`Value`] - Closed payload model, converted from and to JSON at the boundary
//! - [`WalkConfig`] - Traversal depth bound
//! - [`FheEngine`] / [`VerifierBackend`] - External collaborators
//! - [`InputPreparer`] - The full outbound round trip

pub mod backend;
pub mod error;
pub mod memory;
pub mod prepare;
pub mod value;
pub mod walk;
pub mod zk;

pub use backend::{
    CiphertextListBuilder, FheEngine, FhePublicKey, ProvenCiphertextList, VerifierBackend,
    VerifyRequest,
};
pub use error::{PipelineError, Result};
pub use prepare::InputPreparer;
pub use value::{
    EncryptableItem, ItemData, Plaintext, Scalar, SealedItem, Value, VerifiedHandle,
    PERMISSION_MARKER,
};
pub use walk::{
    contains_permission_marker, extract_encryptables, replace_encryptables_and_inject_permission,
    unseal_value, WalkConfig, DEFAULT_MAX_DEPTH,
};
pub use zk::{zk_pack, zk_prove};
