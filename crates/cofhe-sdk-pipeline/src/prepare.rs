//! The input preparation round trip.
//!
//! extraction → pack → prove → verify → substitution / injection
//!
//! The steps run strictly in sequence: substitution relies on the backend
//! returning handles in extraction order.

use cofhe_sdk_core::{address_hex, Address};
use cofhe_sdk_permits::Permission;

use crate::backend::{FheEngine, FhePublicKey, VerifierBackend, VerifyRequest};
use crate::error::Result;
use crate::value::{Value, VerifiedHandle};
use crate::walk::{extract_encryptables, replace_encryptables_and_inject_permission, WalkConfig};
use crate::zk::{zk_pack, zk_prove};

/// Everything one preparation needs.
pub struct InputPreparer<'a> {
    pub engine: &'a dyn FheEngine,
    pub verifier: &'a dyn VerifierBackend,
    pub public_key: &'a FhePublicKey,
    pub account: Address,
    pub security_zone: u8,
    pub config: WalkConfig,
}

impl InputPreparer<'_> {
    /// Replace every encryptable leaf of `value` with a verified handle and
    /// every permission marker with `permission`.
    ///
    /// The backend is not called when there is nothing to encrypt.
    pub async fn prepare(&self, value: &Value, permission: Option<&Permission>) -> Result<Value> {
        let items = extract_encryptables(value, &self.config)?;

        let handles: Vec<VerifiedHandle> = if items.is_empty() {
            Vec::new()
        } else {
            let builder = zk_pack(&items, self.engine, self.public_key)?;
            let proven = zk_prove(builder, &self.account, self.security_zone)?;
            let request = VerifyRequest {
                packed_list: proven.to_hex(),
                account: address_hex(&self.account),
                security_zone: self.security_zone,
            };
            self.verifier.verify(&request).await?
        };

        tracing::debug!(
            items = items.len(),
            handles = handles.len(),
            security_zone = self.security_zone,
            "verified encryptable inputs"
        );

        replace_encryptables_and_inject_permission(value, handles, permission, &self.config)
    }
}
