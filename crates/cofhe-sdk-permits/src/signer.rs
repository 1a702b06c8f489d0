//! The signer capability.
//!
//! Permits never hold wallet keys. Signing is delegated to a
//! [`TypedDataSigner`], which may implement either of two typed-data signing
//! methods. Wallet adapters differ in which one they provide, so callers go
//! through [`sign_with_capability`], which tries the primary method first and
//! then the legacy one.

use async_trait::async_trait;
use cofhe_sdk_core::{Address, TypedData};

use crate::error::{PermitError, Result};

/// An external wallet able to sign EIP-712 typed data.
///
/// Both signing methods default to "not provided" (`None`). Implementors
/// override whichever their backend supports.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// The account this signer signs for.
    async fn address(&self) -> Result<Address>;

    /// Primary typed-data signing method.
    async fn sign_typed_data(&self, _data: &TypedData) -> Option<Result<String>> {
        None
    }

    /// Legacy typed-data signing method.
    async fn legacy_sign_typed_data(&self, _data: &TypedData) -> Option<Result<String>> {
        None
    }
}

/// Sign `data` with whichever method `signer` provides.
///
/// Returns `UnsupportedSigner` when neither method is provided.
pub async fn sign_with_capability(signer: &dyn TypedDataSigner, data: &TypedData) -> Result<String> {
    if let Some(result) = signer.sign_typed_data(data).await {
        return result;
    }
    if let Some(result) = signer.legacy_sign_typed_data(data).await {
        tracing::debug!(primary_type = %data.primary_type, "signed with legacy typed-data method");
        return result;
    }
    Err(PermitError::UnsupportedSigner)
}

#[cfg(any(test, feature = "testing"))]
pub use local::{LocalSigner, SignerMode};

#[cfg(any(test, feature = "testing"))]
mod local {
    use super::*;
    use cofhe_sdk_core::eip712::address_from_verifying_key;
    use k256::ecdsa::SigningKey;

    /// Which signing methods a [`LocalSigner`] exposes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SignerMode {
        Primary,
        LegacyOnly,
        None,
    }

    /// An in-process secp256k1 wallet.
    #[derive(Clone)]
    pub struct LocalSigner {
        key: SigningKey,
        mode: SignerMode,
    }

    impl LocalSigner {
        /// Deterministic signer from a 32-byte seed.
        ///
        /// Panics if the seed is not a valid secp256k1 scalar.
        pub fn from_seed(seed: [u8; 32]) -> Self {
            let key = SigningKey::from_slice(&seed).expect("seed must be a valid scalar");
            Self {
                key,
                mode: SignerMode::Primary,
            }
        }

        pub fn random() -> Self {
            Self {
                key: SigningKey::random(&mut rand::thread_rng()),
                mode: SignerMode::Primary,
            }
        }

        pub fn with_mode(mut self, mode: SignerMode) -> Self {
            self.mode = mode;
            self
        }

        pub fn account(&self) -> Address {
            address_from_verifying_key(self.key.verifying_key())
        }

        fn sign(&self, data: &TypedData) -> Result<String> {
            let digest = data.signing_hash()?;
            let (sig, recid) = self
                .key
                .sign_prehash_recoverable(digest.as_slice())
                .map_err(|e| PermitError::Signer(e.to_string()))?;
            let mut bytes = sig.to_bytes().to_vec();
            bytes.push(recid.to_byte() + 27);
            Ok(format!("0x{}", hex::encode(bytes)))
        }
    }

    #[async_trait]
    impl TypedDataSigner for LocalSigner {
        async fn address(&self) -> Result<Address> {
            Ok(self.account())
        }

        async fn sign_typed_data(&self, data: &TypedData) -> Option<Result<String>> {
            match self.mode {
                SignerMode::Primary => Some(self.sign(data)),
                _ => None,
            }
        }

        async fn legacy_sign_typed_data(&self, data: &TypedData) -> Option<Result<String>> {
            match self.mode {
                SignerMode::LegacyOnly => Some(self.sign(data)),
                _ => None,
            }
        }
    }
}
