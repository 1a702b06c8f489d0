//! The Sdk: one session of a connected account.
//!
//! The Sdk brings together permits, storage and the payload pipeline. It is
//! initialized once with the account's wallet, after which it creates and
//! imports permits, prepares confidential inputs and unseals outputs on that
//! account's behalf.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cofhe_sdk_core::{address_hex, now_secs, Address, PermitHash, U256};
use cofhe_sdk_permits::{
    validation, Permission, Permit, PermitError, PermitKind, PermitOptions, SerializedPermit,
    TypedDataSigner,
};
use cofhe_sdk_pipeline::{
    contains_permission_marker, unseal_value, FheEngine, FhePublicKey, InputPreparer,
    PipelineError, Value, VerifierBackend,
};
use cofhe_sdk_store::{PermitRepository, PermitRepositoryExt};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

/// A permit handed to [`Sdk::import_permit`].
#[derive(Debug, Clone)]
pub enum ImportedPermit {
    /// The serialized permit as JSON text.
    Json(String),
    Serialized(SerializedPermit),
}

impl From<&str> for ImportedPermit {
    fn from(json: &str) -> Self {
        ImportedPermit::Json(json.to_string())
    }
}

impl From<String> for ImportedPermit {
    fn from(json: String) -> Self {
        ImportedPermit::Json(json)
    }
}

impl From<SerializedPermit> for ImportedPermit {
    fn from(serialized: SerializedPermit) -> Self {
        ImportedPermit::Serialized(serialized)
    }
}

/// State recorded by [`Sdk::initialize`].
#[derive(Default)]
struct Session {
    account: Option<Address>,
    signer: Option<Arc<dyn TypedDataSigner>>,
    fhe_keys: HashMap<u8, FhePublicKey>,
}

/// What an initialized session hands to an operation.
struct Ready {
    account: Address,
    signer: Arc<dyn TypedDataSigner>,
}

/// The main Sdk struct.
///
/// Provides a unified API for:
/// - Creating, importing and selecting permits
/// - Preparing confidential inputs
/// - Unsealing sealed outputs
pub struct Sdk<R: PermitRepository> {
    config: SdkConfig,
    /// Permit storage, shared with the host.
    store: Arc<R>,
    engine: Arc<dyn FheEngine>,
    verifier: Arc<dyn VerifierBackend>,
    session: RwLock<Session>,
}

impl<R: PermitRepository> Sdk<R> {
    /// Create a new, uninitialized session.
    pub fn new(
        config: SdkConfig,
        store: R,
        engine: Arc<dyn FheEngine>,
        verifier: Arc<dyn VerifierBackend>,
    ) -> Self {
        Self {
            config,
            store: Arc::new(store),
            engine,
            verifier,
            session: RwLock::new(Session::default()),
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &R {
        &self.store
    }

    /// The connected account, once initialized.
    pub async fn account(&self) -> Option<Address> {
        self.session.read().await.account
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect `signer`'s account and fetch the network FHE key of every
    /// configured security zone.
    ///
    /// When `generate_permit` is set, returns the account's active permit,
    /// creating and activating a self permit if there is none.
    pub async fn initialize(&self, signer: Arc<dyn TypedDataSigner>) -> Result<Option<Permit>> {
        self.config.validate()?;
        let account = signer.address().await?;

        let mut fhe_keys = HashMap::new();
        for &zone in &self.config.security_zones {
            let bytes = self.verifier.network_public_key(zone).await?;
            let key = self.engine.deserialize_public_key(&bytes)?;
            tracing::debug!(security_zone = zone, bytes = bytes.len(), "fetched network FHE key");
            fhe_keys.insert(zone, key);
        }

        *self.session.write().await = Session {
            account: Some(account),
            signer: Some(signer),
            fhe_keys,
        };
        tracing::debug!(account = %address_hex(&account), "sdk initialized");

        if !self.config.generate_permit {
            return Ok(None);
        }
        if let Some(permit) = self.store.get_active_permit(&account)? {
            return Ok(Some(permit));
        }
        self.create_permit(None).await.map(Some)
    }

    async fn ready(&self) -> Result<Ready> {
        let session = self.session.read().await;
        match (session.account, &session.signer) {
            (Some(account), Some(signer)) if !session.fhe_keys.is_empty() => Ok(Ready {
                account,
                signer: Arc::clone(signer),
            }),
            _ => Err(SdkError::NotInitialized(
                "no connected account; call initialize first".into(),
            )),
        }
    }

    async fn fhe_key(&self, security_zone: u8) -> Result<FhePublicKey> {
        self.session
            .read()
            .await
            .fhe_keys
            .get(&security_zone)
            .cloned()
            .ok_or_else(|| {
                SdkError::NotInitialized(format!(
                    "no network FHE key for security zone {}",
                    security_zone
                ))
            })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permits
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a permit, sign it with the connected wallet, store it and make
    /// it active.
    ///
    /// Without options a self permit for the connected account is created.
    /// Empty contract and project lists are filled from the configuration.
    pub async fn create_permit(&self, options: Option<PermitOptions>) -> Result<Permit> {
        let ready = self.ready().await?;
        let mut options = options.unwrap_or_else(|| PermitOptions::self_permit(ready.account));
        if options.contracts.is_empty() {
            options.contracts = self.config.contracts.clone();
        }
        if options.projects.is_empty() {
            options.projects = self.config.projects.clone();
        }
        if options.expiration.is_none() {
            options.expiration = Some(now_secs() + self.config.permit_ttl.as_secs());
        }

        let permit =
            Permit::create_and_sign(options, self.config.chain_id, ready.signer.as_ref()).await?;
        self.activate(&ready.account, &permit)?;

        tracing::debug!(kind = %permit.kind, hash = %permit.hash(), "created permit");
        Ok(permit)
    }

    /// Import an existing permit, store it and make it active.
    ///
    /// Non-self permits are re-typed by the connected account's role: the
    /// issuer holds a sharing permit, the recipient a recipient permit. A
    /// permit addressed to the account that the account has not signed yet
    /// is adopted with a fresh sealing key and signed. The result must pass
    /// trust validation.
    pub async fn import_permit(&self, imported: impl Into<ImportedPermit>) -> Result<Permit> {
        let ready = self.ready().await?;
        let mut permit = match imported.into() {
            ImportedPermit::Json(json) => Permit::from_json(&json)?,
            ImportedPermit::Serialized(serialized) => Permit::from_serialized(&serialized)?,
        };

        if permit.kind != PermitKind::SelfIssued {
            if permit.issuer == ready.account {
                permit.kind = PermitKind::Sharing;
            } else if permit.recipient == ready.account {
                if permit.recipient_signature.is_some() {
                    permit.kind = PermitKind::Recipient;
                } else {
                    permit.kind = PermitKind::Sharing;
                    permit = permit.into_recipient()?;
                    permit
                        .sign(self.config.chain_id, ready.signer.as_ref())
                        .await?;
                }
            } else {
                return Err(PermitError::InvalidTransition(format!(
                    "connected account {} is not issuer or recipient",
                    address_hex(&ready.account)
                ))
                .into());
            }
            validation::check_shape(&permit)
                .into_result()
                .map_err(PermitError::from)?;
        }

        permit.is_valid().into_result()?;
        self.activate(&ready.account, &permit)?;

        tracing::debug!(kind = %permit.kind, hash = %permit.hash(), "imported permit");
        Ok(permit)
    }

    fn activate(&self, account: &Address, permit: &Permit) -> Result<()> {
        self.store.set_permit(account, permit)?;
        self.store.set_active_permit_hash(account, &permit.hash())?;
        Ok(())
    }

    /// Make a stored permit the active one.
    pub async fn select_active_permit(&self, hash: &PermitHash) -> Result<Permit> {
        let ready = self.ready().await?;
        let permit = self
            .store
            .get_permit(&ready.account, hash)?
            .ok_or_else(|| SdkError::NotFound(format!("permit with hash {}", hash)))?;
        self.store.set_active_permit_hash(&ready.account, hash)?;

        tracing::debug!(%hash, "selected active permit");
        Ok(permit)
    }

    /// A stored permit by hash, or the active permit when `hash` is `None`.
    pub async fn get_permit(&self, hash: Option<&PermitHash>) -> Result<Permit> {
        let ready = self.ready().await?;
        self.lookup(&ready.account, hash)
    }

    fn lookup(&self, account: &Address, hash: Option<&PermitHash>) -> Result<Permit> {
        match hash {
            Some(hash) => self
                .store
                .get_permit(account, hash)?
                .ok_or_else(|| SdkError::NotFound(format!("permit with hash {}", hash))),
            None => self
                .store
                .get_active_permit(account)?
                .ok_or_else(|| SdkError::NotFound("active permit".into())),
        }
    }

    /// The permission of [`Sdk::get_permit`]'s result.
    pub async fn get_permission(&self, hash: Option<&PermitHash>) -> Result<Permission> {
        Ok(self.get_permit(hash).await?.permission())
    }

    /// Every permit stored for the connected account.
    pub async fn get_all_permits(&self) -> Result<BTreeMap<PermitHash, Permit>> {
        let ready = self.ready().await?;
        Ok(self.store.get_permits(&ready.account)?)
    }

    /// Delete a stored permit. Removing the active permit leaves no permit
    /// active.
    pub async fn remove_permit(&self, hash: &PermitHash) -> Result<()> {
        let ready = self.ready().await?;
        if self.store.get_permit(&ready.account, hash)?.is_none() {
            return Err(SdkError::NotFound(format!("permit with hash {}", hash)));
        }
        self.store.remove_permit(&ready.account, hash)?;

        tracing::debug!(%hash, "removed permit");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inputs
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt every encryptable leaf of `value` under the network key of
    /// `security_zone`, replace it with its verified handle, and replace
    /// every permission marker with the active permit's permission.
    ///
    /// The active permit is only consulted when `value` holds a marker.
    pub async fn prepare_inputs(&self, value: &Value, security_zone: u8) -> Result<Value> {
        let ready = self.ready().await?;
        let public_key = self.fhe_key(security_zone).await?;
        let walk = self.config.walk();

        let permission = if contains_permission_marker(value, &walk)? {
            let permit = self
                .store
                .get_active_permit(&ready.account)?
                .ok_or(SdkError::Pipeline(PipelineError::MissingPermission))?;
            Some(permit.permission())
        } else {
            None
        };

        let preparer = InputPreparer {
            engine: self.engine.as_ref(),
            verifier: self.verifier.as_ref(),
            public_key: &public_key,
            account: ready.account,
            security_zone,
            config: walk,
        };
        Ok(preparer.prepare(value, permission.as_ref()).await?)
    }

    /// [`Sdk::prepare_inputs`] over JSON.
    pub async fn prepare_inputs_json(&self, json: &JsonValue, security_zone: u8) -> Result<JsonValue> {
        let value = Value::from_json(json, self.config.max_depth)?;
        let prepared = self.prepare_inputs(&value, security_zone).await?;
        Ok(prepared.to_json()?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outputs
    // ─────────────────────────────────────────────────────────────────────────

    async fn resolve(&self, account: Option<Address>, hash: Option<&PermitHash>) -> Result<Permit> {
        let ready = self.ready().await?;
        self.lookup(&account.unwrap_or(ready.account), hash)
    }

    /// Unseal one ciphertext with a stored permit's sealing key.
    ///
    /// `account` defaults to the connected account, `hash` to its active
    /// permit.
    pub async fn unseal_ciphertext(
        &self,
        ciphertext: impl AsRef<[u8]>,
        account: Option<Address>,
        hash: Option<&PermitHash>,
    ) -> Result<U256> {
        let permit = self.resolve(account, hash).await?;
        Ok(permit.unseal_ciphertext(ciphertext)?)
    }

    /// Unseal every sealed leaf of `value`. Permit resolution follows
    /// [`Sdk::unseal_ciphertext`].
    pub async fn unseal(
        &self,
        value: &Value,
        account: Option<Address>,
        hash: Option<&PermitHash>,
    ) -> Result<Value> {
        let permit = self.resolve(account, hash).await?;
        Ok(unseal_value(value, &permit.sealing_pair, &self.config.walk())?)
    }

    /// [`Sdk::unseal`] over JSON.
    pub async fn unseal_json(
        &self,
        json: &JsonValue,
        account: Option<Address>,
        hash: Option<&PermitHash>,
    ) -> Result<JsonValue> {
        let value = Value::from_json(json, self.config.max_depth)?;
        let unsealed = self.unseal(&value, account, hash).await?;
        Ok(unsealed.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cofhe_sdk_permits::{LocalSigner, SignerMode};
    use cofhe_sdk_pipeline::memory::{MemoryFheEngine, MemoryVerifier};
    use cofhe_sdk_store::MemoryPermitStore;

    fn session(config: SdkConfig) -> Sdk<MemoryPermitStore> {
        Sdk::new(
            config.with_projects(vec!["unit".into()]),
            MemoryPermitStore::new(),
            Arc::new(MemoryFheEngine::new()),
            Arc::new(MemoryVerifier::new()),
        )
    }

    #[tokio::test]
    async fn test_operations_require_initialize() {
        let sdk = session(SdkConfig::default());
        assert!(matches!(
            sdk.create_permit(None).await,
            Err(SdkError::NotInitialized(_))
        ));
        assert!(matches!(sdk.get_permit(None).await, Err(SdkError::NotInitialized(_))));
        assert!(matches!(
            sdk.prepare_inputs(&Value::scalar("x"), 0).await,
            Err(SdkError::NotInitialized(_))
        ));
        assert!(sdk.account().await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_generates_then_reuses_permit() {
        let sdk = session(SdkConfig::default());
        let signer = Arc::new(LocalSigner::random());

        let first = sdk.initialize(signer.clone()).await.unwrap().unwrap();
        assert_eq!(first.kind, PermitKind::SelfIssued);
        assert_eq!(first.projects, vec!["unit".to_string()]);
        assert_eq!(sdk.account().await, Some(signer.account()));

        let second = sdk.initialize(signer).await.unwrap().unwrap();
        assert_eq!(first.hash(), second.hash());
        assert_eq!(sdk.get_all_permits().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_without_generation() {
        let sdk = session(SdkConfig::default().with_generate_permit(false));
        assert!(sdk
            .initialize(Arc::new(LocalSigner::random()))
            .await
            .unwrap()
            .is_none());
        assert!(matches!(sdk.get_permit(None).await, Err(SdkError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_config_and_signer() {
        let sdk = session(SdkConfig::default().with_security_zones(vec![]));
        assert!(matches!(
            sdk.initialize(Arc::new(LocalSigner::random())).await,
            Err(SdkError::InvalidConfig(_))
        ));

        // No key served for zone 7.
        let sdk = session(SdkConfig::default().with_security_zones(vec![0, 7]));
        assert!(matches!(
            sdk.initialize(Arc::new(LocalSigner::random())).await,
            Err(SdkError::Pipeline(PipelineError::Backend(_)))
        ));

        let sdk = session(SdkConfig::default());
        let mute = LocalSigner::random().with_mode(SignerMode::None);
        assert!(matches!(
            sdk.initialize(Arc::new(mute)).await,
            Err(SdkError::Permit(PermitError::UnsupportedSigner))
        ));
    }

    #[tokio::test]
    async fn test_select_and_remove() {
        let sdk = session(SdkConfig::default());
        let first = sdk
            .initialize(Arc::new(LocalSigner::random()))
            .await
            .unwrap()
            .unwrap();
        let second = sdk
            .create_permit(Some(
                PermitOptions::self_permit(sdk.account().await.unwrap())
                    .with_name("second")
                    .with_expiration(first.expiration + 1),
            ))
            .await
            .unwrap();
        assert_ne!(first.hash(), second.hash());
        assert_eq!(sdk.get_all_permits().await.unwrap().len(), 2);
        assert_eq!(sdk.get_permit(None).await.unwrap().hash(), second.hash());

        sdk.select_active_permit(&first.hash()).await.unwrap();
        assert_eq!(sdk.get_permit(None).await.unwrap().hash(), first.hash());
        assert_eq!(
            sdk.get_permission(Some(&second.hash())).await.unwrap(),
            second.permission()
        );

        let unknown = PermitHash::from_bytes([0xab; 32]);
        assert!(matches!(
            sdk.select_active_permit(&unknown).await,
            Err(SdkError::NotFound(_))
        ));

        sdk.remove_permit(&first.hash()).await.unwrap();
        assert!(matches!(sdk.get_permit(None).await, Err(SdkError::NotFound(_))));
        assert!(matches!(
            sdk.remove_permit(&first.hash()).await,
            Err(SdkError::NotFound(_))
        ));
        assert_eq!(sdk.get_all_permits().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_marker_requires_active_permit() {
        let sdk = session(SdkConfig::default().with_generate_permit(false));
        sdk.initialize(Arc::new(LocalSigner::random())).await.unwrap();

        let err = sdk
            .prepare_inputs(&Value::PermissionMarker, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Pipeline(PipelineError::MissingPermission)));

        // Without a marker no permit is needed.
        let plain = Value::keyed([("a", Value::scalar(1u64))]);
        assert_eq!(sdk.prepare_inputs(&plain, 0).await.unwrap(), plain);
        assert!(matches!(
            sdk.prepare_inputs(&plain, 5).await,
            Err(SdkError::NotInitialized(_))
        ));
    }
}
