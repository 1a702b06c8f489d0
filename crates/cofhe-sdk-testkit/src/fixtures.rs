//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use cofhe_sdk_core::{Address, FheType};
use cofhe_sdk_permits::{LocalSigner, Permit, PermitOptions};
use cofhe_sdk_pipeline::{EncryptableItem, Value};
use cofhe_sdk_store::MemoryPermitStore;

/// Chain id used by fixtures.
pub const TEST_CHAIN_ID: u64 = 31337;

/// Project every fixture permit is scoped to.
pub const TEST_PROJECT: &str = "test-project";

/// A test fixture with a local wallet and a memory store.
pub struct TestFixture {
    pub signer: LocalSigner,
    pub store: MemoryPermitStore,
}

impl TestFixture {
    /// Create a new test fixture with a random wallet.
    pub fn new() -> Self {
        Self {
            signer: LocalSigner::random(),
            store: MemoryPermitStore::new(),
        }
    }

    /// Create with a deterministic wallet from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            signer: LocalSigner::from_seed(seed),
            store: MemoryPermitStore::new(),
        }
    }

    pub fn account(&self) -> Address {
        self.signer.account()
    }

    /// Options for a self permit scoped to [`TEST_PROJECT`].
    pub fn self_options(&self) -> PermitOptions {
        PermitOptions::self_permit(self.account()).with_projects(vec![TEST_PROJECT.into()])
    }

    /// Options for a permit shared with `recipient`.
    pub fn sharing_options(&self, recipient: Address) -> PermitOptions {
        PermitOptions::sharing(self.account(), recipient).with_projects(vec![TEST_PROJECT.into()])
    }

    /// A signed self permit.
    pub async fn self_permit(&self) -> Permit {
        Permit::create_and_sign(self.self_options(), TEST_CHAIN_ID, &self.signer)
            .await
            .expect("self permit signs")
    }

    /// A sharing permit signed by this fixture for `recipient`.
    pub async fn sharing_permit(&self, recipient: Address) -> Permit {
        Permit::create_and_sign(self.sharing_options(recipient), TEST_CHAIN_ID, &self.signer)
            .await
            .expect("sharing permit signs")
    }

    /// Adopt a sharing permit addressed to this fixture.
    pub async fn adopt(&self, sharing: Permit) -> Permit {
        let mut permit = sharing.into_recipient().expect("permit is adoptable");
        permit
            .sign(TEST_CHAIN_ID, &self.signer)
            .await
            .expect("recipient signs");
        permit
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[31] = i as u8 + 1;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// `{a: [enc(bool), "x"], b: {c: enc(uint32 7)}}`
pub fn sample_payload() -> Value {
    Value::keyed([
        (
            "a",
            Value::Sequence(vec![EncryptableItem::bool(true).into(), Value::scalar("x")]),
        ),
        (
            "b",
            Value::keyed([("c", EncryptableItem::uint(FheType::Uint32, "7").into())]),
        ),
    ])
}
