//! Repository behavior shared by every `PermitRepository` implementation.

use cofhe_sdk_core::{now_secs, Address};
use cofhe_sdk_permits::{LocalSigner, Permit, PermitOptions};
use cofhe_sdk_store::{
    KvPermitStore, MemoryKv, MemoryPermitStore, PermitRepository, PermitRepositoryExt, SqliteKv,
};
use proptest::prelude::*;

fn self_permit(issuer: Address, project: &str) -> Permit {
    Permit::create(
        PermitOptions::self_permit(issuer)
            .with_projects(vec![project.to_string()])
            .with_expiration(now_secs() + 3600),
    )
    .unwrap()
}

fn exercise(store: &dyn PermitRepository) {
    let account = Address::repeat_byte(0x0a);
    let p = self_permit(account, "alpha");
    let q = self_permit(account, "beta");

    store.set_permit(&account, &p).unwrap();
    store.set_permit(&account, &q).unwrap();
    store.set_active_permit_hash(&account, &q.hash()).unwrap();

    assert_eq!(store.get_permit(&account, &p.hash()).unwrap(), Some(p.clone()));
    assert_eq!(store.get_permits(&account).unwrap().len(), 2);
    assert_eq!(store.get_active_permit(&account).unwrap(), Some(q.clone()));

    store.remove_permit(&account, &q.hash()).unwrap();
    assert_eq!(store.get_permit(&account, &q.hash()).unwrap(), None);
    assert_eq!(store.get_active_permit_hash(&account).unwrap(), None);
    assert_eq!(store.get_active_permit(&account).unwrap(), None);

    store.clear_account(&account).unwrap();
    assert!(store.get_permits(&account).unwrap().is_empty());
}

#[test]
fn test_memory_repository() {
    exercise(&MemoryPermitStore::new());
}

#[test]
fn test_kv_repository_over_memory() {
    exercise(&KvPermitStore::new(MemoryKv::new()));
}

#[test]
fn test_kv_repository_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&KvPermitStore::new(SqliteKv::open(dir.path().join("kv.db")).unwrap()));
}

#[tokio::test]
async fn test_signed_permit_survives_sqlite_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv.db");
    let signer = LocalSigner::from_seed([0x71; 32]);
    let account = signer.account();

    let options = PermitOptions::self_permit(account)
        .with_contracts(vec![Address::repeat_byte(0xc0)])
        .with_expiration(now_secs() + 3600);
    let permit = Permit::create_and_sign(options, 1, &signer).await.unwrap();

    {
        let store = KvPermitStore::new(SqliteKv::open(&path).unwrap());
        store.set_permit(&account, &permit).unwrap();
        store.set_active_permit_hash(&account, &permit.hash()).unwrap();
    }

    let store = KvPermitStore::new(SqliteKv::open(&path).unwrap());
    let loaded = store.get_active_permit(&account).unwrap().unwrap();
    assert_eq!(loaded, permit);
    assert!(loaded.is_valid().valid);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_set_then_get_returns_equivalent(project in "[a-z]{1,12}", seed in 1u8..=255) {
        let account = Address::repeat_byte(seed);
        let permit = self_permit(account, &project);

        for store in [
            Box::new(MemoryPermitStore::new()) as Box<dyn PermitRepository>,
            Box::new(KvPermitStore::new(MemoryKv::new())),
        ] {
            store.set_permit(&account, &permit).unwrap();
            prop_assert_eq!(store.get_permit(&account, &permit.hash()).unwrap(), Some(permit.clone()));
            store.remove_permit(&account, &permit.hash()).unwrap();
            prop_assert_eq!(store.get_permit(&account, &permit.hash()).unwrap(), None);
        }
    }
}
