mod common;

use common::{create_pool, register};
use cryptopool::signature::verify_public_key;
use cryptopool::{MemoryStore, PoolError, PoolHandler, PoolStore, PublicKey, SplitKeyExtractor};

#[test]
fn test_created_pools_carry_valid_self_signature() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");

    for _ in 0..5 {
        let uid = create_pool(&mut store, &alice);
        let config = store.pool(&uid).unwrap().config.unwrap();
        assert!(verify_public_key(&config.public_key, &config.public_key_signature).is_ok());
    }
}

#[test]
fn test_mutated_public_key_fails_verification() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let uid = create_pool(&mut store, &alice);
    let config = store.pool(&uid).unwrap().config.unwrap();

    for index in [0, 40] {
        let mut bytes = config.public_key.as_bytes().to_vec();
        bytes[index] ^= 0x01;
        let mutated = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(
            verify_public_key(&mutated, &config.public_key_signature),
            Err(PoolError::DecryptionFailure)
        );
    }
}

#[test]
fn test_mutated_signature_fails_verification() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let uid = create_pool(&mut store, &alice);
    let config = store.pool(&uid).unwrap().config.unwrap();

    let mut signature = config.public_key_signature.clone();
    signature[10] ^= 0x01;
    assert_eq!(
        verify_public_key(&config.public_key, &signature),
        Err(PoolError::DecryptionFailure)
    );
}

#[test]
fn test_handler_refuses_pool_with_bad_signature() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let uid = create_pool(&mut store, &alice);

    let mut pool = store.pool(&uid).unwrap();
    if let Some(config) = pool.config.as_mut() {
        config.public_key_signature[0] ^= 0xff;
    }
    let share = store.share("alice", &uid).unwrap().unwrap();

    let mut handler = PoolHandler::new(alice.account.clone(), pool, &[share], SplitKeyExtractor);
    handler.initialize_with(&alice.fragments).unwrap();
    assert_eq!(handler.content_cipher().unwrap_err(), PoolError::DecryptionFailure);
}

#[test]
fn test_handler_refuses_substituted_pool_keypair() {
    // A consistent, correctly self-signed keypair that is not the one the
    // share's envelope wraps.
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let real = create_pool(&mut store, &alice);
    let other = create_pool(&mut store, &alice);

    let mut pool = store.pool(&real).unwrap();
    pool.config = store.pool(&other).unwrap().config;
    let share = store.share("alice", &real).unwrap().unwrap();

    let mut handler = PoolHandler::new(alice.account.clone(), pool, &[share], SplitKeyExtractor);
    handler.initialize_with(&alice.fragments).unwrap();
    assert_eq!(handler.content_cipher().unwrap_err(), PoolError::DecryptionFailure);
}
