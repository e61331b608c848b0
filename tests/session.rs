mod common;

use common::{create_pool, register};
use cryptopool::{
    generate_account_keypair, ErrorKind, MemoryStore, PoolError, PoolHandler, SplitKeyExtractor,
};

#[test]
fn test_stale_session_is_reported_as_expired() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let uid = create_pool(&mut store, &alice);

    // Client cookie from one login, server-side session from another.
    let other = generate_account_keypair().unwrap();
    let stale = SplitKeyExtractor::issue(other.private_key(), 256).unwrap();

    let mut handler = PoolHandler::open(&store, "alice", &uid, SplitKeyExtractor).unwrap();
    handler
        .initialize(
            alice.fragments.stored_key_part(),
            stale.session_key(),
            stale.session_iv(),
            alice.fragments.session_stored_key_part(),
        )
        .unwrap();

    let err = handler.content_cipher().unwrap_err();
    assert_eq!(err, PoolError::SessionExpired);
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
}

#[test]
fn test_fragments_of_another_account_fail_decryption() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let bob = register(&mut store, "bob");
    let uid = create_pool(&mut store, &alice);

    let mut handler = PoolHandler::open(&store, "alice", &uid, SplitKeyExtractor).unwrap();
    handler.initialize_with(&bob.fragments).unwrap();

    assert_eq!(handler.content_cipher().unwrap_err(), PoolError::DecryptionFailure);
    assert_eq!(
        handler.add_member(&bob.account, 256).unwrap_err(),
        PoolError::DecryptionFailure
    );
    assert!(handler.pending_changes().is_empty());
}

#[test]
fn test_remediations_are_distinct() {
    let kinds = [
        PoolError::SessionExpired.kind(),
        PoolError::AccessDenied.kind(),
        PoolError::PoolNotFound("x".into()).kind(),
        PoolError::DecryptionFailure.kind(),
        PoolError::Uninitialized.kind(),
        PoolError::PersistenceConflict("x".into()).kind(),
    ];
    for (i, a) in kinds.iter().enumerate() {
        for b in &kinds[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_open_unknown_pool_and_account() {
    let mut store = MemoryStore::new();
    let alice = register(&mut store, "alice");
    let uid = create_pool(&mut store, &alice);

    let err = PoolHandler::open(&store, "alice", "no-such-pool", SplitKeyExtractor).unwrap_err();
    assert_eq!(err, PoolError::PoolNotFound("no-such-pool".into()));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = PoolHandler::open(&store, "nobody", &uid, SplitKeyExtractor).unwrap_err();
    assert_eq!(err, PoolError::AccountNotFound("nobody".into()));
}
