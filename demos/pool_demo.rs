//! Walkthrough: an owner creates a pool, invites a member, both chat.
//!
//! Audit records are appended to a JSON-lines file in the temp directory.
//! Run with: `RUST_LOG=cryptopool=debug cargo run --example pool_demo`

use cryptopool::audit::FileAuditSink;
use cryptopool::{
    generate_account_keypair, Account, MemoryStore, Pool, PoolHandler, PoolParameters,
    SessionFragments, SplitKeyExtractor,
};
use tracing_subscriber::EnvFilter;

fn sign_up(store: &mut MemoryStore, id: &str) -> Result<(Account, SessionFragments), Box<dyn std::error::Error>> {
    let pair = generate_account_keypair()?;
    // The private key only survives as the two halves of a login session.
    let fragments = SplitKeyExtractor::issue(pair.private_key(), 256)?;
    let account = Account::new(id, id, pair.public_key().clone());
    store.add_account(account.clone())?;
    Ok((account, fragments))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut store = MemoryStore::new();
    let (alice, alice_session) = sign_up(&mut store, "alice")?;
    let (bob, bob_session) = sign_up(&mut store, "bob")?;

    let audit_path = std::env::temp_dir().join("cryptopool_audit.jsonl");

    // 1. Alice creates a pool.
    let mut owner = PoolHandler::new(alice.clone(), Pool::draft("demo pool"), &[], SplitKeyExtractor);
    owner.add_audit_sink(Box::new(FileAuditSink::new(&audit_path)?));
    owner.initialize_with(&alice_session)?;
    owner.create_pool(&PoolParameters::default())?;
    owner.commit_to(&mut store)?;
    let uid = owner.pool().unique_identifier.clone();
    println!("Created pool {uid}");

    // 2. She posts, then invites Bob. Bob sees the earlier history too.
    owner.post_message("hello from alice")?;
    owner.add_member(&bob, 256)?;
    owner.commit_to(&mut store)?;
    println!("Added {} to the pool", bob.id);

    // 3. Bob opens the pool from the store and replies.
    let mut member = PoolHandler::open(&store, &bob.id, &uid, SplitKeyExtractor)?;
    member.add_audit_sink(Box::new(FileAuditSink::new(&audit_path)?));
    member.initialize_with(&bob_session)?;
    member.post_message("hi alice, bob here")?;
    member.commit_to(&mut store)?;

    // 4. Either side reads the same conversation.
    let reader = {
        let mut h = PoolHandler::open(&store, &alice.id, &uid, SplitKeyExtractor)?;
        h.initialize_with(&alice_session)?;
        h
    };
    if let Some(messages) = reader.chat(10)? {
        for m in messages {
            println!("[{}] {}: {}", m.sent.format("%H:%M:%S"), m.sender, m.text);
        }
    }

    println!("Audit log written to {}", audit_path.display());
    Ok(())
}
