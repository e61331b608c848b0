//! Shared setup for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use cryptopool::{
    generate_account_keypair, Account, MemoryStore, PoolHandler, PoolParameters, PoolShare,
    PoolStore, SessionFragments, SplitKeyExtractor,
};

/// An account plus the session fragments of its current login.
pub struct Member {
    pub account: Account,
    pub fragments: SessionFragments,
}

/// Create an account, register it and log it in.
pub fn register(store: &mut MemoryStore, id: &str) -> Member {
    let pair = generate_account_keypair().unwrap();
    let fragments = SplitKeyExtractor::issue(pair.private_key(), 256).unwrap();
    let account = Account::new(id, format!("{id}-alias"), pair.public_key().clone());
    store.add_account(account.clone()).unwrap();
    Member { account, fragments }
}

/// Open an initialized handler for `member` on an existing pool.
pub fn handler(store: &MemoryStore, member: &Member, pool_uid: &str) -> PoolHandler<SplitKeyExtractor> {
    let mut handler = PoolHandler::open(store, &member.account.id, pool_uid, SplitKeyExtractor).unwrap();
    handler.initialize_with(&member.fragments).unwrap();
    handler
}

/// Create and commit a pool owned by `owner`. Returns its identifier.
pub fn create_pool(store: &mut MemoryStore, owner: &Member) -> String {
    let mut handler = PoolHandler::new(
        owner.account.clone(),
        cryptopool::Pool::draft("test pool"),
        &[],
        SplitKeyExtractor,
    );
    handler.initialize_with(&owner.fragments).unwrap();
    handler.create_pool(&PoolParameters::default()).unwrap();
    handler.commit_to(store).unwrap();
    handler.pool().unique_identifier.clone()
}

/// Have `inviter` add `target` to the pool and commit.
pub fn add_member(store: &mut MemoryStore, inviter: &Member, target: &Member, pool_uid: &str) -> PoolShare {
    let mut handler = handler(store, inviter, pool_uid);
    let share = handler.add_member(&target.account, 256).unwrap();
    handler.commit_to(store).unwrap();
    share
}

/// Post `texts` as `member`, one minute apart starting at `minute(0)`.
pub fn post_all(store: &mut MemoryStore, member: &Member, pool_uid: &str, texts: &[&str]) {
    let mut handler = handler(store, member, pool_uid);
    for (i, text) in texts.iter().enumerate() {
        handler.post_message_at(text, minute(i as i64)).unwrap();
    }
    handler.commit_to(store).unwrap();
}

/// A fixed instant plus `n` minutes.
pub fn minute(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(n)
}

pub fn stored_share(store: &MemoryStore, member: &Member, pool_uid: &str) -> PoolShare {
    store.share(&member.account.id, pool_uid).unwrap().unwrap()
}
