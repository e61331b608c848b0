//! Persistence collaborator.
//!
//! The handler never writes to a store itself. Each successful operation
//! stages its records in a [`Changeset`], and the caller commits that
//! changeset as one atomic unit. A failed operation stages nothing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::model::{Account, AccountId, Pool, PoolShare, PoolUid};

/// Records produced by one or more handler operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// The pool record, inserted or replaced. Its `version` is the version
    /// it was loaded at (0 for a new pool).
    pub pool: Option<Pool>,
    pub new_shares: Vec<PoolShare>,
    pub updated_shares: Vec<PoolShare>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.pool.is_none() && self.new_shares.is_empty() && self.updated_shares.is_empty()
    }
}

/// Load/commit access to the account, pool and share records.
pub trait PoolStore {
    fn account(&self, id: &str) -> Result<Account, PoolError>;

    fn pool(&self, uid: &str) -> Result<Pool, PoolError>;

    /// The share joining `account_id` and `pool_uid`, if any.
    fn share(&self, account_id: &str, pool_uid: &str) -> Result<Option<PoolShare>, PoolError>;

    fn shares_for_account(&self, account_id: &str) -> Result<Vec<PoolShare>, PoolError>;

    fn participants(&self, pool_uid: &str) -> Result<Vec<PoolShare>, PoolError>;

    /// Apply `changes` entirely or not at all.
    ///
    /// Fails with `PersistenceConflict` when the stored pool moved past the
    /// changeset's base version, and with `AlreadyMember` when a second
    /// share for the same (account, pool) pair would be created.
    fn commit(&mut self, changes: Changeset) -> Result<(), PoolError>;
}

/// An in-memory store. Arenas keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: HashMap<AccountId, Account>,
    pools: HashMap<PoolUid, Pool>,
    shares: BTreeMap<(AccountId, PoolUid), PoolShare>,
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    accounts: Vec<Account>,
    pools: Vec<Pool>,
    shares: Vec<PoolShare>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account.
    pub fn add_account(&mut self, account: Account) -> Result<(), PoolError> {
        if self.accounts.contains_key(&account.id) {
            return Err(PoolError::PersistenceConflict(format!(
                "account {} already exists",
                account.id
            )));
        }
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    /// Serialize every record to JSON.
    pub fn to_json(&self) -> Result<String, PoolError> {
        let snapshot = Snapshot {
            accounts: self.accounts.values().cloned().collect(),
            pools: self.pools.values().cloned().collect(),
            shares: self.shares.values().cloned().collect(),
        };
        serde_json::to_string(&snapshot).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Rebuild a store from [`MemoryStore::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| PoolError::Config(e.to_string()))?;
        Ok(Self {
            accounts: snapshot
                .accounts
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
            pools: snapshot
                .pools
                .into_iter()
                .map(|p| (p.unique_identifier.clone(), p))
                .collect(),
            shares: snapshot
                .shares
                .into_iter()
                .map(|s| ((s.account_id.clone(), s.pool_uid.clone()), s))
                .collect(),
        })
    }

    fn check(&self, changes: &Changeset) -> Result<(), PoolError> {
        if let Some(pool) = &changes.pool {
            if pool.unique_identifier.is_empty() {
                return Err(PoolError::PoolNotFound(String::new()));
            }
            match self.pools.get(&pool.unique_identifier) {
                Some(stored) if stored.version != pool.version => {
                    return Err(PoolError::PersistenceConflict(format!(
                        "pool {} is at version {}, changeset based on {}",
                        pool.unique_identifier, stored.version, pool.version
                    )));
                }
                None if pool.version != 0 => {
                    return Err(PoolError::PoolNotFound(pool.unique_identifier.clone()));
                }
                _ => {}
            }
        }

        let mut staged: Vec<(&str, &str)> = Vec::new();
        for share in &changes.new_shares {
            if !self.accounts.contains_key(&share.account_id) {
                return Err(PoolError::AccountNotFound(share.account_id.clone()));
            }
            let pool_known = self.pools.contains_key(&share.pool_uid)
                || changes
                    .pool
                    .as_ref()
                    .is_some_and(|p| p.unique_identifier == share.pool_uid);
            if !pool_known {
                return Err(PoolError::PoolNotFound(share.pool_uid.clone()));
            }
            let key = (share.account_id.as_str(), share.pool_uid.as_str());
            if staged.contains(&key)
                || self
                    .shares
                    .contains_key(&(share.account_id.clone(), share.pool_uid.clone()))
            {
                return Err(PoolError::AlreadyMember(share.account_id.clone()));
            }
            staged.push(key);
        }

        for share in &changes.updated_shares {
            if !self
                .shares
                .contains_key(&(share.account_id.clone(), share.pool_uid.clone()))
            {
                return Err(PoolError::PersistenceConflict(format!(
                    "share {}/{} does not exist",
                    share.account_id, share.pool_uid
                )));
            }
        }
        Ok(())
    }
}

impl PoolStore for MemoryStore {
    fn account(&self, id: &str) -> Result<Account, PoolError> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| PoolError::AccountNotFound(id.to_string()))
    }

    fn pool(&self, uid: &str) -> Result<Pool, PoolError> {
        self.pools
            .get(uid)
            .cloned()
            .ok_or_else(|| PoolError::PoolNotFound(uid.to_string()))
    }

    fn share(&self, account_id: &str, pool_uid: &str) -> Result<Option<PoolShare>, PoolError> {
        Ok(self
            .shares
            .get(&(account_id.to_string(), pool_uid.to_string()))
            .cloned())
    }

    fn shares_for_account(&self, account_id: &str) -> Result<Vec<PoolShare>, PoolError> {
        Ok(self
            .shares
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    fn participants(&self, pool_uid: &str) -> Result<Vec<PoolShare>, PoolError> {
        if !self.pools.contains_key(pool_uid) {
            return Err(PoolError::PoolNotFound(pool_uid.to_string()));
        }
        Ok(self
            .shares
            .values()
            .filter(|s| s.pool_uid == pool_uid)
            .cloned()
            .collect())
    }

    fn commit(&mut self, changes: Changeset) -> Result<(), PoolError> {
        self.check(&changes)?;

        if let Some(mut pool) = changes.pool {
            pool.version += 1;
            tracing::debug!(pool = %pool.unique_identifier, version = pool.version, "pool committed");
            self.pools.insert(pool.unique_identifier.clone(), pool);
        }
        for share in changes.new_shares.into_iter().chain(changes.updated_shares) {
            self.shares
                .insert((share.account_id.clone(), share.pool_uid.clone()), share);
        }
        Ok(())
    }
}
