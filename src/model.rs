//! Persisted entities.
//!
//! Entities reference one another through identifiers only. A [`Pool`] owns
//! its message sequence; a [`PoolShare`] is the one join record between an
//! [`Account`] and a [`Pool`], so neither of those two holds the other.
//! Every key, IV and signature field is an opaque byte blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;

/// Identifier of an account.
pub type AccountId = String;

/// URL-safe unique identifier of a pool.
pub type PoolUid = String;

/// Rights level carried by a share.
pub type Rights = i32;

/// Sentinel for full owner rights.
pub const OWNER_RIGHTS: Rights = i32::MAX;

/// A user identity with a personal keypair. Only the public half is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub alias: String,
    pub public_key: PublicKey,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, alias: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
            public_key,
        }
    }
}

/// The clear-text half of a pool's key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// The pool's public key.
    pub public_key: PublicKey,
    /// Signature over `public_key`, made with the pool's private key.
    pub public_key_signature: Vec<u8>,
    /// IV used for all content under the pool's content key.
    pub iv: Vec<u8>,
}

/// A shared content container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Empty until the pool has been created.
    pub unique_identifier: PoolUid,
    pub description: String,
    pub owner: Option<AccountId>,
    pub salt: Vec<u8>,
    /// `None` until the pool has been created.
    pub config: Option<PoolConfig>,
    pub default_rights: Rights,
    pub messages: Vec<Message>,
    /// Optimistic concurrency counter, bumped by the store on every commit.
    pub version: u64,
}

impl Pool {
    /// A blank pool, to be filled in by `PoolHandler::create_pool`.
    pub fn draft(description: impl Into<String>) -> Self {
        Self {
            unique_identifier: PoolUid::new(),
            description: description.into(),
            owner: None,
            salt: Vec::new(),
            config: None,
            default_rights: 0,
            messages: Vec::new(),
            version: 0,
        }
    }

    pub fn is_created(&self) -> bool {
        self.config.is_some()
    }
}

/// Per-share crypto envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Per-share symmetric key, sealed under the member's public key.
    pub key: Vec<u8>,
    /// Per-share IV, sealed under the member's public key.
    pub iv: Vec<u8>,
    /// The pool's private key, encrypted with the per-share key and IV.
    pub private_key: Vec<u8>,
    /// Size of the per-share symmetric key, in bits.
    pub key_size: usize,
    /// Size of the member's asymmetric key, in bits.
    pub asymmetric_key_size: usize,
}

/// Membership of one account in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolShare {
    pub account_id: AccountId,
    pub pool_uid: PoolUid,
    pub rights: Rights,
    pub is_active: bool,
    /// Messages sent at or before this instant are hidden from the member.
    pub show_since: Option<DateTime<Utc>>,
    pub config: ShareConfig,
    /// The pool's content key, sealed under the pool's public key.
    pub pool_key: Vec<u8>,
}

impl PoolShare {
    pub fn is_owner(&self) -> bool {
        self.rights == OWNER_RIGHTS
    }
}

/// An encrypted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: AccountId,
    pub sent: DateTime<Utc>,
    /// Ciphertext under the pool's content cipher.
    pub text: Vec<u8>,
}

/// A message decrypted for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub sender: AccountId,
    pub sent: DateTime<Utc>,
    pub text: String,
}
