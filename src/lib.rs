//! # cryptopool
//!
//! Shared encrypted pools with a per-member key hierarchy.
//!
//! A group of accounts shares one encrypted content stream (a *pool*). The
//! store never sees a plaintext key, new members are added without
//! re-encrypting history, and each member reaches the shared key material
//! only through their own personal keypair.
//!
//! ## Public API
//!
//! [`PoolHandler`] is the entry point: bind an account to a pool, initialize
//! it with the caller's session fragments, then create the pool, add
//! members, derive the content cipher or read the chat. Records it produces
//! are committed through a [`PoolStore`].
//!
//! The surface is kept narrow: key material and raw primitives stay
//! crate-private, and only the types re-exported below (plus the `audit`,
//! `chat`, `signature` and `store` modules) are meant for callers.

// Module declarations.
pub mod audit;
pub mod chat;
pub mod config;
pub mod credentials;
pub(crate) mod crypto;
pub mod error;
pub mod handler;
pub(crate) mod keys;
pub mod model;
pub(crate) mod secret;
pub mod signature;
pub mod store;

pub use config::PoolParameters;
pub use credentials::{CredentialExtractor, SessionFragments, SplitKeyExtractor};
pub use crypto::SymmetricCipher;
pub use error::{ErrorKind, PoolError};
pub use handler::PoolHandler;
pub use keys::{seal, KeyPair, PublicKey};
pub use model::{Account, DecryptedMessage, Message, Pool, PoolShare, OWNER_RIGHTS};
pub use secret::SecretBytes;
pub use store::{Changeset, MemoryStore, PoolStore};

/// Generate a personal keypair for a new account.
///
/// Only the public half belongs in the [`Account`] record. The private half
/// should be split into session fragments with
/// [`SplitKeyExtractor::issue`] (or whatever the deployment uses) and then
/// dropped.
pub fn generate_account_keypair() -> Result<KeyPair, PoolError> {
    KeyPair::generate(keys::ASYMMETRIC_KEY_BITS)
}
