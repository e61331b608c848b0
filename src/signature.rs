//! Pool public key signatures.
//!
//! A pool's public key is signed by the pool's own private key at creation
//! time. The signature covers SHA-256 of the serialized public key and is
//! checked against the Ed25519 half of that same key before the pool
//! keypair is trusted.

use ring::digest::{self, SHA256};
use ring::signature::{UnparsedPublicKey, ED25519};

use crate::error::PoolError;
use crate::keys::{KeyPair, PublicKey};

/// Produce the self-signature over `pair`'s public key.
pub fn sign_public_key(pair: &KeyPair) -> Result<Vec<u8>, PoolError> {
    let hash = digest::digest(&SHA256, pair.public_key().as_bytes());
    pair.sign(hash.as_ref())
}

/// Check a self-signature produced by [`sign_public_key`].
///
/// A modified public key or a modified signature both fail with
/// `DecryptionFailure`.
pub fn verify_public_key(public: &PublicKey, signature: &[u8]) -> Result<(), PoolError> {
    let hash = digest::digest(&SHA256, public.as_bytes());
    UnparsedPublicKey::new(&ED25519, public.verification_key())
        .verify(hash.as_ref(), signature)
        .map_err(|_| PoolError::DecryptionFailure)
}
