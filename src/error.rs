//! Error types for cryptopool.
//!
//! Every variant is a distinct failure mode of the pool key hierarchy.
//! Messages are intentionally minimal: they say *what* failed without
//! revealing anything about the key material involved.

use std::fmt;

/// The single error type for all cryptopool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// An operation was invoked before `initialize` ran.
    Uninitialized,

    /// `initialize` was called on a handler that is already initialized.
    AlreadyInitialized,

    /// The credential extractor could not rebuild the personal private key
    /// from the session fragments (stale or mismatched session).
    SessionExpired,

    /// A key or public key had the wrong length or was malformed.
    InvalidKey,

    /// A caller-supplied size or length is not supported.
    InvalidParameter(String),

    /// Encryption failed inside `ring`.
    EncryptionFailure,

    /// An unseal or decrypt step failed: wrong key, corrupted ciphertext,
    /// or a pool signature that does not verify.
    DecryptionFailure,

    /// HKDF expansion failed.
    KeyDerivationFailure,

    /// The system random number generator failed.
    RandomnessFailure,

    /// The bound account has no active share (or not enough rights) for
    /// the bound pool.
    AccessDenied,

    /// No pool with the given unique identifier exists.
    PoolNotFound(String),

    /// No account with the given identifier exists.
    AccountNotFound(String),

    /// The account already holds a share for this pool.
    AlreadyMember(String),

    /// `create_pool` was called on a pool that already has key material.
    PoolAlreadyCreated(String),

    /// The store detected a concurrent write to the same pool.
    PersistenceConflict(String),

    /// Configuration could not be loaded.
    Config(String),
}

/// Coarse classification of [`PoolError`], one entry per remediation a
/// caller can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming error: the handler was not (or doubly) initialized.
    UninitializedState,
    /// Re-authenticate.
    SessionExpired,
    /// Key material is corrupted or tampered with.
    Decryption,
    /// Request access (join flow).
    AuthorizationDenied,
    /// 404.
    NotFound,
    /// Retry against fresh state.
    PersistenceConflict,
    /// Bad input or broken environment.
    Invalid,
}

impl PoolError {
    /// Map the error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Uninitialized | Self::AlreadyInitialized => ErrorKind::UninitializedState,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::DecryptionFailure | Self::InvalidKey => ErrorKind::Decryption,
            Self::AccessDenied | Self::AlreadyMember(_) => ErrorKind::AuthorizationDenied,
            Self::PoolNotFound(_) | Self::AccountNotFound(_) => ErrorKind::NotFound,
            Self::PersistenceConflict(_) | Self::PoolAlreadyCreated(_) => {
                ErrorKind::PersistenceConflict
            }
            Self::InvalidParameter(_)
            | Self::EncryptionFailure
            | Self::KeyDerivationFailure
            | Self::RandomnessFailure
            | Self::Config(_) => ErrorKind::Invalid,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "pool handler must be initialized"),
            Self::AlreadyInitialized => write!(f, "pool handler is already initialized"),
            Self::SessionExpired => write!(f, "session expired"),
            Self::InvalidKey => write!(f, "invalid key"),
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {}", what),
            Self::EncryptionFailure => write!(f, "encryption failed"),
            Self::DecryptionFailure => write!(f, "decryption failed"),
            Self::KeyDerivationFailure => write!(f, "key derivation failed"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::AccessDenied => write!(f, "no access to pool"),
            Self::PoolNotFound(uid) => write!(f, "pool not found: {}", uid),
            Self::AccountNotFound(id) => write!(f, "account not found: {}", id),
            Self::AlreadyMember(id) => write!(f, "account is already part of this pool: {}", id),
            Self::PoolAlreadyCreated(uid) => write!(f, "pool already created: {}", uid),
            Self::PersistenceConflict(reason) => write!(f, "persistence conflict: {}", reason),
            Self::Config(reason) => write!(f, "configuration error: {}", reason),
        }
    }
}

impl std::error::Error for PoolError {}
