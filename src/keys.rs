//! Asymmetric keypairs and sealing.
//!
//! This module owns two responsibilities:
//! 1. Holding asymmetric keypairs (personal account keys and pool keys).
//! 2. Sealing short secrets to a public key and opening them again with the
//!    matching private key.
//!
//! ## Key structure
//!
//! A private key is a single 32-byte seed. Two independent sub-keys are
//! derived from it:
//!
//! ```text
//! HKDF-SHA256(ikm = seed, salt = None, info = "cryptopool:x25519")  -> sealing secret
//! HKDF-SHA256(ikm = seed, salt = None, info = "cryptopool:ed25519") -> signing seed
//! ```
//!
//! The public key is `x25519_public (32) || ed25519_public (32)`.
//!
//! ## Seal layout
//!
//! ```text
//! [ ephemeral x25519 public (32) ][ nonce (12) ][ ciphertext + GCM tag ]
//! ```
//!
//! The wrapping key is `HKDF-SHA256(ikm = DH(ephemeral, recipient),
//! salt = ephemeral_public || recipient_public)`.

use ring::hkdf;
use ring::signature::{Ed25519KeyPair, KeyPair as _};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as AgreementPublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::crypto::{self, NONCE_LEN, TAG_LEN};
use crate::error::PoolError;
use crate::secret::SecretBytes;

/// Length of a private key seed in bytes.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of a serialized public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 64;

/// The only supported asymmetric key size, in bits.
pub const ASYMMETRIC_KEY_BITS: usize = 256;

const AGREEMENT_LEN: usize = 32;

/// HKDF info labels.
mod label {
    pub const AGREEMENT: &str = "cryptopool:x25519";
    pub const SIGNING: &str = "cryptopool:ed25519";
    pub const SEAL: &str = "cryptopool:seal";
}

// ---------------------------------------------------------------------------
// Public key
// ---------------------------------------------------------------------------

/// The public half of a keypair. Safe to store and share in clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Parse a serialized public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PoolError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(PoolError::InvalidKey);
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn agreement_key(&self) -> AgreementPublicKey {
        let mut raw = [0u8; AGREEMENT_LEN];
        raw.copy_from_slice(&self.bytes[..AGREEMENT_LEN]);
        AgreementPublicKey::from(raw)
    }

    /// The Ed25519 verification key.
    pub(crate) fn verification_key(&self) -> &[u8] {
        &self.bytes[AGREEMENT_LEN..]
    }
}

impl TryFrom<Vec<u8>> for PublicKey {
    type Error = PoolError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(&bytes)
    }
}

impl From<PublicKey> for Vec<u8> {
    fn from(key: PublicKey) -> Self {
        key.bytes
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An asymmetric keypair.
///
/// - Not `Clone`.
/// - The private seed is a [`SecretBytes`] and is zeroised on drop.
#[derive(Debug)]
pub struct KeyPair {
    private: SecretBytes,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair of the requested size.
    pub fn generate(bits: usize) -> Result<Self, PoolError> {
        check_asymmetric_size(bits)?;
        Self::from_private_key(crypto::random_secret(PRIVATE_KEY_LEN)?)
    }

    /// Rebuild a keypair from its private seed, recomputing the public key.
    pub fn from_private_key(private: SecretBytes) -> Result<Self, PoolError> {
        if private.len() != PRIVATE_KEY_LEN {
            return Err(PoolError::InvalidKey);
        }

        let agreement = agreement_secret(&private)?;
        let signing = signing_pair(&private)?;

        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LEN);
        bytes.extend_from_slice(AgreementPublicKey::from(&agreement).as_bytes());
        bytes.extend_from_slice(signing.public_key().as_ref());

        Ok(Self {
            private,
            public: PublicKey { bytes },
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Borrow the private seed. Used when the key has to be wrapped for
    /// storage; the borrow never outlives the keypair.
    pub fn private_key(&self) -> &SecretBytes {
        &self.private
    }

    /// Give up the keypair, keeping only the private seed.
    pub fn into_private_key(self) -> SecretBytes {
        self.private
    }

    /// Sign `message` with the Ed25519 sub-key.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PoolError> {
        let signing = signing_pair(&self.private)?;
        Ok(signing.sign(message).as_ref().to_vec())
    }

    /// Open a payload produced by [`seal`] for this keypair's public key.
    pub fn open(&self, sealed: &[u8]) -> Result<SecretBytes, PoolError> {
        if sealed.len() < AGREEMENT_LEN + NONCE_LEN + TAG_LEN {
            return Err(PoolError::DecryptionFailure);
        }

        let mut ephemeral_raw = [0u8; AGREEMENT_LEN];
        ephemeral_raw.copy_from_slice(&sealed[..AGREEMENT_LEN]);
        let ephemeral_public = AgreementPublicKey::from(ephemeral_raw);

        let secret = agreement_secret(&self.private)?;
        let shared = secret.diffie_hellman(&ephemeral_public);
        if !shared.was_contributory() {
            return Err(PoolError::DecryptionFailure);
        }

        let wrap = derive_wrap_key(shared.as_bytes(), &ephemeral_raw, self.public.as_bytes())?;
        crypto::decrypt(wrap.expose(), &ephemeral_raw, &sealed[AGREEMENT_LEN..])
    }
}

/// Reject asymmetric key sizes other than [`ASYMMETRIC_KEY_BITS`].
pub fn check_asymmetric_size(bits: usize) -> Result<(), PoolError> {
    if bits != ASYMMETRIC_KEY_BITS {
        return Err(PoolError::InvalidParameter(format!(
            "unsupported asymmetric key size: {} bits",
            bits
        )));
    }
    Ok(())
}

/// Seal `plaintext` so only the holder of `recipient`'s private key can
/// open it. Every call uses a fresh ephemeral key, so two seals of the same
/// plaintext never share bytes.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, PoolError> {
    let ephemeral_seed = crypto::random_secret(AGREEMENT_LEN)?;
    let ephemeral = static_secret(&ephemeral_seed);
    let ephemeral_public = AgreementPublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient.agreement_key());
    if !shared.was_contributory() {
        return Err(PoolError::InvalidKey);
    }

    let wrap = derive_wrap_key(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.as_bytes(),
    )?;
    let body = crypto::encrypt(wrap.expose(), ephemeral_public.as_bytes(), plaintext)?;

    let mut output = Vec::with_capacity(AGREEMENT_LEN + body.len());
    output.extend_from_slice(ephemeral_public.as_bytes());
    output.extend_from_slice(&body);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// One HKDF-SHA256 extract/expand producing 32 bytes.
fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &str) -> Result<SecretBytes, PoolError> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(ikm);
    let info_slices = [info.as_bytes()];
    let okm = prk
        .expand(&info_slices, hkdf::HKDF_SHA256)
        .map_err(|_| PoolError::KeyDerivationFailure)?;

    let mut derived = SecretBytes::zeroed(32);
    okm.fill(derived.expose_mut())
        .map_err(|_| PoolError::KeyDerivationFailure)?;
    Ok(derived)
}

fn static_secret(bytes: &SecretBytes) -> StaticSecret {
    let mut raw = [0u8; AGREEMENT_LEN];
    raw.copy_from_slice(bytes.expose());
    let secret = StaticSecret::from(raw);
    raw.zeroize();
    secret
}

fn agreement_secret(seed: &SecretBytes) -> Result<StaticSecret, PoolError> {
    let derived = hkdf_sha256(seed.expose(), &[], label::AGREEMENT)?;
    Ok(static_secret(&derived))
}

fn signing_pair(seed: &SecretBytes) -> Result<Ed25519KeyPair, PoolError> {
    let derived = hkdf_sha256(seed.expose(), &[], label::SIGNING)?;
    Ed25519KeyPair::from_seed_unchecked(derived.expose()).map_err(|_| PoolError::InvalidKey)
}

fn derive_wrap_key(
    shared: &[u8],
    ephemeral_public: &[u8],
    recipient_public: &[u8],
) -> Result<SecretBytes, PoolError> {
    let mut salt = Vec::with_capacity(ephemeral_public.len() + recipient_public.len());
    salt.extend_from_slice(ephemeral_public);
    salt.extend_from_slice(recipient_public);
    hkdf_sha256(shared, &salt, label::SEAL)
}
