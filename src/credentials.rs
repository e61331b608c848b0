//! Session credentials.
//!
//! A personal private key is never stored in clear. At login it is split
//! into session-bound fragments; a [`CredentialExtractor`] reassembles it on
//! demand. The pool handler only ever calls the extractor and lets the
//! returned buffer drop (and zeroise) as soon as it has been used.

use crate::crypto::{self, SymmetricCipher};
use crate::error::PoolError;
use crate::secret::SecretBytes;

/// Rebuilds a caller's personal private key from session fragments.
///
/// Any failure must be reported as [`PoolError::SessionExpired`] so the
/// caller can send the user back through authentication.
pub trait CredentialExtractor {
    fn extract(
        &self,
        stored_key_part: &[u8],
        session_key: &[u8],
        session_iv: &[u8],
        session_stored_key_part: &[u8],
    ) -> Result<SecretBytes, PoolError>;
}

impl<F> CredentialExtractor for F
where
    F: Fn(&[u8], &[u8], &[u8], &[u8]) -> Result<SecretBytes, PoolError>,
{
    fn extract(
        &self,
        stored_key_part: &[u8],
        session_key: &[u8],
        session_iv: &[u8],
        session_stored_key_part: &[u8],
    ) -> Result<SecretBytes, PoolError> {
        self(stored_key_part, session_key, session_iv, session_stored_key_part)
    }
}

/// The four session-bound fragments a handler is initialized with.
///
/// Each fragment is an owned copy; nothing aliases the caller's buffers.
#[derive(Debug)]
pub struct SessionFragments {
    stored_key_part: SecretBytes,
    session_key: SecretBytes,
    session_iv: SecretBytes,
    session_stored_key_part: SecretBytes,
}

impl SessionFragments {
    pub fn new(
        stored_key_part: &[u8],
        session_key: &[u8],
        session_iv: &[u8],
        session_stored_key_part: &[u8],
    ) -> Self {
        Self {
            stored_key_part: SecretBytes::from_slice(stored_key_part),
            session_key: SecretBytes::from_slice(session_key),
            session_iv: SecretBytes::from_slice(session_iv),
            session_stored_key_part: SecretBytes::from_slice(session_stored_key_part),
        }
    }

    /// The part kept client-side (cookie).
    pub fn stored_key_part(&self) -> &[u8] {
        self.stored_key_part.expose()
    }

    pub fn session_key(&self) -> &[u8] {
        self.session_key.expose()
    }

    pub fn session_iv(&self) -> &[u8] {
        self.session_iv.expose()
    }

    /// The part kept server-side, wrapped under the session key.
    pub fn session_stored_key_part(&self) -> &[u8] {
        self.session_stored_key_part.expose()
    }

    /// Run `extractor` over these fragments.
    pub fn extract_with<X>(&self, extractor: &X) -> Result<SecretBytes, PoolError>
    where
        X: CredentialExtractor + ?Sized,
    {
        extractor.extract(
            self.stored_key_part(),
            self.session_key(),
            self.session_iv(),
            self.session_stored_key_part(),
        )
    }
}

/// Splits a private key into a random pad and a session-wrapped masked copy.
///
/// ```text
/// stored_key_part         = pad
/// session_stored_key_part = AES-GCM(session_key, session_iv, key XOR pad)
/// ```
///
/// Neither half reveals anything about the key on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitKeyExtractor;

impl SplitKeyExtractor {
    /// Issue fresh fragments for `private_key` at login.
    pub fn issue(private_key: &SecretBytes, session_key_bits: usize) -> Result<SessionFragments, PoolError> {
        let pad = crypto::random_secret(private_key.len())?;
        let masked = xor(private_key.expose(), pad.expose());

        let session = SymmetricCipher::generate(session_key_bits)?;
        let wrapped = session.encrypt(masked.expose())?;

        Ok(SessionFragments {
            stored_key_part: pad,
            session_key: SecretBytes::from_slice(session.key().expose()),
            session_iv: SecretBytes::from_slice(session.iv().expose()),
            session_stored_key_part: SecretBytes::new(wrapped),
        })
    }
}

impl CredentialExtractor for SplitKeyExtractor {
    fn extract(
        &self,
        stored_key_part: &[u8],
        session_key: &[u8],
        session_iv: &[u8],
        session_stored_key_part: &[u8],
    ) -> Result<SecretBytes, PoolError> {
        let session = SymmetricCipher::from_parts(
            SecretBytes::from_slice(session_key),
            SecretBytes::from_slice(session_iv),
        )
        .map_err(|_| PoolError::SessionExpired)?;

        let masked = session
            .decrypt(session_stored_key_part)
            .map_err(|_| PoolError::SessionExpired)?;
        if masked.len() != stored_key_part.len() {
            return Err(PoolError::SessionExpired);
        }

        Ok(xor(masked.expose(), stored_key_part))
    }
}

fn xor(a: &[u8], b: &[u8]) -> SecretBytes {
    let mut out = SecretBytes::zeroed(a.len());
    for (o, (x, y)) in out.expose_mut().iter_mut().zip(a.iter().zip(b)) {
        *o = x ^ y;
    }
    out
}
