//! Low-level symmetric cryptography.
//!
//! This module and `keys` are the only places in the crate that import
//! `ring` AEAD or randomness directly. Everything else encrypts through
//! [`SymmetricCipher`] or the seal/open functions in `keys`.
//!
//! Primitive choices:
//! - **Cipher**: AES-128-GCM or AES-256-GCM, selected by key length
//! - **Nonce**: 96-bit, generated fresh per operation via `SystemRandom`
//! - **IV**: 16 bytes, bound into the associated data of every operation,
//!   so a ciphertext only opens under the exact (key, IV) pair that made it

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use crate::error::PoolError;
use crate::secret::SecretBytes;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of an initialization vector in bytes.
pub const IV_LEN: usize = 16;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

fn algorithm_for(key_len: usize) -> Result<&'static aead::Algorithm, PoolError> {
    match key_len {
        16 => Ok(&AES_128_GCM),
        32 => Ok(&AES_256_GCM),
        _ => Err(PoolError::InvalidKey),
    }
}

/// Translate a symmetric key size in bits into a key length in bytes.
pub fn key_len_for_bits(bits: usize) -> Result<usize, PoolError> {
    match bits {
        128 => Ok(16),
        256 => Ok(32),
        other => Err(PoolError::InvalidParameter(format!(
            "unsupported symmetric key size: {} bits",
            other
        ))),
    }
}

/// Fill `buf` from the system CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<(), PoolError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| PoolError::RandomnessFailure)
}

/// Generate `len` public random bytes (identifiers, salts).
pub fn random_bytes(len: usize) -> Result<Vec<u8>, PoolError> {
    let mut buf = vec![0u8; len];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// Generate `len` random bytes destined to be key material.
pub fn random_secret(len: usize) -> Result<SecretBytes, PoolError> {
    let mut secret = SecretBytes::zeroed(len);
    fill_random(secret.expose_mut())?;
    Ok(secret)
}

fn build_key(key_bytes: &[u8]) -> Result<LessSafeKey, PoolError> {
    let unbound =
        UnboundKey::new(algorithm_for(key_bytes.len())?, key_bytes).map_err(|_| PoolError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` with AES-GCM, authenticating `aad` alongside it.
///
/// # Layout of returned bytes
/// ```text
/// [ nonce (12 bytes) ][ ciphertext + GCM tag ]
/// ```
pub fn encrypt(key_bytes: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, PoolError> {
    let key = build_key(key_bytes)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    // Encrypted in place, so until sealing succeeds this buffer is plaintext.
    let mut in_out = plaintext.to_vec();
    if key
        .seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(PoolError::EncryptionFailure);
    }

    let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&in_out);
    Ok(output)
}

/// Decrypt a payload produced by [`encrypt`].
///
/// A wrong key, a wrong `aad` or any modified byte fails the GCM tag check.
/// The caller never receives partial plaintext.
pub fn decrypt(key_bytes: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<SecretBytes, PoolError> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(PoolError::DecryptionFailure);
    }

    let nonce_bytes: [u8; NONCE_LEN] = ciphertext[..NONCE_LEN]
        .try_into()
        .map_err(|_| PoolError::DecryptionFailure)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);
    let key = build_key(key_bytes)?;

    // Owned by a SecretBytes from here on, so it is wiped on every path.
    let mut payload = SecretBytes::from_slice(&ciphertext[NONCE_LEN..]);
    let plaintext_len = key
        .open_in_place(nonce, Aad::from(aad), payload.expose_mut())
        .map_err(|_| PoolError::DecryptionFailure)?
        .len();

    Ok(SecretBytes::from_slice(&payload.expose()[..plaintext_len]))
}

/// A symmetric key together with its IV.
///
/// Used for the per-share envelope (protecting the pool private key) and
/// for pool content (keyed with the content key and the pool-wide IV).
#[derive(Debug)]
pub struct SymmetricCipher {
    key: SecretBytes,
    iv: SecretBytes,
}

impl SymmetricCipher {
    /// Generate a fresh key of `key_bits` and a fresh IV.
    pub fn generate(key_bits: usize) -> Result<Self, PoolError> {
        let key = random_secret(key_len_for_bits(key_bits)?)?;
        let iv = random_secret(IV_LEN)?;
        Ok(Self { key, iv })
    }

    /// Assemble a cipher from an existing key and IV.
    pub fn from_parts(key: SecretBytes, iv: SecretBytes) -> Result<Self, PoolError> {
        algorithm_for(key.len())?;
        if iv.len() != IV_LEN {
            return Err(PoolError::InvalidKey);
        }
        Ok(Self { key, iv })
    }

    pub fn key(&self) -> &SecretBytes {
        &self.key
    }

    pub fn iv(&self) -> &SecretBytes {
        &self.iv
    }

    pub fn key_bits(&self) -> usize {
        self.key.len() * 8
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PoolError> {
        encrypt(self.key.expose(), self.iv.expose(), plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretBytes, PoolError> {
        decrypt(self.key.expose(), self.iv.expose(), ciphertext)
    }

    /// Decrypt a payload and interpret it as UTF-8 text.
    pub fn decrypt_to_string(&self, ciphertext: &[u8]) -> Result<String, PoolError> {
        let plaintext = self.decrypt(ciphertext)?;
        std::str::from_utf8(plaintext.expose())
            .map(str::to_owned)
            .map_err(|_| PoolError::DecryptionFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_roundtrip_both_key_sizes() {
        for bits in [128, 256] {
            let cipher = SymmetricCipher::generate(bits).unwrap();
            assert_eq!(cipher.key_bits(), bits);
            let sealed = cipher.encrypt(b"pool content").unwrap();
            assert_eq!(cipher.decrypt(&sealed).unwrap().expose(), b"pool content");
        }
    }

    #[test]
    fn test_unsupported_key_size_rejected() {
        assert!(matches!(
            SymmetricCipher::generate(192),
            Err(PoolError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_wrong_iv_fails() {
        let cipher = SymmetricCipher::generate(256).unwrap();
        let sealed = cipher.encrypt(b"bound to iv").unwrap();

        let other = SymmetricCipher::from_parts(
            SecretBytes::from_slice(cipher.key().expose()),
            SecretBytes::zeroed(IV_LEN),
        )
        .unwrap();
        assert_eq!(other.decrypt(&sealed), Err(PoolError::DecryptionFailure));
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = SymmetricCipher::generate(256).unwrap();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let cipher = SymmetricCipher::generate(128).unwrap();
        assert_eq!(cipher.decrypt(&[0u8; 8]), Err(PoolError::DecryptionFailure));
    }
}
