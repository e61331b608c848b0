//! Owned secret buffers.
//!
//! Every piece of decrypted key material in the crate (personal private
//! keys, per-share keys and IVs, pool private keys, content keys, session
//! fragments) lives in a [`SecretBytes`]. The buffer is:
//!
//! - Not `Clone`. Copies have to be made explicitly with `from_slice`.
//! - Zeroised on drop, including the spare capacity of the backing `Vec`.
//! - Redacted in `Debug` output.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A heap buffer holding secret bytes.
pub struct SecretBytes {
    bytes: Vec<u8>,
}

impl SecretBytes {
    /// Take ownership of `bytes`. The caller's buffer is moved, not copied,
    /// so no un-zeroised duplicate is left behind.
    pub fn new(bytes: Vec<u8>) -> Self {
        #[cfg(test)]
        tracker::acquire();
        Self { bytes }
    }

    /// Copy `bytes` into a new secret buffer. The source is left untouched
    /// and stays the caller's responsibility.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// An all-zero buffer of `len` bytes, to be filled in place.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    /// Borrow the secret bytes.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn expose_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when every byte of the buffer is zero.
    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl Zeroize for SecretBytes {
    /// Overwrite the contents with zeros, keeping the length.
    fn zeroize(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        #[cfg(test)]
        tracker::release();
        // Wipes the contents and spare capacity, then clears the length.
        self.bytes.zeroize();
    }
}

impl ZeroizeOnDrop for SecretBytes {}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.bytes.len())
    }
}

impl PartialEq for SecretBytes {
    fn eq(&self, other: &Self) -> bool {
        // Constant time in the contents; a length mismatch returns early.
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SecretBytes {}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_zeroize_keeps_length() {
        let mut secret = SecretBytes::new(vec![7u8; 16]);
        assert!(!secret.is_zeroed());
        secret.zeroize();
        assert_eq!(secret.len(), 16);
        assert!(secret.is_zeroed());
    }

    #[test]
    fn test_drop_releases_tracked_buffer() {
        let live_before = tracker::live();
        let released_before = tracker::released();
        {
            let _a = SecretBytes::from_slice(b"first");
            let _b = SecretBytes::zeroed(32);
            assert_eq!(tracker::live(), live_before + 2);
        }
        assert_eq!(tracker::live(), live_before);
        assert_eq!(tracker::released(), released_before + 2);
    }

    #[test]
    fn test_equality_compares_contents_and_length() {
        let a = SecretBytes::from_slice(b"same key bytes");
        let b = SecretBytes::from_slice(b"same key bytes");
        let c = SecretBytes::from_slice(b"same key bytez");
        let shorter = SecretBytes::from_slice(b"same key");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, shorter);
        assert_eq!(SecretBytes::zeroed(0), SecretBytes::new(Vec::new()));
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBytes::from_slice(b"hunter2");
        let shown = format!("{:?}", secret);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("REDACTED"));
    }
}
