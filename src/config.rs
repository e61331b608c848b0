//! Pool creation parameters.
//!
//! The sizes used when minting a pool are deployment settings, not per-call
//! choices, so they are grouped here and can be loaded from a JSON file.
//!
//! ```json
//! {
//!   "identifier_length": 9,
//!   "default_rights": 1,
//!   "salt_length": 32,
//!   "share_key_size": 256,
//!   "share_asymmetric_key_size": 256,
//!   "pool_asymmetric_key_size": 256,
//!   "pool_symmetric_key_size": 256
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::PoolError;
use crate::keys;
use crate::model::Rights;

/// Inputs to `PoolHandler::create_pool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolParameters {
    /// Random bytes behind the pool's unique identifier.
    pub identifier_length: usize,
    /// Rights granted to members added later.
    pub default_rights: Rights,
    /// Length of the pool salt in bytes.
    pub salt_length: usize,
    /// Per-share symmetric key size, in bits.
    pub share_key_size: usize,
    /// Asymmetric key size recorded for the owner's share, in bits.
    pub share_asymmetric_key_size: usize,
    /// Pool keypair size, in bits.
    pub pool_asymmetric_key_size: usize,
    /// Pool content key size, in bits.
    pub pool_symmetric_key_size: usize,
}

impl Default for PoolParameters {
    fn default() -> Self {
        Self {
            identifier_length: 9,
            default_rights: 1,
            salt_length: 32,
            share_key_size: 256,
            share_asymmetric_key_size: 256,
            pool_asymmetric_key_size: 256,
            pool_symmetric_key_size: 256,
        }
    }
}

impl PoolParameters {
    /// Parse parameters from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| PoolError::Config(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Read and parse a JSON parameter file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PoolError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Reject anything `create_pool` could not honour, before any key
    /// material is generated.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.identifier_length == 0 {
            return Err(PoolError::InvalidParameter("identifier length is zero".into()));
        }
        if self.salt_length == 0 {
            return Err(PoolError::InvalidParameter("salt length is zero".into()));
        }
        crypto::key_len_for_bits(self.share_key_size)?;
        crypto::key_len_for_bits(self.pool_symmetric_key_size)?;
        keys::check_asymmetric_size(self.share_asymmetric_key_size)?;
        keys::check_asymmetric_size(self.pool_asymmetric_key_size)?;
        Ok(())
    }
}
