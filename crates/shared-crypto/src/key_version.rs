//! # Key Versions
//!
//! Generation counter attached to a signing key. Gateways use it to tell a
//! freshly installed key apart from the one it supersedes.

use crate::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic key generation number. Version 0 is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyVersion(u32);

impl KeyVersion {
    /// Version assigned to a freshly generated key.
    pub const INITIAL: KeyVersion = KeyVersion(1);

    /// Version for a newly created key.
    pub fn initial() -> Self {
        Self::INITIAL
    }

    /// Decode a version from its wire form.
    pub fn decode(raw: u32) -> Result<Self, CryptoError> {
        if raw == 0 {
            return Err(CryptoError::InvalidKeyVersion(raw));
        }
        Ok(Self(raw))
    }

    /// Wire form of this version.
    pub fn encode(&self) -> u32 {
        self.0
    }
}

impl Default for KeyVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
