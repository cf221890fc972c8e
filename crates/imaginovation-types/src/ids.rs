//! Identifiers and value types shared by every component.
//!
//! Addresses are 20 bytes, channel ids and hashlocks are 32-byte hashes.
//! All of them are plain byte arrays so that every party derives the same
//! values from the same public inputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ImaginovationError, Result};

/// Token amounts are unsigned integers in the token's smallest unit.
pub type Amount = u128;

/// Seconds since the UNIX epoch, as read from the call context clock.
pub type Timestamp = u64;

/// SHA-256 over the concatenation of `parts`.
#[must_use]
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address (identity, hub, channel, beneficiary, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    /// Address controlled by an ed25519 verifying key: the last 20 bytes of
    /// `sha256(public_key)`.
    #[must_use]
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self::from_hash_tail(&sha256(&[public_key]))
    }

    /// Takes the trailing 20 bytes of a 32-byte hash.
    #[must_use]
    pub fn from_hash_tail(hash: &[u8; 32]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ImaginovationError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| ImaginovationError::Configuration {
            reason: format!("invalid address {s}: {e}"),
        })?;
        let array: [u8; 20] = bytes.try_into().map_err(|_| ImaginovationError::Configuration {
            reason: format!("address {s} is not 20 bytes"),
        })?;
        Ok(Self(array))
    }
}

// ---------------------------------------------------------------------------
// ChannelId
// ---------------------------------------------------------------------------

/// Key of a provider channel inside a hub: `sha256(identity ‖ hub[ ‖ purpose])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
    /// Regular provider channel of `identity` at `hub`.
    #[must_use]
    pub fn provider(identity: &Address, hub: &Address) -> Self {
        Self(sha256(&[&identity.0, &hub.0]))
    }

    /// Purpose-tagged channel, kept apart from the regular one so promises
    /// issued for it cannot be settled through the regular path.
    #[must_use]
    pub fn with_purpose(identity: &Address, hub: &Address, purpose: &str) -> Self {
        Self(sha256(&[&identity.0, &hub.0, purpose.as_bytes()]))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Preimage / Hashlock
// ---------------------------------------------------------------------------

/// Secret revealed at settlement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Preimage(pub [u8; 32]);

impl Preimage {
    /// The commitment a promise is signed over.
    #[must_use]
    pub fn hashlock(&self) -> Hashlock {
        Hashlock(sha256(&[&self.0]))
    }

    #[cfg(feature = "test-helpers")]
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

/// `sha256(preimage)`, carried inside signed promises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashlock(pub [u8; 32]);

impl fmt::Display for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
