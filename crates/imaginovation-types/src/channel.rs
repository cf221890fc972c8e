//! Provider-channel accounting record and the get-or-create result type.

use serde::{Deserialize, Serialize};

use crate::Amount;

/// Hub-side accounting for one identity (or one purpose-tagged channel).
///
/// `settled` is cumulative and never decreases. `last_used_nonce` guards
/// signed stake decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderChannel {
    pub stake: Amount,
    pub settled: Amount,
    pub last_used_nonce: u64,
}

impl ProviderChannel {
    /// A channel counts as opened once it holds stake or has been paid.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.stake > 0 || self.settled > 0
    }
}

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLookup<T> {
    /// The entity already existed.
    Existing(T),
    /// The entity was created by this call.
    Created(T),
}

impl<T> ChannelLookup<T> {
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Existing(value) | Self::Created(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ChannelLookup<U> {
        match self {
            Self::Existing(value) => ChannelLookup::Existing(f(value)),
            Self::Created(value) => ChannelLookup::Created(f(value)),
        }
    }
}
