//! Supply conservation invariant checker.
//!
//! ```text
//! ∀ asset: Σ(balances) == Σ(minted)
//! ```
//!
//! Transfers and swaps only move value between accounts. If the sum of all
//! balances ever differs from what was minted, value was created or lost.

use std::collections::BTreeMap;

use imaginovation_types::{Amount, ImaginovationError, Result};
use serde::{Deserialize, Serialize};

/// Assets held on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Asset {
    /// The settlement token.
    Token,
    /// The chain's native currency.
    Native,
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token => write!(f, "TOKEN"),
            Self::Native => write!(f, "NATIVE"),
        }
    }
}

/// Tracks per-asset issuance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyConservation {
    minted: BTreeMap<Asset, Amount>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mint(&mut self, asset: Asset, amount: Amount) {
        let entry = self.minted.entry(asset).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Total issued so far.
    #[must_use]
    pub fn expected_supply(&self, asset: Asset) -> Amount {
        self.minted.get(&asset).copied().unwrap_or(0)
    }

    /// Compares the sum of all balances with the expected supply.
    pub fn verify(&self, asset: Asset, actual_supply: Amount) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(ImaginovationError::SupplyInvariantViolation {
                reason: format!(
                    "asset {asset}: actual {actual_supply} != expected {expected}"
                ),
            });
        }
        Ok(())
    }
}
