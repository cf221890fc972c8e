//! Protocol configuration.
//!
//! Every field has a default, so a JSON document only needs to name what it
//! overrides:
//!
//! ```json
//! { "chain_id": 5, "punishment": { "unit_secs": 2 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::{constants, Amount, ImaginovationError, Result};

/// Parameters shared by the registry and every hub it deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Chain id bound into every signed digest.
    pub chain_id: u64,
    /// Delay between `setHubFee` and the new fee becoming active.
    pub fee_activation_delay_secs: u64,
    /// Delay between closing a hub and releasing its stake.
    pub closing_timelock_secs: u64,
    /// Hard ceiling for hub fees in basis points.
    pub max_fee_bps: u16,
    /// Minimal stake a hub must lock at registration.
    pub min_hub_stake: Amount,
    /// Penalty escalation for hubs left in punishment.
    pub punishment: PunishmentConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chain_id: constants::DEFAULT_CHAIN_ID,
            fee_activation_delay_secs: constants::DEFAULT_FEE_ACTIVATION_DELAY_SECS,
            closing_timelock_secs: constants::DEFAULT_CLOSING_TIMELOCK_SECS,
            max_fee_bps: constants::MAX_FEE_BPS,
            min_hub_stake: 0,
            punishment: PunishmentConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no hub could operate under.
    pub fn validate(&self) -> Result<()> {
        if self.max_fee_bps > constants::MAX_FEE_BPS {
            return Err(ImaginovationError::Configuration {
                reason: format!(
                    "max_fee_bps {} exceeds protocol ceiling {}",
                    self.max_fee_bps,
                    constants::MAX_FEE_BPS
                ),
            });
        }
        if self.punishment.unit_secs == 0 {
            return Err(ImaginovationError::Configuration {
                reason: "punishment.unit_secs must be positive".into(),
            });
        }
        if self.punishment.percent_per_unit > 100 {
            return Err(ImaginovationError::Configuration {
                reason: "punishment.percent_per_unit must not exceed 100".into(),
            });
        }
        Ok(())
    }
}

/// Time-escalating penalty for a hub that stays in punishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PunishmentConfig {
    /// Length of one penalty unit in seconds.
    pub unit_secs: u64,
    /// Penalty per unit, percent of the hub's total channel stake.
    pub percent_per_unit: u128,
    /// Units that elapse before the first penalty is charged.
    pub grace_units: u64,
}

impl Default for PunishmentConfig {
    fn default() -> Self {
        Self {
            unit_secs: constants::DEFAULT_PUNISHMENT_UNIT_SECS,
            percent_per_unit: constants::DEFAULT_PUNISHMENT_PERCENT,
            grace_units: constants::DEFAULT_PUNISHMENT_GRACE_UNITS,
        }
    }
}
