//! Punishment reserve and time-escalating penalty.

use imaginovation_types::{Amount, ImaginovationError, PunishmentConfig, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// Tokens reserved as penalty and when the current punishment started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Punishment {
    pub amount: Amount,
    pub activated_at: Timestamp,
}

/// Penalty owed when resolving a punishment that started at `activated_at`.
///
/// Every full unit after the grace units costs `percent_per_unit` of the
/// total channel stake, rounded up.
pub fn penalty(
    config: &PunishmentConfig,
    total_stake: Amount,
    activated_at: Timestamp,
    now: Timestamp,
) -> Result<Amount> {
    let unit_secs = config.unit_secs.max(1);
    let units = now.saturating_sub(activated_at) / unit_secs;
    let charged = Amount::from(units.saturating_sub(config.grace_units));
    let per_unit = total_stake
        .checked_mul(config.percent_per_unit)
        .ok_or(ImaginovationError::ArithmeticOverflow { context: "punishment rate" })?
        .div_ceil(100);
    per_unit
        .checked_mul(charged)
        .ok_or(ImaginovationError::ArithmeticOverflow { context: "punishment penalty" })
}
