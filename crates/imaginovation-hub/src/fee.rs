//! Hub fee schedule with delayed activation.
//!
//! A fee change is stored as the new `current` fee with a `valid_from` in the
//! future; until then the `previous` fee applies. Only one change can be
//! pending at a time.

use imaginovation_types::{constants, Amount, ImaginovationError, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// A fee value in basis points and the instant it starts to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubFee {
    pub value_bps: u16,
    pub valid_from: Timestamp,
}

/// `ceil(amount * bps / 10_000)` without intermediate overflow.
///
/// Rounds up whenever the exact fee has a fractional part, so a nonzero
/// amount never escapes a nonzero fee.
#[must_use]
pub fn fee_for(amount: Amount, bps: u16) -> Amount {
    let bps = Amount::from(bps);
    let whole = amount / constants::BPS_DENOMINATOR * bps;
    let remainder = (amount % constants::BPS_DENOMINATOR * bps).div_ceil(constants::BPS_DENOMINATOR);
    whole.saturating_add(remainder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    current: HubFee,
    previous: HubFee,
}

impl FeeSchedule {
    /// Schedule whose fee is active from `now`.
    #[must_use]
    pub fn new(value_bps: u16, now: Timestamp) -> Self {
        let fee = HubFee {
            value_bps,
            valid_from: now,
        };
        Self {
            current: fee,
            previous: fee,
        }
    }

    #[must_use]
    pub fn current(&self) -> HubFee {
        self.current
    }

    #[must_use]
    pub fn previous(&self) -> HubFee {
        self.previous
    }

    /// The fee in force at `now`.
    #[must_use]
    pub fn active_bps(&self, now: Timestamp) -> u16 {
        if now >= self.current.valid_from {
            self.current.value_bps
        } else {
            self.previous.value_bps
        }
    }

    #[must_use]
    pub fn calculate(&self, amount: Amount, now: Timestamp) -> Amount {
        fee_for(amount, self.active_bps(now))
    }

    /// Validates a change without applying it.
    pub fn check_change(&self, new_bps: u16, now: Timestamp, max_bps: u16) -> Result<()> {
        if new_bps > max_bps {
            return Err(ImaginovationError::FeeOutOfRange {
                fee_bps: new_bps,
                max_bps,
            });
        }
        if self.current.valid_from > now {
            return Err(ImaginovationError::FeeChangePending {
                valid_from: self.current.valid_from,
            });
        }
        Ok(())
    }

    /// Schedules `new_bps` to become active at `now + delay`.
    pub fn schedule(
        &mut self,
        new_bps: u16,
        now: Timestamp,
        delay: u64,
        max_bps: u16,
    ) -> Result<HubFee> {
        self.check_change(new_bps, now, max_bps)?;
        self.previous = self.current;
        self.current = HubFee {
            value_bps: new_bps,
            valid_from: now.saturating_add(delay),
        };
        Ok(self.current)
    }
}
