//! Constant-product swap pricing.
//!
//! Output for a fixed input, with a 0.3% fee taken from the input:
//!
//! ```text
//! in_with_fee = amount_in * 997
//! amount_out  = in_with_fee * reserve_out / (reserve_in * 1000 + in_with_fee)
//! ```
//!
//! The result is floored. There is no slippage protection beyond the
//! deterministic quote computed from the reserves observed at call time.

use imaginovation_types::{constants, Amount, ImaginovationError, Result};

/// Output amount for swapping `amount_in` against the given reserves.
pub fn get_amount_out(amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> Result<Amount> {
    if amount_in == 0 {
        return Err(ImaginovationError::InvalidAmount {
            reason: "swap input must be positive".into(),
        });
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(ImaginovationError::InsufficientFunds {
            needed: 1,
            available: 0,
        });
    }
    let overflow = || ImaginovationError::ArithmeticOverflow { context: "swap quote" };
    let in_with_fee = amount_in
        .checked_mul(constants::POOL_FEE_NUMERATOR)
        .ok_or_else(overflow)?;
    let numerator = in_with_fee.checked_mul(reserve_out).ok_or_else(overflow)?;
    let denominator = reserve_in
        .checked_mul(constants::POOL_FEE_DENOMINATOR)
        .and_then(|r| r.checked_add(in_with_fee))
        .ok_or_else(overflow)?;
    Ok(numerator / denominator)
}
