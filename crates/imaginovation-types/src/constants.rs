//! System-wide constants for the Imaginovation protocol.

/// Basis-point denominator (100.00%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Hard ceiling for hub fees: 50.00%.
pub const MAX_FEE_BPS: u16 = 5_000;

/// Default delay before a new hub fee becomes active (3 days).
pub const DEFAULT_FEE_ACTIVATION_DELAY_SECS: u64 = 3 * 24 * 3_600;

/// Default closing timelock after a hub is closed (3 days).
pub const DEFAULT_CLOSING_TIMELOCK_SECS: u64 = 3 * 24 * 3_600;

/// Default length of one punishment time unit (1 hour).
pub const DEFAULT_PUNISHMENT_UNIT_SECS: u64 = 3_600;

/// Default penalty per punishment unit, in percent of total stake.
pub const DEFAULT_PUNISHMENT_PERCENT: u128 = 4;

/// Default number of punishment units that pass without penalty.
pub const DEFAULT_PUNISHMENT_GRACE_UNITS: u64 = 0;

/// Default chain id bound into every signed digest.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Purpose tag of the provider channel settled by `payAndSettle`.
pub const WITHDRAWAL_PURPOSE: &str = "withdrawal";

/// Constant-product pool fee numerator (0.3% fee).
pub const POOL_FEE_NUMERATOR: u128 = 997;

/// Constant-product pool fee denominator.
pub const POOL_FEE_DENOMINATOR: u128 = 1_000;

/// First implementation version assigned by a fresh registry.
pub const INITIAL_IMPLEMENTATION_VERSION: u64 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name.
pub const PROTOCOL_NAME: &str = "Imaginovation";
