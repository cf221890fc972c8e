//! Error types for the Imaginovation payment-channel protocol.
//!
//! All errors use the `IMG_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Signature / replay errors
//! - 2xx: Funds errors
//! - 3xx: Stake errors
//! - 4xx: Hub state / fee errors
//! - 5xx: Authorization errors
//! - 6xx: Registry errors
//! - 9xx: General / internal errors
//!
//! Every error is a synchronous rejection of the triggering call. Callers
//! that go through the `Network` facade never observe partial state.

use thiserror::Error;

use crate::{Address, Amount, HubStatus, Timestamp};

/// Central error enum for all Imaginovation operations.
#[derive(Debug, Error)]
pub enum ImaginovationError {
    // =================================================================
    // Signature / Replay Errors (1xx)
    // =================================================================
    /// The signature did not verify or was produced by the wrong signer.
    #[error("IMG_ERR_100: Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// A nonce-protected action reused or lowered its nonce.
    #[error("IMG_ERR_101: Stale nonce: got {got}, last used {last}")]
    StaleNonce { last: u64, got: u64 },

    /// A `validUntil` deadline has already passed.
    #[error("IMG_ERR_102: Expired: valid until {valid_until}, now {now}")]
    Expired { valid_until: Timestamp, now: Timestamp },

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// Not enough tokens to perform the operation.
    #[error("IMG_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    /// The spender was not approved for enough tokens.
    #[error("IMG_ERR_201: Insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: Amount, approved: Amount },

    /// Amount or fee arguments are inconsistent (zero, fee above amount, ...).
    #[error("IMG_ERR_202: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The promise has nothing left to pay out.
    #[error("IMG_ERR_203: Promise already fully settled: amount {amount}, settled {settled}")]
    PromiseFullySettled { amount: Amount, settled: Amount },

    // =================================================================
    // Stake Errors (3xx)
    // =================================================================
    /// Resulting stake would be below the configured minimum.
    #[error("IMG_ERR_300: Stake {stake} below minimum {min}")]
    BelowMinimumStake { stake: Amount, min: Amount },

    /// Resulting stake would exceed the configured maximum.
    #[error("IMG_ERR_301: Stake {stake} above maximum {max}")]
    AboveMaximumStake { stake: Amount, max: Amount },

    // =================================================================
    // Hub State / Fee Errors (4xx)
    // =================================================================
    /// Operation not permitted in the hub's current status.
    #[error("IMG_ERR_400: Invalid state {status}: {reason}")]
    InvalidState { status: HubStatus, reason: String },

    /// The closing timelock has not expired yet.
    #[error("IMG_ERR_401: Timelock active until {until}, now {now}")]
    TimelockActive { until: Timestamp, now: Timestamp },

    /// Fee above the hard ceiling.
    #[error("IMG_ERR_402: Fee {fee_bps} bps out of range (max {max_bps})")]
    FeeOutOfRange { fee_bps: u16, max_bps: u16 },

    /// A scheduled fee change has not become active yet.
    #[error("IMG_ERR_403: Fee change pending until {valid_from}")]
    FeeChangePending { valid_from: Timestamp },

    // =================================================================
    // Authorization Errors (5xx)
    // =================================================================
    /// Caller lacks the required role.
    #[error("IMG_ERR_500: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The channel identity signed a promise for itself.
    #[error("IMG_ERR_501: Self-signed promise rejected for {0}")]
    SelfSignedPromise(Address),

    // =================================================================
    // Registry Errors (6xx)
    // =================================================================
    /// The identity is already registered with a different beneficiary.
    #[error("IMG_ERR_600: Identity {0} already registered")]
    AlreadyRegistered(Address),

    /// The operator already has a hub under the current implementation version.
    #[error("IMG_ERR_601: Duplicate hub {0}")]
    DuplicateHub(Address),

    /// No hub deployed at this address.
    #[error("IMG_ERR_602: Unknown hub {0}")]
    UnknownHub(Address),

    /// The identity has never been registered.
    #[error("IMG_ERR_603: Unknown identity {0}")]
    UnknownIdentity(Address),

    /// No consumer channel deployed at this address.
    #[error("IMG_ERR_604: Unknown channel {0}")]
    UnknownChannel(Address),

    /// Implementation pointers were zero or unchanged.
    #[error("IMG_ERR_605: Invalid implementation: {reason}")]
    InvalidImplementation { reason: String },

    // =================================================================
    // General Errors (9xx)
    // =================================================================
    /// Configuration is invalid.
    #[error("IMG_ERR_900: Configuration error: {reason}")]
    Configuration { reason: String },

    /// Serialization or deserialization failed.
    #[error("IMG_ERR_901: Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An amount computation overflowed.
    #[error("IMG_ERR_902: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// Ledger balances no longer add up to the issued supply.
    #[error("IMG_ERR_903: Supply invariant violated: {reason}")]
    SupplyInvariantViolation { reason: String },
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ImaginovationError>;
