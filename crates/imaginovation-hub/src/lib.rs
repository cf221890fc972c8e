//! # imaginovation-hub
//!
//! **Hub settlement engine**: provider channels, stake, fee schedule,
//! punishment and closing.
//!
//! ## Status machine
//!
//! - `Active → Punishment` when a settlement cannot be fully honoured
//! - `Punishment → Active` through [`Hub::resolve_emergency`]
//! - `Active ⇄ Paused` by the owner (registrations blocked, settlement open)
//! - `Active | Paused → Closed` by the operator, then a timelocked stake return
//!
//! ## Settlement
//!
//! [`Hub::settle_promise`], [`Hub::settle_with_beneficiary`],
//! [`Hub::settle_into_stake`], [`Hub::pay_and_settle`] and
//! [`Hub::settle_with_dex`] share one payout rule; see [`settlement`].

pub mod fee;
pub mod hub;
pub mod punishment;
pub mod roles;
pub mod settlement;

pub use fee::{fee_for, FeeSchedule, HubFee};
pub use hub::{Hub, HubParams, HubSetup};
pub use punishment::Punishment;
pub use roles::{Capability, Roles};
pub use settlement::SettlementReceipt;
