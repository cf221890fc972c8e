//! # imaginovation-ledger
//!
//! The fungible-ledger and swap collaborators the protocol settles against.
//!
//! - [`TokenLedger`]: `transfer`, `transfer_from`, `approve`, `balance_of`
//! - [`Exchange`]: native currency and constant-product swaps
//! - [`Ledger`]: deterministic in-memory implementation of both
//! - [`SupplyConservation`]: `Σ balances == Σ minted` per asset

pub mod ledger;
pub mod pool;
pub mod supply_conservation;

pub use ledger::{Exchange, Ledger, TokenLedger};
pub use pool::get_amount_out;
pub use supply_conservation::{Asset, SupplyConservation};
