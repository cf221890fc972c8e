//! # imaginovation-types
//!
//! Shared types, errors, and configuration for the **Imaginovation**
//! payment-channel protocol.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`Address`], [`ChannelId`], [`Preimage`], [`Hashlock`], [`Amount`], [`Timestamp`]
//! - **Signatures**: [`Signature`], [`Wallet`], [`recover_signer`]
//! - **Signed payloads**: [`SignedMessage`], [`Domain`], [`HubPromise`], [`ExchangePromise`], [`FastExit`], ...
//! - **Hub status**: [`HubStatus`]
//! - **Provider channels**: [`ProviderChannel`], [`ChannelLookup`]
//! - **Call context**: [`CallContext`], [`BeneficiaryBook`]
//! - **Configuration**: [`ProtocolConfig`], [`PunishmentConfig`]
//! - **Errors**: [`ImaginovationError`] with `IMG_ERR_` prefix codes
//! - **Constants**: protocol-wide limits and defaults

pub mod channel;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod ids;
pub mod messages;
pub mod signature;
pub mod status;

// Re-export all primary types at crate root for ergonomic imports:
//   use imaginovation_types::{Address, HubPromise, Signature, ...};

pub use channel::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use ids::*;
pub use messages::*;
pub use signature::*;
pub use status::*;

// Constants are accessed via `imaginovation_types::constants::FOO`
// (not re-exported to avoid name collisions).
