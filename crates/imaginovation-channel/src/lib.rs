//! # imaginovation-channel
//!
//! **Consumer channel**: the token account an identity funds to pay one hub.
//!
//! The identity signs cumulative [`ExchangePromise`]s in favour of the hub.
//! Anyone may submit one; the channel pays the unpaid increment to the hub
//! and the submission fee to the caller. Balance the hub never claimed can
//! leave early through a [`FastExit`] both sides signed.
//!
//! [`ExchangePromise`]: imaginovation_types::ExchangePromise
//! [`FastExit`]: imaginovation_types::FastExit

pub mod channel;

pub use channel::{ConsumerChannel, HubLink};
