//! # imaginovation-registry
//!
//! **Registry and network facade**: hub and identity registration,
//! deterministic proxy addresses, and [`Network`], which owns the ledger and
//! the registry and makes every external call atomic.
//!
//! ## Registration flow
//!
//! 1. A funder approves the registry and calls [`Network::register_hub`]
//!    naming the operator key; the hub lands at
//!    [`Registry::predict_hub_address`] for that operator.
//! 2. A consumer funds [`Registry::get_channel_address`] for its
//!    `(identity, hub)` pair before anything is deployed there.
//! 3. The identity signs an [`IdentityRegistration`]; anyone may submit it.
//!    The channel pays the submission fee and forwards the stake to the hub.
//!
//! [`IdentityRegistration`]: imaginovation_types::IdentityRegistration

pub mod addressing;
pub mod clock;
pub mod network;
pub mod registry;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use network::{FastExitRequest, Network, SignedPromise};
pub use registry::{
    HubDeployment, HubRegistration, IdentityBook, IdentityRecord, Implementations, Registry,
};
pub use telemetry::init_tracing;
