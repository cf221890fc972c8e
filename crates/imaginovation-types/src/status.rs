//! # Hub status state machine
//!
//! ```text
//!             pause / activate
//!   ┌────────┐ ◀─────────────▶ ┌────────┐
//!   │ ACTIVE │                 │ PAUSED │
//!   └─┬──┬───┘                 └──┬──┬──┘
//!     │  │ underfunded settlement │  │
//!     │  └──────────┐  ┌──────────┘  │
//!     │             ▼  ▼             │
//!     │        ┌────────────┐        │
//!     │        │ PUNISHMENT │        │
//!     │        └─────┬──────┘        │
//!     │   resolve    │ (to ACTIVE)   │
//!     │ close                  close │
//!     ▼                              ▼
//!   ┌──────────────────────────────────┐
//!   │              CLOSED              │
//!   └──────────────────────────────────┘
//! ```
//!
//! `CLOSED` is terminal. `PUNISHMENT` can only be left through emergency
//! resolution, which always returns to `ACTIVE`.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HubStatus {
    /// Settling promises and accepting new identity registrations.
    #[default]
    Active,
    /// Owner paused new channel openings. Settlement still works.
    Paused,
    /// A settlement could not be fully honoured. Awaiting emergency resolution.
    Punishment,
    /// Closed by the operator. Only the stake return remains.
    Closed,
}

impl HubStatus {
    /// Can the hub move from this status to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Paused | Self::Punishment | Self::Closed)
                | (Self::Paused, Self::Active | Self::Punishment | Self::Closed)
                | (Self::Punishment, Self::Active)
        )
    }

    /// New identities may only be registered against an active hub.
    #[must_use]
    pub fn accepts_registrations(&self) -> bool {
        *self == Self::Active
    }
}

impl std::fmt::Display for HubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Punishment => write!(f, "PUNISHMENT"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}
