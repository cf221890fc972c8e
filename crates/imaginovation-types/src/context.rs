//! Per-call context and the beneficiary lookup seam.

use serde::{Deserialize, Serialize};

use crate::{Address, Result, Signature, Timestamp};

/// Who submitted the call and when. Read once per external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    pub now: Timestamp,
}

impl CallContext {
    #[must_use]
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

/// Identity to beneficiary mapping, owned by the registry and consulted by
/// hubs at payout time.
pub trait BeneficiaryBook {
    /// Current payout address of `identity`, if it is registered.
    fn beneficiary_of(&self, identity: &Address) -> Option<Address>;

    /// Applies an identity-signed beneficiary change.
    ///
    /// The signature covers the new beneficiary and `nonce`, which must be
    /// strictly greater than the last nonce used by `identity`.
    fn change_beneficiary(
        &mut self,
        identity: &Address,
        new_beneficiary: Address,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()>;
}
