//! Owner / operator capabilities.
//!
//! The owner holds custody (withdrawals, stake limits, pausing). The operator
//! signs promises and manages fees and closing. The two are checked
//! independently per operation, and ownership can never move to the operator.

use imaginovation_types::{Address, ImaginovationError, Result};
use serde::{Deserialize, Serialize};

/// Capability an operation requires from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Owner,
    Operator,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Operator => write!(f, "operator"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    owner: Address,
    operator: Address,
}

impl Roles {
    /// The operator starts out as owner too.
    #[must_use]
    pub fn new(operator: Address) -> Self {
        Self {
            owner: operator,
            operator,
        }
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    #[must_use]
    pub fn operator(&self) -> Address {
        self.operator
    }

    /// Fails unless `caller` holds `capability`.
    pub fn authorize(&self, caller: &Address, capability: Capability, action: &str) -> Result<()> {
        let holder = match capability {
            Capability::Owner => self.owner,
            Capability::Operator => self.operator,
        };
        if *caller != holder {
            return Err(ImaginovationError::Unauthorized {
                reason: format!("{action} requires {capability}, caller {caller}"),
            });
        }
        Ok(())
    }

    pub fn check_new_owner(&self, new_owner: &Address) -> Result<()> {
        if *new_owner == self.operator {
            return Err(ImaginovationError::Unauthorized {
                reason: "ownership cannot be transferred to the operator".into(),
            });
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, new_owner: Address) -> Result<()> {
        self.check_new_owner(&new_owner)?;
        self.owner = new_owner;
        Ok(())
    }
}
