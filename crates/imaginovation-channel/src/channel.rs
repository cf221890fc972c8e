//! Consumer channel state and its three operations.

use imaginovation_ledger::{Exchange, TokenLedger};
use imaginovation_types::{
    verify_signer, Address, Amount, CallContext, Domain, ExchangePromise, FastExit,
    ImaginovationError, Preimage, Result, Signature, Timestamp,
};
use serde::{Deserialize, Serialize};

/// The hub a consumer channel pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubLink {
    /// Hub contract address receiving promise payouts.
    pub contract: Address,
    /// Operator whose signature is required on fast exits.
    pub operator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerChannel {
    address: Address,
    identity: Address,
    hub: HubLink,
    chain_id: u64,
    /// Cumulative amount paid to the hub.
    settled: Amount,
    /// Fast exits completed so far; the next exit must be signed over it.
    last_exit_nonce: u64,
}

impl ConsumerChannel {
    #[must_use]
    pub fn new(address: Address, identity: Address, hub: HubLink, chain_id: u64) -> Self {
        Self {
            address,
            identity,
            hub,
            chain_id,
            settled: 0,
            last_exit_nonce: 0,
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn identity(&self) -> Address {
        self.identity
    }

    #[must_use]
    pub fn hub(&self) -> HubLink {
        self.hub
    }

    #[must_use]
    pub fn settled(&self) -> Amount {
        self.settled
    }

    #[must_use]
    pub fn last_exit_nonce(&self) -> u64 {
        self.last_exit_nonce
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        Domain::new(self.chain_id, self.address)
    }

    pub fn balance<L: TokenLedger + ?Sized>(&self, ledger: &L) -> Amount {
        ledger.balance_of(&self.address)
    }

    fn ensure_funded<L: TokenLedger + ?Sized>(&self, ledger: &L, needed: Amount) -> Result<()> {
        let available = self.balance(ledger);
        if available < needed {
            return Err(ImaginovationError::InsufficientFunds { needed, available });
        }
        Ok(())
    }

    /// Pays the unpaid part of an identity-signed promise to the hub, minus
    /// `fee` which goes to the caller. Returns the hub's share.
    pub fn settle_promise<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        amount: Amount,
        fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<Amount> {
        if self.identity == self.hub.operator {
            return Err(ImaginovationError::SelfSignedPromise(self.identity));
        }
        let promise = ExchangePromise {
            channel: self.address,
            amount,
            fee,
            hashlock: preimage.hashlock(),
        };
        verify_signer(&promise, &self.domain(), signature, &self.identity)?;
        if amount <= self.settled {
            return Err(ImaginovationError::PromiseFullySettled {
                amount,
                settled: self.settled,
            });
        }
        let unpaid = amount - self.settled;
        if fee > unpaid {
            return Err(ImaginovationError::InvalidAmount {
                reason: format!("fee {fee} exceeds unpaid amount {unpaid}"),
            });
        }
        self.ensure_funded(&*ledger, unpaid)?;

        let to_hub = unpaid - fee;
        ledger.transfer(&self.address, &ctx.caller, fee)?;
        ledger.transfer(&self.address, &self.hub.contract, to_hub)?;
        self.settled = amount;
        tracing::info!(
            channel = %self.address,
            hub = %self.hub.contract,
            paid = to_hub,
            fee,
            settled = self.settled,
            "Consumer promise settled"
        );
        Ok(to_hub)
    }

    /// Withdraws `amount` to `beneficiary` on signatures from both the
    /// identity and the hub operator over the same exit terms.
    #[allow(clippy::too_many_arguments)]
    pub fn fast_exit<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        amount: Amount,
        fee: Amount,
        beneficiary: Address,
        valid_until: Timestamp,
        identity_signature: &Signature,
        hub_signature: &Signature,
    ) -> Result<Amount> {
        if ctx.now > valid_until {
            return Err(ImaginovationError::Expired {
                valid_until,
                now: ctx.now,
            });
        }
        if amount == 0 || fee > amount {
            return Err(ImaginovationError::InvalidAmount {
                reason: format!("cannot exit {amount} with fee {fee}"),
            });
        }
        let exit = self.exit_terms(amount, fee, beneficiary, valid_until);
        let domain = self.domain();
        verify_signer(&exit, &domain, identity_signature, &self.identity)?;
        verify_signer(&exit, &domain, hub_signature, &self.hub.operator)?;
        self.ensure_funded(&*ledger, amount)?;

        ledger.transfer(&self.address, &ctx.caller, fee)?;
        ledger.transfer(&self.address, &beneficiary, amount - fee)?;
        self.last_exit_nonce += 1;
        tracing::info!(
            channel = %self.address,
            beneficiary = %beneficiary,
            amount,
            fee,
            nonce = exit.nonce,
            "Fast exit completed"
        );
        Ok(amount - fee)
    }

    /// The exit message both parties must sign for the next fast exit.
    #[must_use]
    pub fn exit_terms(
        &self,
        amount: Amount,
        fee: Amount,
        beneficiary: Address,
        valid_until: Timestamp,
    ) -> FastExit {
        FastExit {
            channel: self.address,
            amount,
            fee,
            beneficiary,
            valid_until,
            nonce: self.last_exit_nonce,
        }
    }

    /// Swaps the caller's native currency into tokens held by the channel.
    pub fn deposit_native<L: Exchange + ?Sized>(
        &self,
        ctx: &CallContext,
        ledger: &mut L,
        native_in: Amount,
    ) -> Result<Amount> {
        let tokens = ledger.swap_native_for_tokens(&ctx.caller, &self.address, native_in)?;
        tracing::info!(channel = %self.address, native_in, tokens, "Native deposit converted");
        Ok(tokens)
    }
}
