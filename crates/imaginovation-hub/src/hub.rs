//! The hub: provider-channel accounting, stake, fees, punishment and closing.
//!
//! Every mutating operation validates all preconditions and checks balances
//! before it touches hub state or the ledger, so a rejected call leaves both
//! unchanged.

use std::collections::BTreeMap;

use imaginovation_ledger::TokenLedger;
use imaginovation_types::{
    Address, Amount, BeneficiaryBook, CallContext, ChannelId, ChannelLookup, Domain, HubStatus,
    ImaginovationError, ProtocolConfig, ProviderChannel, PunishmentConfig, Result, Signature,
    StakeReturn, Timestamp, verify_signer,
};

use crate::fee::{FeeSchedule, HubFee};
use crate::punishment::{self, Punishment};
use crate::roles::{Capability, Roles};

/// Protocol parameters a hub is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubParams {
    pub chain_id: u64,
    pub fee_activation_delay_secs: u64,
    pub closing_timelock_secs: u64,
    pub max_fee_bps: u16,
    pub punishment: PunishmentConfig,
}

impl From<&ProtocolConfig> for HubParams {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            fee_activation_delay_secs: config.fee_activation_delay_secs,
            closing_timelock_secs: config.closing_timelock_secs,
            max_fee_bps: config.max_fee_bps,
            punishment: config.punishment,
        }
    }
}

/// Registration arguments of a new hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSetup {
    pub address: Address,
    pub operator: Address,
    /// The hub's own stake locked at registration.
    pub hub_stake: Amount,
    pub fee_bps: u16,
    pub min_stake: Amount,
    pub max_stake: Amount,
}

#[derive(Debug, Clone)]
pub struct Hub {
    pub(crate) address: Address,
    pub(crate) roles: Roles,
    pub(crate) status: HubStatus,
    pub(crate) hub_stake: Amount,
    pub(crate) total_stake: Amount,
    pub(crate) min_stake: Amount,
    pub(crate) max_stake: Amount,
    pub(crate) fees: FeeSchedule,
    pub(crate) punishment: Punishment,
    pub(crate) closing_timelock_end: Option<Timestamp>,
    pub(crate) channels: BTreeMap<ChannelId, ProviderChannel>,
    pub(crate) params: HubParams,
}

fn check_stake_limits(min_stake: Amount, max_stake: Amount) -> Result<()> {
    if min_stake > max_stake {
        return Err(ImaginovationError::InvalidAmount {
            reason: format!("min stake {min_stake} exceeds max stake {max_stake}"),
        });
    }
    Ok(())
}

impl Hub {
    /// A new active hub. The registry transfers `hub_stake` to `address`.
    pub fn new(setup: HubSetup, params: HubParams, now: Timestamp) -> Result<Self> {
        if setup.fee_bps > params.max_fee_bps {
            return Err(ImaginovationError::FeeOutOfRange {
                fee_bps: setup.fee_bps,
                max_bps: params.max_fee_bps,
            });
        }
        check_stake_limits(setup.min_stake, setup.max_stake)?;
        Ok(Self {
            address: setup.address,
            roles: Roles::new(setup.operator),
            status: HubStatus::Active,
            hub_stake: setup.hub_stake,
            total_stake: 0,
            min_stake: setup.min_stake,
            max_stake: setup.max_stake,
            fees: FeeSchedule::new(setup.fee_bps, now),
            punishment: Punishment::default(),
            closing_timelock_end: None,
            channels: BTreeMap::new(),
            params,
        })
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.roles.owner()
    }

    #[must_use]
    pub fn operator(&self) -> Address {
        self.roles.operator()
    }

    #[must_use]
    pub fn status(&self) -> HubStatus {
        self.status
    }

    #[must_use]
    pub fn hub_stake(&self) -> Amount {
        self.hub_stake
    }

    /// Sum of all provider-channel stakes.
    #[must_use]
    pub fn total_stake(&self) -> Amount {
        self.total_stake
    }

    #[must_use]
    pub fn min_stake(&self) -> Amount {
        self.min_stake
    }

    #[must_use]
    pub fn max_stake(&self) -> Amount {
        self.max_stake
    }

    #[must_use]
    pub fn punishment(&self) -> Punishment {
        self.punishment
    }

    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        self.fees
    }

    #[must_use]
    pub fn closing_timelock_end(&self) -> Option<Timestamp> {
        self.closing_timelock_end
    }

    /// Chain and contract the hub's signatures are bound to.
    #[must_use]
    pub fn domain(&self) -> Domain {
        Domain::new(self.params.chain_id, self.address)
    }

    /// Provider channel id of `identity` at this hub.
    #[must_use]
    pub fn channel_id(&self, identity: &Address) -> ChannelId {
        ChannelId::provider(identity, &self.address)
    }

    #[must_use]
    pub fn channel(&self, channel_id: &ChannelId) -> Option<&ProviderChannel> {
        self.channels.get(channel_id)
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_channel_opened(&self, channel_id: &ChannelId) -> bool {
        self.channels.get(channel_id).is_some_and(ProviderChannel::is_opened)
    }

    /// Tokens the hub must keep: all channel stake plus the larger of its
    /// own stake and the punishment reserve.
    #[must_use]
    pub fn minimal_expected_balance(&self) -> Amount {
        self.total_stake
            .saturating_add(self.hub_stake.max(self.punishment.amount))
    }

    /// Tokens free for settlement and owner withdrawal.
    pub fn available_balance<L: TokenLedger + ?Sized>(&self, ledger: &L) -> Amount {
        ledger
            .balance_of(&self.address)
            .saturating_sub(self.minimal_expected_balance())
    }

    /// Hub fee owed on `amount` at `now`.
    #[must_use]
    pub fn calculate_hub_fee(&self, amount: Amount, now: Timestamp) -> Amount {
        self.fees.calculate(amount, now)
    }

    // -----------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------

    pub(crate) fn invalid_state(&self, reason: impl Into<String>) -> ImaginovationError {
        ImaginovationError::InvalidState {
            status: self.status,
            reason: reason.into(),
        }
    }

    pub(crate) fn ensure_not_closed(&self, action: &str) -> Result<()> {
        if self.status == HubStatus::Closed {
            return Err(self.invalid_state(format!("{action} on a closed hub")));
        }
        Ok(())
    }

    pub(crate) fn check_stake_range(&self, stake: Amount) -> Result<()> {
        if stake < self.min_stake {
            return Err(ImaginovationError::BelowMinimumStake {
                stake,
                min: self.min_stake,
            });
        }
        if stake > self.max_stake {
            return Err(ImaginovationError::AboveMaximumStake {
                stake,
                max: self.max_stake,
            });
        }
        Ok(())
    }

    /// Returns the provider channel, creating an empty record if needed.
    pub fn get_or_create_channel(
        &mut self,
        channel_id: ChannelId,
    ) -> ChannelLookup<&mut ProviderChannel> {
        use std::collections::btree_map::Entry;
        match self.channels.entry(channel_id) {
            Entry::Occupied(entry) => ChannelLookup::Existing(entry.into_mut()),
            Entry::Vacant(entry) => ChannelLookup::Created(entry.insert(ProviderChannel::default())),
        }
    }

    fn transition(&mut self, target: HubStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid_state(format!("cannot move to {target}")));
        }
        tracing::info!(hub = %self.address, from = %self.status, to = %target, "Hub status changed");
        self.status = target;
        Ok(())
    }

    pub(crate) fn enter_punishment(&mut self, now: Timestamp) -> Result<()> {
        if self.status == HubStatus::Punishment {
            return Ok(());
        }
        self.transition(HubStatus::Punishment)?;
        self.punishment.activated_at = now;
        tracing::warn!(hub = %self.address, at = now, "Hub entered punishment");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Stake management
    // -----------------------------------------------------------------

    /// Fails unless the hub takes new identity registrations.
    pub fn ensure_open_for_registration(&self) -> Result<()> {
        if !self.status.accepts_registrations() {
            return Err(self.invalid_state("channel opening not accepted"));
        }
        Ok(())
    }

    /// Records stake forwarded by the registry when an identity registers.
    ///
    /// The registry moves `stake` tokens to the hub address right after.
    pub fn open_channel(
        &mut self,
        identity: &Address,
        stake: Amount,
    ) -> Result<ChannelLookup<ChannelId>> {
        self.ensure_open_for_registration()?;
        let channel_id = self.channel_id(identity);
        let current = self.channels.get(&channel_id).map_or(0, |c| c.stake);
        let new_stake = current
            .checked_add(stake)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "open channel" })?;
        self.check_stake_range(new_stake)?;
        let total = self
            .total_stake
            .checked_add(stake)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "total stake" })?;

        let lookup = self.get_or_create_channel(channel_id).map(|channel| {
            channel.stake = new_stake;
        });
        self.total_stake = total;
        tracing::info!(hub = %self.address, channel = %channel_id, stake, "Provider channel opened");
        Ok(lookup.map(|()| channel_id))
    }

    /// Adds stake to any channel. Tokens are pulled from the caller, who must
    /// have approved the hub.
    pub fn increase_stake<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        channel_id: ChannelId,
        amount: Amount,
    ) -> Result<Amount> {
        self.ensure_not_closed("increase stake")?;
        if amount == 0 {
            return Err(ImaginovationError::InvalidAmount {
                reason: "stake increase must be positive".into(),
            });
        }
        let current = self.channels.get(&channel_id).map_or(0, |c| c.stake);
        let new_stake = current
            .checked_add(amount)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "increase stake" })?;
        self.check_stake_range(new_stake)?;
        let total = self
            .total_stake
            .checked_add(amount)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "total stake" })?;

        ledger.transfer_from(&self.address, &ctx.caller, &self.address, amount)?;
        self.get_or_create_channel(channel_id).into_inner().stake = new_stake;
        self.total_stake = total;
        tracing::info!(hub = %self.address, channel = %channel_id, amount, new_stake, "Stake increased");
        Ok(new_stake)
    }

    /// Returns stake to the identity's beneficiary on an identity-signed
    /// request. Going to exactly zero is always allowed.
    #[allow(clippy::too_many_arguments)]
    pub fn decrease_stake<L, B>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        book: &B,
        identity: &Address,
        amount: Amount,
        fee: Amount,
        nonce: u64,
        signature: &Signature,
    ) -> Result<Amount>
    where
        L: TokenLedger + ?Sized,
        B: BeneficiaryBook + ?Sized,
    {
        self.ensure_not_closed("decrease stake")?;
        let channel_id = self.channel_id(identity);
        let message = StakeReturn {
            channel_id,
            amount,
            fee,
            nonce,
        };
        verify_signer(&message, &self.domain(), signature, identity)?;

        let channel = self.channels.get(&channel_id).copied().unwrap_or_default();
        if nonce <= channel.last_used_nonce {
            return Err(ImaginovationError::StaleNonce {
                last: channel.last_used_nonce,
                got: nonce,
            });
        }
        if amount == 0 || amount > channel.stake {
            return Err(ImaginovationError::InvalidAmount {
                reason: format!("cannot return {amount} out of stake {}", channel.stake),
            });
        }
        if fee > amount {
            return Err(ImaginovationError::InvalidAmount {
                reason: format!("fee {fee} exceeds amount {amount}"),
            });
        }
        let new_stake = channel.stake - amount;
        if new_stake > 0 && new_stake < self.min_stake {
            return Err(ImaginovationError::BelowMinimumStake {
                stake: new_stake,
                min: self.min_stake,
            });
        }
        let beneficiary = book
            .beneficiary_of(identity)
            .ok_or(ImaginovationError::UnknownIdentity(*identity))?;
        let balance = ledger.balance_of(&self.address);
        if balance < amount {
            return Err(ImaginovationError::InsufficientFunds {
                needed: amount,
                available: balance,
            });
        }

        ledger.transfer(&self.address, &ctx.caller, fee)?;
        ledger.transfer(&self.address, &beneficiary, amount - fee)?;
        let channel = self.get_or_create_channel(channel_id).into_inner();
        channel.stake = new_stake;
        channel.last_used_nonce = nonce;
        self.total_stake = self.total_stake.saturating_sub(amount);
        tracing::info!(hub = %self.address, channel = %channel_id, amount, fee, new_stake, "Stake decreased");
        Ok(new_stake)
    }

    // -----------------------------------------------------------------
    // Fees
    // -----------------------------------------------------------------

    /// Schedules a new hub fee, active after the configured delay.
    pub fn set_hub_fee(&mut self, ctx: &CallContext, new_bps: u16) -> Result<HubFee> {
        self.roles
            .authorize(&ctx.caller, Capability::Operator, "set hub fee")?;
        let scheduled = self.fees.schedule(
            new_bps,
            ctx.now,
            self.params.fee_activation_delay_secs,
            self.params.max_fee_bps,
        )?;
        tracing::info!(
            hub = %self.address,
            fee_bps = scheduled.value_bps,
            valid_from = scheduled.valid_from,
            "Hub fee scheduled"
        );
        Ok(scheduled)
    }

    // -----------------------------------------------------------------
    // Punishment
    // -----------------------------------------------------------------

    /// Leaves punishment: charges the delay penalty, pulls whatever the hub
    /// is missing from the caller and reactivates the hub.
    pub fn resolve_emergency<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
    ) -> Result<Amount> {
        if self.status != HubStatus::Punishment {
            return Err(self.invalid_state("no emergency to resolve"));
        }
        let penalty = punishment::penalty(
            &self.params.punishment,
            self.total_stake,
            self.punishment.activated_at,
            ctx.now,
        )?;
        let reserve = self
            .punishment
            .amount
            .checked_add(penalty)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "punishment reserve" })?;
        let required = self.total_stake.saturating_add(self.hub_stake.max(reserve));
        let missing = required.saturating_sub(ledger.balance_of(&self.address));
        if missing > 0 {
            ledger.transfer_from(&self.address, &ctx.caller, &self.address, missing)?;
        }

        self.punishment.amount = reserve;
        self.transition(HubStatus::Active)?;
        tracing::info!(hub = %self.address, penalty, topped_up = missing, "Emergency resolved");
        Ok(penalty)
    }

    // -----------------------------------------------------------------
    // Owner actions
    // -----------------------------------------------------------------

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        self.roles
            .authorize(&ctx.caller, Capability::Owner, "transfer ownership")?;
        self.roles.transfer_ownership(new_owner)?;
        tracing::info!(hub = %self.address, owner = %new_owner, "Ownership transferred");
        Ok(())
    }

    /// Moves free funds out of the hub. Stake and punishment reserve stay.
    pub fn withdraw<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        beneficiary: &Address,
        amount: Amount,
    ) -> Result<()> {
        self.roles.authorize(&ctx.caller, Capability::Owner, "withdraw")?;
        let available = self.available_balance(ledger);
        if amount > available {
            return Err(ImaginovationError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        ledger.transfer(&self.address, beneficiary, amount)?;
        tracing::info!(hub = %self.address, beneficiary = %beneficiary, amount, "Funds withdrawn");
        Ok(())
    }

    pub fn set_min_stake(&mut self, ctx: &CallContext, min_stake: Amount) -> Result<()> {
        self.roles
            .authorize(&ctx.caller, Capability::Owner, "set min stake")?;
        check_stake_limits(min_stake, self.max_stake)?;
        self.min_stake = min_stake;
        Ok(())
    }

    pub fn set_max_stake(&mut self, ctx: &CallContext, max_stake: Amount) -> Result<()> {
        self.roles
            .authorize(&ctx.caller, Capability::Owner, "set max stake")?;
        check_stake_limits(self.min_stake, max_stake)?;
        self.max_stake = max_stake;
        Ok(())
    }

    /// Stops new identity registrations. Settlement continues.
    pub fn pause_channel_opening(&mut self, ctx: &CallContext) -> Result<()> {
        self.roles
            .authorize(&ctx.caller, Capability::Owner, "pause channel opening")?;
        if self.status != HubStatus::Active {
            return Err(self.invalid_state("only an active hub can be paused"));
        }
        self.transition(HubStatus::Paused)
    }

    pub fn activate_channel_opening(&mut self, ctx: &CallContext) -> Result<()> {
        self.roles
            .authorize(&ctx.caller, Capability::Owner, "activate channel opening")?;
        if self.status != HubStatus::Paused {
            return Err(self.invalid_state("hub is not paused"));
        }
        self.transition(HubStatus::Active)
    }

    // -----------------------------------------------------------------
    // Closing
    // -----------------------------------------------------------------

    /// Closes the hub and starts the closing timelock.
    pub fn close(&mut self, ctx: &CallContext) -> Result<Timestamp> {
        self.roles.authorize(&ctx.caller, Capability::Operator, "close hub")?;
        if self.status == HubStatus::Punishment {
            return Err(self.invalid_state("cannot close while in punishment"));
        }
        self.transition(HubStatus::Closed)?;
        let unlock_at = ctx.now.saturating_add(self.params.closing_timelock_secs);
        self.closing_timelock_end = Some(unlock_at);
        tracing::info!(hub = %self.address, unlock_at, "Hub closed");
        Ok(unlock_at)
    }

    /// Releases the whole remaining balance after the closing timelock.
    pub fn get_stake_back<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        beneficiary: &Address,
    ) -> Result<Amount> {
        self.roles
            .authorize(&ctx.caller, Capability::Operator, "get stake back")?;
        let unlock_at = match (self.status, self.closing_timelock_end) {
            (HubStatus::Closed, Some(unlock_at)) => unlock_at,
            _ => return Err(self.invalid_state("hub is not closed")),
        };
        if ctx.now <= unlock_at {
            return Err(ImaginovationError::TimelockActive {
                until: unlock_at,
                now: ctx.now,
            });
        }
        let balance = ledger.balance_of(&self.address);
        if balance == 0 {
            return Err(ImaginovationError::InsufficientFunds {
                needed: 1,
                available: 0,
            });
        }
        ledger.transfer(&self.address, beneficiary, balance)?;
        tracing::info!(hub = %self.address, beneficiary = %beneficiary, amount = balance, "Stake returned");
        Ok(balance)
    }
}
