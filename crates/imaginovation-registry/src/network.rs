//! Atomic facade over the ledger and the registry.
//!
//! Every external call runs against a snapshot of the whole state and is
//! committed only when it returns `Ok`, so a rejected call leaves balances,
//! hubs, channels and nonces exactly as they were.

use imaginovation_hub::SettlementReceipt;
use imaginovation_ledger::{Exchange, Ledger, TokenLedger};
use imaginovation_types::{
    constants, sha256, Address, Amount, CallContext, ChannelLookup, ConsumerChannelOpening,
    IdentityRegistration, ImaginovationError, Preimage, ProtocolConfig, Result, Signature,
    Timestamp,
};

use crate::clock::{Clock, SystemClock};
use crate::registry::{HubRegistration, Implementations, Registry};

/// An operator-signed hub promise as submitted for settlement.
#[derive(Debug, Clone)]
pub struct SignedPromise {
    pub identity: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub preimage: Preimage,
    pub signature: Signature,
}

/// A consumer-channel fast exit signed by both parties.
#[derive(Debug, Clone)]
pub struct FastExitRequest {
    pub amount: Amount,
    pub fee: Amount,
    pub beneficiary: Address,
    pub valid_until: Timestamp,
    pub identity_signature: Signature,
    pub hub_signature: Signature,
}

#[derive(Debug, Clone)]
struct NetworkState {
    ledger: Ledger,
    registry: Registry,
}

fn derived_address(tag: &[u8], seed: &Address) -> Address {
    Address::from_hash_tail(&sha256(&[tag, seed.as_bytes()]))
}

pub struct Network<C: Clock = SystemClock> {
    config: ProtocolConfig,
    clock: C,
    state: NetworkState,
}

impl Network<SystemClock> {
    /// Network on wall-clock time configured from a JSON document.
    pub fn from_json_config(json: &str, owner: Address) -> Result<Self> {
        Self::new(ProtocolConfig::from_json_str(json)?, SystemClock, owner)
    }
}

impl<C: Clock> Network<C> {
    /// Fresh network with an empty ledger and a registry owned by `owner`.
    pub fn new(config: ProtocolConfig, clock: C, owner: Address) -> Result<Self> {
        config.validate()?;
        let registry_address = Address::from_hash_tail(&sha256(&[
            b"imaginovation:registry",
            owner.as_bytes(),
            &config.chain_id.to_be_bytes(),
        ]));
        let implementations = Implementations {
            channel: derived_address(b"imaginovation:channel-implementation", &registry_address),
            hub: derived_address(b"imaginovation:hub-implementation", &registry_address),
        };
        let ledger = Ledger::new(derived_address(b"imaginovation:pool", &registry_address));
        let registry = Registry::new(registry_address, owner, &config, implementations);
        tracing::info!(
            protocol = constants::PROTOCOL_NAME,
            version = constants::VERSION,
            registry = %registry_address,
            chain_id = config.chain_id,
            owner = %owner,
            "Network created"
        );
        Ok(Self {
            config,
            clock,
            state: NetworkState { ledger, registry },
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// Free balance of `hub`, or zero for an unknown hub.
    #[must_use]
    pub fn available_balance(&self, hub: &Address) -> Amount {
        self.state
            .registry
            .hub(hub)
            .map_or(0, |h| h.available_balance(&self.state.ledger))
    }

    pub fn verify_supply(&self) -> Result<()> {
        self.state.ledger.verify_supply()
    }

    fn transact<T>(
        &mut self,
        caller: Address,
        action: &'static str,
        op: impl FnOnce(&CallContext, &mut Ledger, &mut Registry) -> Result<T>,
    ) -> Result<T> {
        let ctx = CallContext::new(caller, self.clock.now());
        let mut draft = self.state.clone();
        match op(&ctx, &mut draft.ledger, &mut draft.registry) {
            Ok(value) => {
                self.state = draft;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(action, caller = %caller, error = %err, "Call rolled back");
                Err(err)
            }
        }
    }

    // =================================================================
    // Ledger
    // =================================================================

    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<()> {
        self.transact(Address::ZERO, "mint", |_, ledger, _| ledger.mint(to, amount))
    }

    pub fn mint_native(&mut self, to: &Address, amount: Amount) -> Result<()> {
        self.transact(Address::ZERO, "mint native", |_, ledger, _| {
            ledger.mint_native(to, amount)
        })
    }

    /// Adds liquidity to the swap pool.
    pub fn seed_pool(&mut self, token_reserve: Amount, native_reserve: Amount) -> Result<()> {
        self.transact(Address::ZERO, "seed pool", |_, ledger, _| {
            ledger.seed_pool(token_reserve, native_reserve)
        })
    }

    /// Plain token transfer; also how a consumer channel is topped up.
    pub fn transfer(&mut self, caller: Address, to: &Address, amount: Amount) -> Result<()> {
        self.transact(caller, "transfer", |ctx, ledger, _| {
            ledger.transfer(&ctx.caller, to, amount)
        })
    }

    pub fn transfer_native(&mut self, caller: Address, to: &Address, amount: Amount) -> Result<()> {
        self.transact(caller, "transfer native", |ctx, ledger, _| {
            ledger.transfer_native(&ctx.caller, to, amount)
        })
    }

    pub fn approve(&mut self, caller: Address, spender: &Address, amount: Amount) -> Result<()> {
        self.transact(caller, "approve", |ctx, ledger, _| {
            ledger.approve(&ctx.caller, spender, amount);
            Ok(())
        })
    }

    // =================================================================
    // Registry
    // =================================================================

    pub fn register_hub(&mut self, caller: Address, request: &HubRegistration) -> Result<Address> {
        self.transact(caller, "register hub", |ctx, ledger, registry| {
            registry.register_hub(ctx, ledger, request)
        })
    }

    pub fn register_identity(
        &mut self,
        caller: Address,
        identity: &Address,
        registration: &IdentityRegistration,
        signature: &Signature,
    ) -> Result<ChannelLookup<Address>> {
        self.transact(caller, "register identity", |ctx, ledger, registry| {
            registry.register_identity(ctx, ledger, identity, registration, signature)
        })
    }

    pub fn open_consumer_channel(
        &mut self,
        caller: Address,
        identity: &Address,
        opening: &ConsumerChannelOpening,
        signature: &Signature,
    ) -> Result<ChannelLookup<Address>> {
        self.transact(caller, "open consumer channel", |ctx, ledger, registry| {
            registry.open_consumer_channel(ctx, ledger, identity, opening, signature)
        })
    }

    pub fn set_beneficiary(
        &mut self,
        caller: Address,
        identity: &Address,
        new_beneficiary: Address,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        self.transact(caller, "set beneficiary", |_, _, registry| {
            registry.set_beneficiary(identity, new_beneficiary, nonce, signature)
        })
    }

    pub fn update_hub_url(
        &mut self,
        caller: Address,
        hub: &Address,
        url: &str,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        self.transact(caller, "update hub url", |_, _, registry| {
            registry.update_hub_url(hub, url.to_owned(), nonce, signature)
        })
    }

    pub fn set_implementations(
        &mut self,
        caller: Address,
        implementations: Implementations,
    ) -> Result<u64> {
        self.transact(caller, "set implementations", |ctx, _, registry| {
            registry.set_implementations(ctx, implementations)
        })
    }

    // =================================================================
    // Hub settlement
    // =================================================================

    pub fn settle_promise(
        &mut self,
        caller: Address,
        hub: &Address,
        promise: &SignedPromise,
    ) -> Result<SettlementReceipt> {
        self.transact(caller, "settle promise", |ctx, ledger, registry| {
            let (hub, book) = registry.hub_and_book_mut(hub)?;
            hub.settle_promise(
                ctx,
                ledger,
                &*book,
                &promise.identity,
                promise.amount,
                promise.fee,
                &promise.preimage,
                &promise.signature,
            )
        })
    }

    pub fn settle_with_beneficiary(
        &mut self,
        caller: Address,
        hub: &Address,
        promise: &SignedPromise,
        new_beneficiary: Address,
        nonce: u64,
        beneficiary_signature: &Signature,
    ) -> Result<SettlementReceipt> {
        self.transact(caller, "settle with beneficiary", |ctx, ledger, registry| {
            let (hub, book) = registry.hub_and_book_mut(hub)?;
            hub.settle_with_beneficiary(
                ctx,
                ledger,
                book,
                &promise.identity,
                promise.amount,
                promise.fee,
                &promise.preimage,
                &promise.signature,
                new_beneficiary,
                nonce,
                beneficiary_signature,
            )
        })
    }

    pub fn settle_into_stake(
        &mut self,
        caller: Address,
        hub: &Address,
        promise: &SignedPromise,
    ) -> Result<SettlementReceipt> {
        self.transact(caller, "settle into stake", |ctx, ledger, registry| {
            registry.hub_mut(hub)?.settle_into_stake(
                ctx,
                ledger,
                &promise.identity,
                promise.amount,
                promise.fee,
                &promise.preimage,
                &promise.signature,
            )
        })
    }

    pub fn pay_and_settle(
        &mut self,
        caller: Address,
        hub: &Address,
        promise: &SignedPromise,
        beneficiary: Address,
        identity_signature: &Signature,
    ) -> Result<SettlementReceipt> {
        self.transact(caller, "pay and settle", |ctx, ledger, registry| {
            registry.hub_mut(hub)?.pay_and_settle(
                ctx,
                ledger,
                &promise.identity,
                promise.amount,
                promise.fee,
                &promise.preimage,
                &promise.signature,
                beneficiary,
                identity_signature,
            )
        })
    }

    pub fn settle_with_dex(
        &mut self,
        caller: Address,
        hub: &Address,
        promise: &SignedPromise,
    ) -> Result<SettlementReceipt> {
        self.transact(caller, "settle with dex", |ctx, ledger, registry| {
            let (hub, book) = registry.hub_and_book_mut(hub)?;
            hub.settle_with_dex(
                ctx,
                ledger,
                &*book,
                &promise.identity,
                promise.amount,
                promise.fee,
                &promise.preimage,
                &promise.signature,
            )
        })
    }

    // =================================================================
    // Hub stake, fees and lifecycle
    // =================================================================

    /// Adds the caller's tokens to `identity`'s stake at `hub`.
    pub fn increase_stake(
        &mut self,
        caller: Address,
        hub: &Address,
        identity: &Address,
        amount: Amount,
    ) -> Result<Amount> {
        self.transact(caller, "increase stake", |ctx, ledger, registry| {
            let hub = registry.hub_mut(hub)?;
            let channel_id = hub.channel_id(identity);
            hub.increase_stake(ctx, ledger, channel_id, amount)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn decrease_stake(
        &mut self,
        caller: Address,
        hub: &Address,
        identity: &Address,
        amount: Amount,
        fee: Amount,
        nonce: u64,
        signature: &Signature,
    ) -> Result<Amount> {
        self.transact(caller, "decrease stake", |ctx, ledger, registry| {
            let (hub, book) = registry.hub_and_book_mut(hub)?;
            hub.decrease_stake(ctx, ledger, &*book, identity, amount, fee, nonce, signature)
        })
    }

    pub fn set_hub_fee(&mut self, caller: Address, hub: &Address, fee_bps: u16) -> Result<()> {
        self.transact(caller, "set hub fee", |ctx, _, registry| {
            registry.hub_mut(hub)?.set_hub_fee(ctx, fee_bps).map(|_| ())
        })
    }

    /// Returns the penalty charged.
    pub fn resolve_emergency(&mut self, caller: Address, hub: &Address) -> Result<Amount> {
        self.transact(caller, "resolve emergency", |ctx, ledger, registry| {
            registry.hub_mut(hub)?.resolve_emergency(ctx, ledger)
        })
    }

    pub fn transfer_hub_ownership(
        &mut self,
        caller: Address,
        hub: &Address,
        new_owner: Address,
    ) -> Result<()> {
        self.transact(caller, "transfer hub ownership", |ctx, _, registry| {
            registry.hub_mut(hub)?.transfer_ownership(ctx, new_owner)
        })
    }

    pub fn withdraw(
        &mut self,
        caller: Address,
        hub: &Address,
        beneficiary: &Address,
        amount: Amount,
    ) -> Result<()> {
        self.transact(caller, "withdraw", |ctx, ledger, registry| {
            registry.hub_mut(hub)?.withdraw(ctx, ledger, beneficiary, amount)
        })
    }

    pub fn set_min_stake(&mut self, caller: Address, hub: &Address, min_stake: Amount) -> Result<()> {
        self.transact(caller, "set min stake", |ctx, _, registry| {
            registry.hub_mut(hub)?.set_min_stake(ctx, min_stake)
        })
    }

    pub fn set_max_stake(&mut self, caller: Address, hub: &Address, max_stake: Amount) -> Result<()> {
        self.transact(caller, "set max stake", |ctx, _, registry| {
            registry.hub_mut(hub)?.set_max_stake(ctx, max_stake)
        })
    }

    pub fn pause_channel_opening(&mut self, caller: Address, hub: &Address) -> Result<()> {
        self.transact(caller, "pause channel opening", |ctx, _, registry| {
            registry.hub_mut(hub)?.pause_channel_opening(ctx)
        })
    }

    pub fn activate_channel_opening(&mut self, caller: Address, hub: &Address) -> Result<()> {
        self.transact(caller, "activate channel opening", |ctx, _, registry| {
            registry.hub_mut(hub)?.activate_channel_opening(ctx)
        })
    }

    /// Returns the time after which the stake can be taken back.
    pub fn close_hub(&mut self, caller: Address, hub: &Address) -> Result<Timestamp> {
        self.transact(caller, "close hub", |ctx, _, registry| {
            registry.hub_mut(hub)?.close(ctx)
        })
    }

    pub fn get_stake_back(
        &mut self,
        caller: Address,
        hub: &Address,
        beneficiary: &Address,
    ) -> Result<Amount> {
        self.transact(caller, "get stake back", |ctx, ledger, registry| {
            registry.hub_mut(hub)?.get_stake_back(ctx, ledger, beneficiary)
        })
    }

    // =================================================================
    // Consumer channels
    // =================================================================

    /// Settles an identity-signed promise from a consumer channel to its hub.
    pub fn settle_channel_promise(
        &mut self,
        caller: Address,
        channel: &Address,
        amount: Amount,
        fee: Amount,
        preimage: &Preimage,
        signature: &Signature,
    ) -> Result<Amount> {
        self.transact(caller, "settle channel promise", |ctx, ledger, registry| {
            registry
                .channel_mut(channel)?
                .settle_promise(ctx, ledger, amount, fee, preimage, signature)
        })
    }

    pub fn fast_exit(
        &mut self,
        caller: Address,
        channel: &Address,
        request: &FastExitRequest,
    ) -> Result<Amount> {
        self.transact(caller, "fast exit", |ctx, ledger, registry| {
            registry.channel_mut(channel)?.fast_exit(
                ctx,
                ledger,
                request.amount,
                request.fee,
                request.beneficiary,
                request.valid_until,
                &request.identity_signature,
                &request.hub_signature,
            )
        })
    }

    /// Converts the caller's native currency into channel tokens.
    pub fn deposit_native(
        &mut self,
        caller: Address,
        channel: &Address,
        native_in: Amount,
    ) -> Result<Amount> {
        self.transact(caller, "deposit native", |ctx, ledger, registry| {
            let channel = registry
                .channel(channel)
                .ok_or(ImaginovationError::UnknownChannel(*channel))?;
            channel.deposit_native(ctx, ledger, native_in)
        })
    }

    /// Native-currency balance, for DEX payouts and deposits.
    #[must_use]
    pub fn native_balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.native_balance_of(account)
    }

    #[must_use]
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.balance_of(account)
    }
}
