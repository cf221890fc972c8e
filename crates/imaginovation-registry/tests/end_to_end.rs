//! End-to-end scenarios through the atomic `Network` facade.
//!
//! Hubs and identities are registered the way clients would do it: consumer
//! channels are funded at their predicted address first, identities sign
//! registrations that a relayer submits, and time moves through a shared
//! manual clock.

use imaginovation_registry::addressing;
use imaginovation_registry::{
    FastExitRequest, HubRegistration, Implementations, ManualClock, Network, SignedPromise,
};
use imaginovation_types::*;

const RELAYER: Address = Address([0x22; 20]);
const OWNER: Address = Address([0x0a; 20]);

struct Harness {
    net: Network<ManualClock>,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        let config = ProtocolConfig::from_json_str(
            r#"{
                "chain_id": 42,
                "fee_activation_delay_secs": 100,
                "closing_timelock_secs": 50,
                "punishment": { "unit_secs": 10 }
            }"#,
        )
        .unwrap();
        let clock = ManualClock::new(1_000);
        let net = Network::new(config, clock.clone(), OWNER).unwrap();
        Self { net, clock }
    }

    fn register_hub(
        &mut self,
        operator: &Wallet,
        stake: Amount,
        fee_bps: u16,
        min_stake: Amount,
        max_stake: Amount,
    ) -> Address {
        let registry = self.net.registry().address();
        self.net.mint(&operator.address(), stake).unwrap();
        self.net.approve(operator.address(), &registry, stake).unwrap();
        self.net
            .register_hub(
                operator.address(),
                &HubRegistration {
                    operator: operator.address(),
                    stake,
                    fee_bps,
                    min_stake,
                    max_stake,
                    url: "https://hub.example".into(),
                },
            )
            .unwrap()
    }

    fn channel_address(&self, identity: &Wallet, hub: &Address) -> Address {
        self.net
            .registry()
            .get_channel_address(&identity.address(), hub)
    }

    fn fund_channel(&mut self, identity: &Wallet, hub: &Address, amount: Amount) -> Address {
        let channel = self.channel_address(identity, hub);
        self.net.mint(&channel, amount).unwrap();
        channel
    }

    fn register(
        &mut self,
        identity: &Wallet,
        hub: Address,
        stake: Amount,
        fee: Amount,
        beneficiary: Address,
    ) -> Result<ChannelLookup<Address>> {
        let registration = IdentityRegistration {
            hub,
            stake,
            fee,
            beneficiary,
        };
        let signature = identity.sign(&registration, &self.net.registry().domain());
        self.net
            .register_identity(RELAYER, &identity.address(), &registration, &signature)
    }

    fn hub_domain(&self, hub: &Address) -> Domain {
        self.net.registry().hub(hub).unwrap().domain()
    }

    fn promise(
        &self,
        operator: &Wallet,
        hub: &Address,
        identity: &Address,
        amount: Amount,
        fee: Amount,
    ) -> SignedPromise {
        let preimage = Preimage::random();
        let channel_id = self.net.registry().hub(hub).unwrap().channel_id(identity);
        let signature = operator.sign(
            &HubPromise {
                channel_id,
                amount,
                fee,
                hashlock: preimage.hashlock(),
            },
            &self.hub_domain(hub),
        );
        SignedPromise {
            identity: *identity,
            amount,
            fee,
            preimage,
            signature,
        }
    }

    fn hub_status(&self, hub: &Address) -> HubStatus {
        self.net.registry().hub(hub).unwrap().status()
    }
}

// =========================================================================
// Registration
// =========================================================================

#[test]
fn identity_registers_through_prefunded_channel() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 1_000, 0, 0, 10_000);
    let identity = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    let channel = h.fund_channel(&identity, &hub, 1_000);

    let lookup = h.register(&identity, hub, 500, 10, beneficiary).unwrap();

    assert_eq!(lookup, ChannelLookup::Created(channel));
    assert_eq!(h.net.balance_of(&RELAYER), 10);
    assert_eq!(h.net.balance_of(&channel), 490);
    assert_eq!(h.net.balance_of(&hub), 1_500);
    assert!(h.net.registry().is_registered(&identity.address()));
    assert_eq!(h.net.registry().beneficiary(&identity.address()), Some(beneficiary));
    let stake = h.net.registry().hub(&hub).unwrap().total_stake();
    assert_eq!(stake, 500);
    assert_eq!(h.net.available_balance(&hub), 0);

    // Same pair, same beneficiary: nothing moves.
    let again = h.register(&identity, hub, 500, 10, beneficiary).unwrap();
    assert_eq!(again, ChannelLookup::Existing(channel));
    assert_eq!(h.net.balance_of(&channel), 490);

    let err = h
        .register(&identity, hub, 0, 0, Address([0xb2; 20]))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::AlreadyRegistered(_)));
    h.net.verify_supply().unwrap();
}

#[test]
fn unfunded_registration_is_rejected_and_rolled_back() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 1_000, 0, 0, 10_000);
    let identity = Wallet::generate();
    let channel = h.fund_channel(&identity, &hub, 100);

    let err = h
        .register(&identity, hub, 100, 1, Address([0xb1; 20]))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::InsufficientFunds { needed: 101, available: 100 }));
    assert!(!h.net.registry().is_registered(&identity.address()));
    assert!(h.net.registry().channel(&channel).is_none());
    assert_eq!(h.net.balance_of(&channel), 100);

    let err = h
        .register(&identity, Address([0x99; 20]), 0, 0, Address([0xb1; 20]))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::UnknownHub(_)));
}

#[test]
fn registration_signed_by_someone_else_is_rejected() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    let identity = Wallet::generate();
    let registration = IdentityRegistration {
        hub,
        stake: 0,
        fee: 0,
        beneficiary: Address([0xb1; 20]),
    };
    let signature = operator.sign(&registration, &h.net.registry().domain());
    let err = h
        .net
        .register_identity(RELAYER, &identity.address(), &registration, &signature)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::InvalidSignature { .. }));
}

#[test]
fn identity_can_use_several_hubs() {
    let mut h = Harness::new();
    let first_operator = Wallet::generate();
    let second_operator = Wallet::generate();
    let first = h.register_hub(&first_operator, 0, 0, 0, 10_000);
    let second = h.register_hub(&second_operator, 0, 0, 0, 10_000);
    let identity = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);

    let a = h.register(&identity, first, 0, 0, beneficiary).unwrap().into_inner();
    let b = h.register(&identity, second, 0, 0, beneficiary).unwrap().into_inner();

    assert_ne!(a, b);
    let registry = h.net.registry();
    assert_eq!(registry.consumer_channel(&identity.address(), &first).unwrap().address(), a);
    assert_eq!(registry.consumer_channel(&identity.address(), &second).unwrap().address(), b);
    assert!(registry.is_hub(&first) && registry.is_hub(&second));
    assert!(!registry.is_hub(&a));
}

#[test]
fn relayer_registers_hub_for_operator_without_tokens() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let registry = h.net.registry().address();
    h.net.mint(&RELAYER, 2_000).unwrap();
    h.net.approve(RELAYER, &registry, 2_000).unwrap();

    let hub = h
        .net
        .register_hub(
            RELAYER,
            &HubRegistration {
                operator: operator.address(),
                stake: 2_000,
                fee_bps: 0,
                min_stake: 0,
                max_stake: 10_000,
                url: "https://hub.example".into(),
            },
        )
        .unwrap();

    assert_eq!(h.net.registry().get_hub_address(&operator.address()), Some(hub));
    assert_eq!(h.net.registry().hub(&hub).unwrap().operator(), operator.address());
    assert_eq!(h.net.balance_of(&operator.address()), 0);
    assert_eq!(h.net.balance_of(&RELAYER), 0);
    assert_eq!(h.net.balance_of(&hub), 2_000);

    // The operator key, not the funder, signs promises for the hub.
    h.net.mint(&hub, 100).unwrap();
    let provider = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    h.register(&provider, hub, 0, 0, beneficiary).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 40, 0);
    h.net.settle_promise(RELAYER, &hub, &promise).unwrap();
    assert_eq!(h.net.balance_of(&beneficiary), 40);
}

#[test]
fn paused_hub_takes_no_registrations() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    h.net.pause_channel_opening(operator.address(), &hub).unwrap();

    let identity = Wallet::generate();
    let err = h
        .register(&identity, hub, 0, 0, Address([0xb1; 20]))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::InvalidState { status: HubStatus::Paused, .. }));

    h.net
        .activate_channel_opening(operator.address(), &hub)
        .unwrap();
    h.register(&identity, hub, 0, 0, Address([0xb1; 20])).unwrap();
}

#[test]
fn hub_url_updates_need_operator_signature_and_fresh_nonce() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    let domain = h.net.registry().domain();
    let sign = |wallet: &Wallet, nonce| {
        wallet.sign(
            &UrlUpdate {
                hub,
                url: "https://new.example".into(),
                nonce,
            },
            &domain,
        )
    };

    let forged = sign(&Wallet::generate(), 1);
    let err = h
        .net
        .update_hub_url(RELAYER, &hub, "https://new.example", 1, &forged)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::InvalidSignature { .. }));

    let signed = sign(&operator, 1);
    h.net
        .update_hub_url(RELAYER, &hub, "https://new.example", 1, &signed)
        .unwrap();
    assert_eq!(h.net.registry().hub_url(&hub), Some("https://new.example"));
    let err = h
        .net
        .update_hub_url(RELAYER, &hub, "https://new.example", 1, &signed)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::StaleNonce { last: 1, got: 1 }));
}

#[test]
fn new_implementations_only_affect_new_deployments() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    let identity = Wallet::generate();
    let channel = h
        .register(&identity, hub, 0, 0, Address([0xb1; 20]))
        .unwrap()
        .into_inner();
    let newcomer = Wallet::generate();
    let before = h.channel_address(&newcomer, &hub);

    let upgraded = Implementations {
        channel: Address([0xc2; 20]),
        hub: Address([0xd2; 20]),
    };
    let err = h.net.set_implementations(RELAYER, upgraded).unwrap_err();
    assert!(matches!(err, ImaginovationError::Unauthorized { .. }));
    assert_eq!(h.net.set_implementations(OWNER, upgraded).unwrap(), 2);

    assert_eq!(h.channel_address(&identity, &hub), channel);
    let after = h.channel_address(&newcomer, &hub);
    assert_ne!(before, after);
    assert_eq!(
        after,
        addressing::channel_address(
            &h.net.registry().address(),
            &upgraded.channel,
            &newcomer.address(),
            &hub
        )
    );

    // The operator may deploy again under the new version.
    let second = h.register_hub(&operator, 0, 0, 0, 10_000);
    assert_ne!(second, hub);
    assert_eq!(h.net.registry().get_hub_address(&operator.address()), Some(second));
}

// =========================================================================
// Consumer channel to hub
// =========================================================================

#[test]
fn consumer_pays_hub_which_pays_provider() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);

    let consumer = Wallet::generate();
    let opening = ConsumerChannelOpening { hub, fee: 0 };
    let signature = consumer.sign(&opening, &h.net.registry().domain());
    let channel = h
        .net
        .open_consumer_channel(RELAYER, &consumer.address(), &opening, &signature)
        .unwrap()
        .into_inner();
    assert_eq!(h.net.registry().beneficiary(&consumer.address()), Some(channel));
    h.net.mint(&Address([0x77; 20]), 1_000).unwrap();
    h.net.transfer(Address([0x77; 20]), &channel, 1_000).unwrap();

    // Consumer pays the hub 300 through an exchange promise.
    let preimage = Preimage::random();
    let channel_domain = h.net.registry().channel(&channel).unwrap().domain();
    let exchange_sig = consumer.sign(
        &ExchangePromise {
            channel,
            amount: 300,
            fee: 0,
            hashlock: preimage.hashlock(),
        },
        &channel_domain,
    );
    let to_hub = h
        .net
        .settle_channel_promise(RELAYER, &channel, 300, 0, &preimage, &exchange_sig)
        .unwrap();
    assert_eq!(to_hub, 300);
    assert_eq!(h.net.available_balance(&hub), 300);

    // The hub forwards it to a provider.
    let provider = Wallet::generate();
    let provider_beneficiary = Address([0xb1; 20]);
    h.register(&provider, hub, 0, 0, provider_beneficiary).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 300, 0);
    h.net.settle_promise(RELAYER, &hub, &promise).unwrap();
    assert_eq!(h.net.balance_of(&provider_beneficiary), 300);
    assert_eq!(h.net.balance_of(&channel), 700);
    h.net.verify_supply().unwrap();
}

#[test]
fn fast_exit_through_network() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    let consumer = Wallet::generate();
    let channel = h.fund_channel(&consumer, &hub, 1_000);
    h.register(&consumer, hub, 0, 0, Address([0xb1; 20])).unwrap();

    let beneficiary = Address([0xe1; 20]);
    let valid_until = h.net.now() + 60;
    let state = h.net.registry().channel(&channel).unwrap();
    let terms = state.exit_terms(600, 6, beneficiary, valid_until);
    let request = FastExitRequest {
        amount: 600,
        fee: 6,
        beneficiary,
        valid_until,
        identity_signature: consumer.sign(&terms, &state.domain()),
        hub_signature: operator.sign(&terms, &state.domain()),
    };

    h.clock.advance(61);
    let err = h.net.fast_exit(RELAYER, &channel, &request).unwrap_err();
    assert!(matches!(err, ImaginovationError::Expired { .. }));

    h.clock.set(valid_until);
    assert_eq!(h.net.fast_exit(RELAYER, &channel, &request).unwrap(), 594);
    assert_eq!(h.net.balance_of(&beneficiary), 594);
    assert_eq!(h.net.balance_of(&channel), 400);
    let err = h.net.fast_exit(RELAYER, &channel, &request).unwrap_err();
    assert!(matches!(err, ImaginovationError::InvalidSignature { .. }));
}

#[test]
fn native_currency_deposit_lands_in_channel() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 10_000);
    let consumer = Wallet::generate();
    let channel = h.fund_channel(&consumer, &hub, 0);
    h.register(&consumer, hub, 0, 0, Address([0xb1; 20])).unwrap();
    h.net.seed_pool(10_000_000, 5_000_000).unwrap();
    let payer = Address([0x55; 20]);
    let faucet = Address([0x56; 20]);
    h.net.mint_native(&faucet, 150).unwrap();
    h.net.transfer_native(faucet, &payer, 100).unwrap();

    let tokens = h.net.deposit_native(payer, &channel, 100).unwrap();

    assert_eq!(tokens, 199);
    assert_eq!(h.net.balance_of(&channel), 199);
    assert_eq!(h.net.native_balance_of(&payer), 0);
    h.net.verify_supply().unwrap();
}

// =========================================================================
// Hub settlement properties
// =========================================================================

#[test]
fn zero_stake_provider_settlement() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 100_000, 0, 0, 100_000);
    h.net.mint(&hub, 1_000).unwrap();
    let provider = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    h.register(&provider, hub, 0, 0, beneficiary).unwrap();

    let promise = h.promise(&operator, &hub, &provider.address(), 25, 0);
    h.net.settle_promise(RELAYER, &hub, &promise).unwrap();

    assert_eq!(h.net.balance_of(&beneficiary), 25);
    assert_eq!(h.net.available_balance(&hub), 975);
    let state = h.net.registry().hub(&hub).unwrap();
    let channel = state.channel(&state.channel_id(&provider.address())).unwrap();
    assert_eq!(channel.stake, 0);

    // Fully settled: rejected, nothing moves.
    let err = h.net.settle_promise(RELAYER, &hub, &promise).unwrap_err();
    assert!(matches!(err, ImaginovationError::PromiseFullySettled { .. }));
    assert_eq!(h.net.balance_of(&beneficiary), 25);
    assert_eq!(h.net.available_balance(&hub), 975);
}

#[test]
fn underfunded_hub_is_punished_until_resolved() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 1_000, 0, 0, 100_000);
    let staked = Wallet::generate();
    h.fund_channel(&staked, &hub, 1_000);
    h.register(&staked, hub, 1_000, 0, Address([0xb0; 20])).unwrap();
    h.net.mint(&hub, 5_000).unwrap();
    assert_eq!(h.net.available_balance(&hub), 5_000);

    let provider = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    h.register(&provider, hub, 0, 0, beneficiary).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 6_000, 0);

    let receipt = h.net.settle_promise(RELAYER, &hub, &promise).unwrap();
    assert_eq!(receipt.paid, 5_000);
    assert_eq!(h.hub_status(&hub), HubStatus::Punishment);

    let empty = h.net.settle_promise(RELAYER, &hub, &promise).unwrap();
    assert_eq!(empty.paid, 0);
    assert_eq!(empty.settled, 5_000);

    h.net.mint(&hub, 1_000).unwrap();
    let receipt = h.net.settle_promise(RELAYER, &hub, &promise).unwrap();
    assert_eq!(receipt.paid, 1_000);
    assert_eq!(receipt.settled, 6_000);
    assert_eq!(h.net.balance_of(&beneficiary), 6_000);
    assert_eq!(h.hub_status(&hub), HubStatus::Punishment);

    // Two full punishment units: 2 x 4% of the 1000 staked.
    h.clock.advance(25);
    let penalty = h.net.resolve_emergency(RELAYER, &hub).unwrap();
    assert_eq!(penalty, 80);
    assert_eq!(h.hub_status(&hub), HubStatus::Active);
    assert_eq!(h.net.registry().hub(&hub).unwrap().punishment().amount, 80);
    h.net.verify_supply().unwrap();
}

#[test]
fn penalty_above_hub_stake_is_pulled_from_resolver() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 100_000);
    let staked = Wallet::generate();
    h.fund_channel(&staked, &hub, 1_000);
    h.register(&staked, hub, 1_000, 0, Address([0xb0; 20])).unwrap();
    h.net.mint(&hub, 100).unwrap();
    let provider = Wallet::generate();
    h.register(&provider, hub, 0, 0, Address([0xb1; 20])).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 300, 0);
    h.net.settle_promise(RELAYER, &hub, &promise).unwrap();

    h.clock.advance(30);
    let resolver = Address([0x66; 20]);
    let err = h.net.resolve_emergency(resolver, &hub).unwrap_err();
    assert!(matches!(err, ImaginovationError::InsufficientAllowance { needed: 120, .. }));
    assert_eq!(h.hub_status(&hub), HubStatus::Punishment);

    h.net.mint(&resolver, 120).unwrap();
    h.net.approve(resolver, &hub, 120).unwrap();
    assert_eq!(h.net.resolve_emergency(resolver, &hub).unwrap(), 120);
    assert_eq!(h.net.balance_of(&hub), 1_120);
    assert_eq!(h.net.available_balance(&hub), 0);
}

#[test]
fn fee_change_waits_for_activation_delay() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 250, 0, 100_000);
    h.net.set_hub_fee(operator.address(), &hub, 1_000).unwrap();
    let fee_at = |h: &Harness, amount| {
        h.net
            .registry()
            .hub(&hub)
            .unwrap()
            .calculate_hub_fee(amount, h.net.now())
    };

    assert_eq!(fee_at(&h, 100_000_000), 2_500_000);
    assert_eq!(fee_at(&h, 100), 3);
    let err = h.net.set_hub_fee(operator.address(), &hub, 500).unwrap_err();
    assert!(matches!(err, ImaginovationError::FeeChangePending { .. }));

    h.clock.advance(100);
    assert_eq!(fee_at(&h, 100_000_000), 10_000_000);
}

#[test]
fn stake_can_drop_to_zero_but_not_below_minimum() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 100, 1_000);
    let provider = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    h.fund_channel(&provider, &hub, 500);
    h.register(&provider, hub, 500, 0, beneficiary).unwrap();
    let domain = h.hub_domain(&hub);
    let channel_id = h.net.registry().hub(&hub).unwrap().channel_id(&provider.address());
    let sign = |amount, fee, nonce| {
        provider.sign(
            &StakeReturn {
                channel_id,
                amount,
                fee,
                nonce,
            },
            &domain,
        )
    };

    let err = h
        .net
        .decrease_stake(RELAYER, &hub, &provider.address(), 450, 0, 1, &sign(450, 0, 1))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::BelowMinimumStake { stake: 50, min: 100 }));

    let full = sign(500, 5, 1);
    let left = h
        .net
        .decrease_stake(RELAYER, &hub, &provider.address(), 500, 5, 1, &full)
        .unwrap();
    assert_eq!(left, 0);
    assert_eq!(h.net.balance_of(&beneficiary), 495);
    assert_eq!(h.net.balance_of(&RELAYER), 5);

    let err = h
        .net
        .decrease_stake(RELAYER, &hub, &provider.address(), 500, 5, 1, &full)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::StaleNonce { .. }));
}

#[test]
fn beneficiary_changes_are_nonce_protected() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 100_000);
    h.net.mint(&hub, 1_000).unwrap();
    let provider = Wallet::generate();
    h.register(&provider, hub, 0, 0, Address([0xb1; 20])).unwrap();
    let domain = h.net.registry().domain();
    let change = |to: Address, nonce| {
        provider.sign(
            &BeneficiaryChange {
                new_beneficiary: to,
                nonce,
            },
            &domain,
        )
    };

    let second = Address([0xb2; 20]);
    let sig = change(second, 1);
    h.net
        .set_beneficiary(RELAYER, &provider.address(), second, 1, &sig)
        .unwrap();
    let err = h
        .net
        .set_beneficiary(RELAYER, &provider.address(), second, 1, &sig)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::StaleNonce { .. }));

    // Settle-and-rebind uses the next nonce and pays the newest beneficiary.
    let third = Address([0xb3; 20]);
    let promise = h.promise(&operator, &hub, &provider.address(), 40, 0);
    h.net
        .settle_with_beneficiary(RELAYER, &hub, &promise, third, 2, &change(third, 2))
        .unwrap();
    assert_eq!(h.net.balance_of(&third), 40);
    assert_eq!(h.net.balance_of(&second), 0);
    assert_eq!(h.net.registry().beneficiary(&provider.address()), Some(third));
}

#[test]
fn withdrawal_and_dex_variants() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 0, 0, 100_000);
    h.net.seed_pool(10_000_000, 5_000_000).unwrap();
    h.net.mint(&hub, 1_000).unwrap();

    let provider = Wallet::generate();
    let beneficiary = Address([0xb1; 20]);
    h.register(&provider, hub, 0, 0, beneficiary).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 100, 0);
    let receipt = h.net.settle_with_dex(RELAYER, &hub, &promise).unwrap();
    assert_eq!(receipt.payout, 49);
    assert_eq!(h.net.native_balance_of(&beneficiary), 49);

    // Withdrawal channel: the identity picks the beneficiary per promise.
    let channel_id = ChannelId::with_purpose(
        &provider.address(),
        &hub,
        constants::WITHDRAWAL_PURPOSE,
    );
    let preimage = Preimage::random();
    let domain = h.hub_domain(&hub);
    let signature = operator.sign(
        &HubPromise {
            channel_id,
            amount: 200,
            fee: 2,
            hashlock: preimage.hashlock(),
        },
        &domain,
    );
    let payee = Address([0xe1; 20]);
    let identity_signature = provider.sign(
        &WithdrawalBeneficiary {
            channel_id,
            amount: 200,
            preimage,
            beneficiary: payee,
        },
        &domain,
    );
    let withdrawal = SignedPromise {
        identity: provider.address(),
        amount: 200,
        fee: 2,
        preimage,
        signature,
    };
    h.net
        .pay_and_settle(RELAYER, &hub, &withdrawal, payee, &identity_signature)
        .unwrap();
    assert_eq!(h.net.balance_of(&payee), 198);
    assert_eq!(h.net.available_balance(&hub), 700);
    h.net.verify_supply().unwrap();
}

#[test]
fn settle_into_stake_through_network() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 0, 300, 0, 100_000);
    h.net.mint(&hub, 1_000).unwrap();
    let provider = Wallet::generate();
    h.register(&provider, hub, 0, 0, Address([0xb1; 20])).unwrap();
    let promise = h.promise(&operator, &hub, &provider.address(), 400, 0);

    h.net.settle_into_stake(RELAYER, &hub, &promise).unwrap();

    let state = h.net.registry().hub(&hub).unwrap();
    assert_eq!(state.total_stake(), 400);
    assert_eq!(state.channel(&state.channel_id(&provider.address())).unwrap().stake, 400);
    assert_eq!(h.net.available_balance(&hub), 600);
}

// =========================================================================
// Hub lifecycle
// =========================================================================

#[test]
fn owner_custody_and_closing_timelock() {
    let mut h = Harness::new();
    let operator = Wallet::generate();
    let hub = h.register_hub(&operator, 500, 0, 0, 100_000);
    h.net.mint(&hub, 300).unwrap();
    let owner = Address([0x0b; 20]);
    h.net
        .transfer_hub_ownership(operator.address(), &hub, owner)
        .unwrap();

    let err = h
        .net
        .withdraw(operator.address(), &hub, &owner, 100)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::Unauthorized { .. }));
    h.net.withdraw(owner, &hub, &owner, 300).unwrap();
    assert_eq!(h.net.balance_of(&owner), 300);
    assert!(h.net.withdraw(owner, &hub, &owner, 1).is_err());

    let unlock_at = h.net.close_hub(operator.address(), &hub).unwrap();
    assert_eq!(unlock_at, h.net.now() + 50);
    let provider = Wallet::generate();
    let err = h
        .register(&provider, hub, 0, 0, Address([0xb1; 20]))
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::InvalidState { status: HubStatus::Closed, .. }));

    let payout = Address([0x0c; 20]);
    let err = h
        .net
        .get_stake_back(operator.address(), &hub, &payout)
        .unwrap_err();
    assert!(matches!(err, ImaginovationError::TimelockActive { .. }));
    h.clock.advance(51);
    assert_eq!(h.net.get_stake_back(operator.address(), &hub, &payout).unwrap(), 500);
    assert_eq!(h.net.balance_of(&payout), 500);
    h.net.verify_supply().unwrap();
}
