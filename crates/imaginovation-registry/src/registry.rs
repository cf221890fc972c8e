//! Identity and hub registry.
//!
//! Owns every deployed hub and consumer channel, the identity to
//! beneficiary book and the implementation versions new deployments use.

use std::collections::BTreeMap;

use imaginovation_channel::{ConsumerChannel, HubLink};
use imaginovation_hub::{Hub, HubParams, HubSetup};
use imaginovation_ledger::TokenLedger;
use imaginovation_types::{
    constants, verify_signer, Address, Amount, BeneficiaryBook, BeneficiaryChange, CallContext,
    ChannelLookup, ConsumerChannelOpening, Domain, IdentityRegistration, ImaginovationError,
    ProtocolConfig, Result, Signature, UrlUpdate,
};
use serde::{Deserialize, Serialize};

use crate::addressing;

/// Implementation pointers new proxies delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementations {
    pub channel: Address,
    pub hub: Address,
}

/// Arguments of [`Registry::register_hub`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubRegistration {
    /// Key that signs hub promises. Need not be the caller.
    pub operator: Address,
    pub stake: Amount,
    pub fee_bps: u16,
    pub min_stake: Amount,
    pub max_stake: Amount,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub beneficiary: Address,
    /// Last nonce consumed by a beneficiary change.
    pub last_nonce: u64,
}

/// Identity to beneficiary mapping with nonce-protected changes.
#[derive(Debug, Clone)]
pub struct IdentityBook {
    domain: Domain,
    records: BTreeMap<Address, IdentityRecord>,
}

impl IdentityBook {
    fn new(domain: Domain) -> Self {
        Self {
            domain,
            records: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn record(&self, identity: &Address) -> Option<&IdentityRecord> {
        self.records.get(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn enroll(&mut self, identity: Address, beneficiary: Address) {
        self.records.entry(identity).or_insert(IdentityRecord {
            beneficiary,
            last_nonce: 0,
        });
    }
}

impl BeneficiaryBook for IdentityBook {
    fn beneficiary_of(&self, identity: &Address) -> Option<Address> {
        self.records.get(identity).map(|r| r.beneficiary)
    }

    fn change_beneficiary(
        &mut self,
        identity: &Address,
        new_beneficiary: Address,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        let message = BeneficiaryChange {
            new_beneficiary,
            nonce,
        };
        verify_signer(&message, &self.domain, signature, identity)?;
        let record = self
            .records
            .get_mut(identity)
            .ok_or(ImaginovationError::UnknownIdentity(*identity))?;
        if nonce <= record.last_nonce {
            return Err(ImaginovationError::StaleNonce {
                last: record.last_nonce,
                got: nonce,
            });
        }
        record.beneficiary = new_beneficiary;
        record.last_nonce = nonce;
        tracing::info!(identity = %identity, beneficiary = %new_beneficiary, nonce, "Beneficiary changed");
        Ok(())
    }
}

/// A hub together with its registry-side metadata.
#[derive(Debug, Clone)]
pub struct HubDeployment {
    pub hub: Hub,
    pub url: String,
    pub url_nonce: u64,
    /// Implementation version the hub was deployed under.
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct Registry {
    address: Address,
    owner: Address,
    params: HubParams,
    min_hub_stake: Amount,
    version: u64,
    current: Implementations,
    implementations: BTreeMap<u64, Implementations>,
    hubs: BTreeMap<Address, HubDeployment>,
    /// Operator to hub address per implementation version.
    hubs_by_operator: BTreeMap<Address, BTreeMap<u64, Address>>,
    channels: BTreeMap<Address, ConsumerChannel>,
    channel_pairs: BTreeMap<(Address, Address), Address>,
    book: IdentityBook,
}

impl Registry {
    #[must_use]
    pub fn new(
        address: Address,
        owner: Address,
        config: &ProtocolConfig,
        implementations: Implementations,
    ) -> Self {
        let version = constants::INITIAL_IMPLEMENTATION_VERSION;
        Self {
            address,
            owner,
            params: HubParams::from(config),
            min_hub_stake: config.min_hub_stake,
            version,
            current: implementations,
            implementations: BTreeMap::from([(version, implementations)]),
            hubs: BTreeMap::new(),
            hubs_by_operator: BTreeMap::new(),
            channels: BTreeMap::new(),
            channel_pairs: BTreeMap::new(),
            book: IdentityBook::new(Domain::new(config.chain_id, address)),
        }
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
        self.owner
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        Domain::new(self.params.chain_id, self.address)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn current_implementations(&self) -> Implementations {
        self.current
    }

    #[must_use]
    pub fn implementation(&self, version: u64) -> Option<Implementations> {
        self.implementations.get(&version).copied()
    }

    #[must_use]
    pub fn book(&self) -> &IdentityBook {
        &self.book
    }

    /// Consumer channel address of `(identity, hub)`: the deployed one, or
    /// where the current implementation would deploy it.
    #[must_use]
    pub fn get_channel_address(&self, identity: &Address, hub: &Address) -> Address {
        self.channel_pairs
            .get(&(*identity, *hub))
            .copied()
            .unwrap_or_else(|| {
                addressing::channel_address(&self.address, &self.current.channel, identity, hub)
            })
    }

    /// Address a hub registered now by `operator` would get.
    #[must_use]
    pub fn predict_hub_address(&self, operator: &Address) -> Address {
        addressing::hub_address(&self.address, &self.current.hub, operator, self.version)
    }

    /// Latest hub deployed by `operator`.
    #[must_use]
    pub fn get_hub_address(&self, operator: &Address) -> Option<Address> {
        self.hubs_by_operator
            .get(operator)
            .and_then(|by_version| by_version.last_key_value())
            .map(|(_, address)| *address)
    }

    #[must_use]
    pub fn is_registered(&self, identity: &Address) -> bool {
        self.book.record(identity).is_some()
    }

    #[must_use]
    pub fn is_hub(&self, address: &Address) -> bool {
        self.hubs.contains_key(address)
    }

    #[must_use]
    pub fn beneficiary(&self, identity: &Address) -> Option<Address> {
        self.book.beneficiary_of(identity)
    }

    #[must_use]
    pub fn hub(&self, address: &Address) -> Option<&Hub> {
        self.hubs.get(address).map(|d| &d.hub)
    }

    #[must_use]
    pub fn deployment(&self, address: &Address) -> Option<&HubDeployment> {
        self.hubs.get(address)
    }

    #[must_use]
    pub fn hub_url(&self, address: &Address) -> Option<&str> {
        self.hubs.get(address).map(|d| d.url.as_str())
    }

    #[must_use]
    pub fn channel(&self, address: &Address) -> Option<&ConsumerChannel> {
        self.channels.get(address)
    }

    #[must_use]
    pub fn consumer_channel(&self, identity: &Address, hub: &Address) -> Option<&ConsumerChannel> {
        self.channel_pairs
            .get(&(*identity, *hub))
            .and_then(|address| self.channels.get(address))
    }

    #[must_use]
    pub fn hub_count(&self) -> usize {
        self.hubs.len()
    }

    pub fn hub_mut(&mut self, address: &Address) -> Result<&mut Hub> {
        self.hubs
            .get_mut(address)
            .map(|d| &mut d.hub)
            .ok_or(ImaginovationError::UnknownHub(*address))
    }

    /// The hub and the beneficiary book, borrowed together for settlement.
    pub fn hub_and_book_mut(&mut self, address: &Address) -> Result<(&mut Hub, &mut IdentityBook)> {
        let deployment = self
            .hubs
            .get_mut(address)
            .ok_or(ImaginovationError::UnknownHub(*address))?;
        Ok((&mut deployment.hub, &mut self.book))
    }

    pub fn channel_mut(&mut self, address: &Address) -> Result<&mut ConsumerChannel> {
        self.channels
            .get_mut(address)
            .ok_or(ImaginovationError::UnknownChannel(*address))
    }

    // -----------------------------------------------------------------
    // Hubs
    // -----------------------------------------------------------------

    /// Deploys a hub for `request.operator`. The stake is pulled from the
    /// caller, who must have approved the registry.
    pub fn register_hub<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        request: &HubRegistration,
    ) -> Result<Address> {
        let operator = request.operator;
        if request.stake < self.min_hub_stake {
            return Err(ImaginovationError::BelowMinimumStake {
                stake: request.stake,
                min: self.min_hub_stake,
            });
        }
        if let Some(existing) = self
            .hubs_by_operator
            .get(&operator)
            .and_then(|by_version| by_version.get(&self.version))
        {
            return Err(ImaginovationError::DuplicateHub(*existing));
        }
        let address = self.predict_hub_address(&operator);
        let hub = Hub::new(
            HubSetup {
                address,
                operator,
                hub_stake: request.stake,
                fee_bps: request.fee_bps,
                min_stake: request.min_stake,
                max_stake: request.max_stake,
            },
            self.params,
            ctx.now,
        )?;
        ledger.transfer_from(&self.address, &ctx.caller, &address, request.stake)?;

        self.hubs.insert(
            address,
            HubDeployment {
                hub,
                url: request.url.clone(),
                url_nonce: 0,
                version: self.version,
            },
        );
        self.hubs_by_operator
            .entry(operator)
            .or_default()
            .insert(self.version, address);
        tracing::info!(
            hub = %address,
            operator = %operator,
            funder = %ctx.caller,
            stake = request.stake,
            fee_bps = request.fee_bps,
            version = self.version,
            "Hub registered"
        );
        Ok(address)
    }

    /// Replaces a hub's URL on an operator-signed request.
    pub fn update_hub_url(
        &mut self,
        hub: &Address,
        url: String,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        let domain = self.domain();
        let deployment = self
            .hubs
            .get_mut(hub)
            .ok_or(ImaginovationError::UnknownHub(*hub))?;
        let message = UrlUpdate {
            hub: *hub,
            url,
            nonce,
        };
        verify_signer(&message, &domain, signature, &deployment.hub.operator())?;
        if nonce <= deployment.url_nonce {
            return Err(ImaginovationError::StaleNonce {
                last: deployment.url_nonce,
                got: nonce,
            });
        }
        deployment.url = message.url;
        deployment.url_nonce = nonce;
        tracing::info!(hub = %hub, url = %deployment.url, nonce, "Hub url updated");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Identities
    // -----------------------------------------------------------------

    /// Registers `identity` with a hub on its signed request and deploys its
    /// consumer channel. The channel address must already hold
    /// `stake + fee`: the fee goes to the caller and the stake into the hub.
    pub fn register_identity<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        identity: &Address,
        registration: &IdentityRegistration,
        signature: &Signature,
    ) -> Result<ChannelLookup<Address>> {
        if !self.is_hub(&registration.hub) {
            return Err(ImaginovationError::UnknownHub(registration.hub));
        }
        verify_signer(registration, &self.domain(), signature, identity)?;
        self.enroll(
            ctx,
            ledger,
            *identity,
            registration.hub,
            registration.stake,
            registration.fee,
            registration.beneficiary,
        )
    }

    /// Zero-stake registration whose beneficiary is the consumer channel
    /// itself.
    pub fn open_consumer_channel<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        identity: &Address,
        opening: &ConsumerChannelOpening,
        signature: &Signature,
    ) -> Result<ChannelLookup<Address>> {
        if !self.is_hub(&opening.hub) {
            return Err(ImaginovationError::UnknownHub(opening.hub));
        }
        verify_signer(opening, &self.domain(), signature, identity)?;
        let channel = self.get_channel_address(identity, &opening.hub);
        self.enroll(ctx, ledger, *identity, opening.hub, 0, opening.fee, channel)
    }

    #[allow(clippy::too_many_arguments)]
    fn enroll<L: TokenLedger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        identity: Address,
        hub_address: Address,
        stake: Amount,
        fee: Amount,
        beneficiary: Address,
    ) -> Result<ChannelLookup<Address>> {
        if let Some(current) = self.book.beneficiary_of(&identity) {
            if current != beneficiary {
                return Err(ImaginovationError::AlreadyRegistered(identity));
            }
        }
        let channel_address = self.get_channel_address(&identity, &hub_address);
        if self.channel_pairs.contains_key(&(identity, hub_address)) {
            return Ok(ChannelLookup::Existing(channel_address));
        }

        let deployment = self
            .hubs
            .get_mut(&hub_address)
            .ok_or(ImaginovationError::UnknownHub(hub_address))?;
        deployment.hub.ensure_open_for_registration()?;
        let needed = stake
            .checked_add(fee)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "registration" })?;
        let available = ledger.balance_of(&channel_address);
        if available < needed {
            return Err(ImaginovationError::InsufficientFunds { needed, available });
        }
        if stake > 0 {
            deployment.hub.open_channel(&identity, stake)?;
        }
        let link = HubLink {
            contract: hub_address,
            operator: deployment.hub.operator(),
        };
        ledger.transfer(&channel_address, &ctx.caller, fee)?;
        ledger.transfer(&channel_address, &hub_address, stake)?;

        self.channels.insert(
            channel_address,
            ConsumerChannel::new(channel_address, identity, link, self.params.chain_id),
        );
        self.channel_pairs
            .insert((identity, hub_address), channel_address);
        self.book.enroll(identity, beneficiary);
        tracing::info!(
            identity = %identity,
            hub = %hub_address,
            channel = %channel_address,
            stake,
            fee,
            "Identity registered"
        );
        Ok(ChannelLookup::Created(channel_address))
    }

    pub fn set_beneficiary(
        &mut self,
        identity: &Address,
        new_beneficiary: Address,
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        self.book
            .change_beneficiary(identity, new_beneficiary, nonce, signature)
    }

    // -----------------------------------------------------------------
    // Owner actions
    // -----------------------------------------------------------------

    fn ensure_owner(&self, ctx: &CallContext, action: &str) -> Result<()> {
        if ctx.caller != self.owner {
            return Err(ImaginovationError::Unauthorized {
                reason: format!("{action} requires registry owner, caller {}", ctx.caller),
            });
        }
        Ok(())
    }

    /// Points new deployments at new implementations and bumps the version.
    /// Existing hubs and channels are unaffected.
    pub fn set_implementations(
        &mut self,
        ctx: &CallContext,
        implementations: Implementations,
    ) -> Result<u64> {
        self.ensure_owner(ctx, "set implementations")?;
        if implementations.channel.is_zero() || implementations.hub.is_zero() {
            return Err(ImaginovationError::InvalidImplementation {
                reason: "implementation address is zero".into(),
            });
        }
        if implementations == self.current {
            return Err(ImaginovationError::InvalidImplementation {
                reason: "implementations unchanged".into(),
            });
        }
        let version = self
            .version
            .checked_add(1)
            .ok_or(ImaginovationError::ArithmeticOverflow { context: "implementation version" })?;
        self.version = version;
        self.current = implementations;
        self.implementations.insert(version, implementations);
        tracing::info!(
            version,
            channel = %implementations.channel,
            hub = %implementations.hub,
            "Implementations updated"
        );
        Ok(version)
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        self.ensure_owner(ctx, "transfer registry ownership")?;
        self.owner = new_owner;
        tracing::info!(owner = %new_owner, "Registry ownership transferred");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imaginovation_ledger::Ledger;
    use imaginovation_types::Wallet;

    const REGISTRY: Address = Address([0xaa; 20]);
    const OWNER: Address = Address([0x0a; 20]);

    fn registry() -> Registry {
        Registry::new(
            REGISTRY,
            OWNER,
            &ProtocolConfig::default(),
            Implementations {
                channel: Address([0xc1; 20]),
                hub: Address([0xb1; 20]),
            },
        )
    }

    fn hub_request(operator: Address, stake: Amount) -> HubRegistration {
        HubRegistration {
            operator,
            stake,
            fee_bps: 100,
            min_stake: 0,
            max_stake: 1_000,
            url: "https://hub.example".into(),
        }
    }

    fn funded_operator(ledger: &mut Ledger, operator: Address, amount: Amount) {
        ledger.mint(&operator, amount).unwrap();
        ledger.approve(&operator, &REGISTRY, amount);
    }

    #[test]
    fn hub_lands_at_predicted_address() {
        let mut reg = registry();
        let mut ledger = Ledger::new(Address([0xee; 20]));
        let operator = Address([1; 20]);
        funded_operator(&mut ledger, operator, 500);
        let predicted = reg.predict_hub_address(&operator);

        let hub = reg
            .register_hub(&CallContext::new(operator, 10), &mut ledger, &hub_request(operator, 500))
            .unwrap();

        assert_eq!(hub, predicted);
        assert_eq!(reg.get_hub_address(&operator), Some(hub));
        assert_eq!(ledger.balance_of(&hub), 500);
        assert_eq!(reg.hub(&hub).unwrap().hub_stake(), 500);
        assert_eq!(reg.hub_url(&hub), Some("https://hub.example"));
    }

    #[test]
    fn relayer_funds_hub_for_unfunded_operator() {
        let mut reg = registry();
        let mut ledger = Ledger::new(Address([0xee; 20]));
        let operator = Address([1; 20]);
        let relayer = Address([2; 20]);
        funded_operator(&mut ledger, relayer, 500);

        let hub = reg
            .register_hub(&CallContext::new(relayer, 10), &mut ledger, &hub_request(operator, 500))
            .unwrap();

        assert_eq!(hub, reg.predict_hub_address(&operator));
        assert_eq!(reg.get_hub_address(&operator), Some(hub));
        assert_eq!(reg.get_hub_address(&relayer), None);
        assert_eq!(reg.hub(&hub).unwrap().operator(), operator);
        assert_eq!(ledger.balance_of(&relayer), 0);
        assert_eq!(ledger.balance_of(&operator), 0);
        assert_eq!(ledger.balance_of(&hub), 500);
    }

    #[test]
    fn one_hub_per_operator_per_version() {
        let mut reg = registry();
        let mut ledger = Ledger::new(Address([0xee; 20]));
        let operator = Address([1; 20]);
        funded_operator(&mut ledger, operator, 1_000);
        let ctx = CallContext::new(operator, 10);
        let first = reg.register_hub(&ctx, &mut ledger, &hub_request(operator, 100)).unwrap();
        let err = reg
            .register_hub(&ctx, &mut ledger, &hub_request(operator, 100))
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::DuplicateHub(a) if a == first));

        reg.set_implementations(
            &CallContext::new(OWNER, 11),
            Implementations {
                channel: Address([0xc2; 20]),
                hub: Address([0xb2; 20]),
            },
        )
        .unwrap();
        let second = reg.register_hub(&ctx, &mut ledger, &hub_request(operator, 100)).unwrap();
        assert_ne!(first, second);
        assert_eq!(reg.get_hub_address(&operator), Some(second));
        assert_eq!(reg.deployment(&first).unwrap().version, 1);
        assert_eq!(reg.hub_count(), 2);
    }

    #[test]
    fn hub_stake_floor_and_approval_enforced() {
        let config = ProtocolConfig {
            min_hub_stake: 200,
            ..ProtocolConfig::default()
        };
        let mut reg = Registry::new(
            REGISTRY,
            OWNER,
            &config,
            Implementations {
                channel: Address([0xc1; 20]),
                hub: Address([0xb1; 20]),
            },
        );
        let mut ledger = Ledger::new(Address([0xee; 20]));
        let operator = Address([1; 20]);
        ledger.mint(&operator, 1_000).unwrap();
        let ctx = CallContext::new(operator, 10);

        let err = reg
            .register_hub(&ctx, &mut ledger, &hub_request(operator, 100))
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::BelowMinimumStake { stake: 100, min: 200 }));
        let err = reg
            .register_hub(&ctx, &mut ledger, &hub_request(operator, 300))
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::InsufficientAllowance { .. }));
        assert_eq!(reg.hub_count(), 0);
    }

    #[test]
    fn implementations_are_owner_only_and_must_change() {
        let mut reg = registry();
        let current = reg.current_implementations();
        let err = reg
            .set_implementations(&CallContext::new(Address([9; 20]), 1), current)
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::Unauthorized { .. }));
        let owner = CallContext::new(OWNER, 1);
        let err = reg.set_implementations(&owner, current).unwrap_err();
        assert!(matches!(err, ImaginovationError::InvalidImplementation { .. }));
        let err = reg
            .set_implementations(
                &owner,
                Implementations {
                    channel: Address::ZERO,
                    hub: Address([0xb2; 20]),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::InvalidImplementation { .. }));
        assert_eq!(reg.version(), 1);
        assert_eq!(reg.implementation(1), Some(current));
    }

    #[test]
    fn beneficiary_change_requires_fresh_nonce() {
        let mut reg = registry();
        let identity = Wallet::from_seed(&[3; 32]);
        reg.book.enroll(identity.address(), Address([4; 20]));
        let new_beneficiary = Address([5; 20]);
        let sign = |nonce| {
            identity.sign(
                &BeneficiaryChange {
                    new_beneficiary,
                    nonce,
                },
                &reg.domain(),
            )
        };
        let first = sign(3);
        let lower = sign(2);

        reg.set_beneficiary(&identity.address(), new_beneficiary, 3, &first)
            .unwrap();
        assert_eq!(reg.beneficiary(&identity.address()), Some(new_beneficiary));
        let err = reg
            .set_beneficiary(&identity.address(), new_beneficiary, 3, &first)
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::StaleNonce { last: 3, got: 3 }));
        let err = reg
            .set_beneficiary(&identity.address(), new_beneficiary, 2, &lower)
            .unwrap_err();
        assert!(matches!(err, ImaginovationError::StaleNonce { .. }));
    }
}
