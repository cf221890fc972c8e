//! Canonical signed payloads.
//!
//! Every payload is a fixed-field tuple. Its digest is
//!
//! ```text
//! sha256("imaginovation:<kind>:v1:" || chain_id || contract || fields...)
//! ```
//!
//! where `chain_id` is a big-endian `u64` and `contract` is the address of
//! the component that verifies the signature (registry, hub or consumer
//! channel). Amounts are big-endian `u128`, nonces and timestamps big-endian
//! `u64`, strings are length-prefixed. Binding the chain and contract stops a
//! signature from being replayed against another deployment.

use serde::{Deserialize, Serialize};

use crate::{sha256, Address, Amount, ChannelId, Hashlock, Preimage, Timestamp};

/// Chain and contract a signature is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    #[must_use]
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            chain_id,
            verifying_contract,
        }
    }
}

/// A payload that can be signed and verified.
pub trait SignedMessage {
    /// Short name used in the domain tag and in error messages.
    const KIND: &'static str;

    /// Appends the message fields in canonical order.
    fn encode_fields(&self, out: &mut Vec<u8>);

    /// Canonical digest under `domain`.
    fn digest(&self, domain: &Domain) -> [u8; 32] {
        let mut payload = Vec::with_capacity(192);
        payload.extend_from_slice(b"imaginovation:");
        payload.extend_from_slice(Self::KIND.as_bytes());
        payload.extend_from_slice(b":v1:");
        payload.extend_from_slice(&domain.chain_id.to_be_bytes());
        payload.extend_from_slice(&domain.verifying_contract.0);
        self.encode_fields(&mut payload);
        sha256(&[&payload])
    }
}

fn put_amount(out: &mut Vec<u8>, amount: Amount) {
    out.extend_from_slice(&amount.to_be_bytes());
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u64).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Identity registration, verified by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRegistration {
    pub hub: Address,
    pub stake: Amount,
    pub fee: Amount,
    pub beneficiary: Address,
}

impl SignedMessage for IdentityRegistration {
    const KIND: &'static str = "register";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hub.0);
        put_amount(out, self.stake);
        put_amount(out, self.fee);
        out.extend_from_slice(&self.beneficiary.0);
    }
}

/// Consumer channel opening: a zero-stake registration paying out to the
/// channel itself. Verified by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerChannelOpening {
    pub hub: Address,
    pub fee: Amount,
}

impl SignedMessage for ConsumerChannelOpening {
    const KIND: &'static str = "open-consumer";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hub.0);
        put_amount(out, self.fee);
    }
}

/// Beneficiary change, verified by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryChange {
    pub new_beneficiary: Address,
    pub nonce: u64,
}

impl SignedMessage for BeneficiaryChange {
    const KIND: &'static str = "beneficiary";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.new_beneficiary.0);
        out.extend_from_slice(&self.nonce.to_be_bytes());
    }
}

/// Hub URL update, signed by the hub operator and verified by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlUpdate {
    pub hub: Address,
    pub url: String,
    pub nonce: u64,
}

impl SignedMessage for UrlUpdate {
    const KIND: &'static str = "url";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hub.0);
        put_str(out, &self.url);
        out.extend_from_slice(&self.nonce.to_be_bytes());
    }
}

/// Stake decrease, signed by the identity and verified by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeReturn {
    pub channel_id: ChannelId,
    pub amount: Amount,
    pub fee: Amount,
    pub nonce: u64,
}

impl SignedMessage for StakeReturn {
    const KIND: &'static str = "stake-return";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel_id.0);
        put_amount(out, self.amount);
        put_amount(out, self.fee);
        out.extend_from_slice(&self.nonce.to_be_bytes());
    }
}

/// Promise issued by the hub operator to a provider channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubPromise {
    pub channel_id: ChannelId,
    /// Cumulative amount promised to the channel so far.
    pub amount: Amount,
    /// Paid to whoever submits the settlement.
    pub fee: Amount,
    pub hashlock: Hashlock,
}

impl SignedMessage for HubPromise {
    const KIND: &'static str = "hub-promise";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel_id.0);
        put_amount(out, self.amount);
        put_amount(out, self.fee);
        out.extend_from_slice(&self.hashlock.0);
    }
}

/// Identity authorisation of where a withdrawal-channel payout goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalBeneficiary {
    pub channel_id: ChannelId,
    pub amount: Amount,
    pub preimage: Preimage,
    pub beneficiary: Address,
}

impl SignedMessage for WithdrawalBeneficiary {
    const KIND: &'static str = "withdrawal";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel_id.0);
        put_amount(out, self.amount);
        out.extend_from_slice(&self.preimage.0);
        out.extend_from_slice(&self.beneficiary.0);
    }
}

/// Promise issued by a consumer identity against its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePromise {
    pub channel: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub hashlock: Hashlock,
}

impl SignedMessage for ExchangePromise {
    const KIND: &'static str = "exchange-promise";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel.0);
        put_amount(out, self.amount);
        put_amount(out, self.fee);
        out.extend_from_slice(&self.hashlock.0);
    }
}

/// Fast exit from a consumer channel, co-signed by identity and hub operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastExit {
    pub channel: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub beneficiary: Address,
    pub valid_until: Timestamp,
    pub nonce: u64,
}

impl SignedMessage for FastExit {
    const KIND: &'static str = "fast-exit";

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.channel.0);
        put_amount(out, self.amount);
        put_amount(out, self.fee);
        out.extend_from_slice(&self.beneficiary.0);
        out.extend_from_slice(&self.valid_until.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
    }
}
