//! Deterministic proxy addresses.
//!
//! Every consumer channel and hub lives at a minimal-proxy address derived
//! from public inputs only, so anyone can compute (and fund) a channel
//! before it is registered:
//!
//! ```text
//! code    = 363d3d373d3d3d363d73 || implementation || 5af43d82803e903d91602b57fd5bf3
//! address = sha256(0xff || registry || salt || sha256(code))[12..32]
//! ```

use imaginovation_types::{sha256, Address};

const PROXY_PREFIX: [u8; 10] = [0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73];
const PROXY_SUFFIX: [u8; 15] = [
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

/// Minimal-proxy bytecode delegating to `implementation`.
#[must_use]
pub fn proxy_code(implementation: &Address) -> Vec<u8> {
    let mut code = Vec::with_capacity(PROXY_PREFIX.len() + 20 + PROXY_SUFFIX.len());
    code.extend_from_slice(&PROXY_PREFIX);
    code.extend_from_slice(implementation.as_bytes());
    code.extend_from_slice(&PROXY_SUFFIX);
    code
}

#[must_use]
pub fn deterministic_address(deployer: &Address, salt: &[u8; 32], implementation: &Address) -> Address {
    let code_hash = sha256(&[&proxy_code(implementation)]);
    Address::from_hash_tail(&sha256(&[&[0xff], deployer.as_bytes(), salt, &code_hash]))
}

#[must_use]
pub fn channel_salt(identity: &Address, hub: &Address) -> [u8; 32] {
    sha256(&[identity.as_bytes(), hub.as_bytes()])
}

#[must_use]
pub fn hub_salt(operator: &Address, version: u64) -> [u8; 32] {
    sha256(&[operator.as_bytes(), &version.to_be_bytes()])
}

/// Consumer channel address of `(identity, hub)`.
#[must_use]
pub fn channel_address(
    registry: &Address,
    channel_implementation: &Address,
    identity: &Address,
    hub: &Address,
) -> Address {
    deterministic_address(registry, &channel_salt(identity, hub), channel_implementation)
}

/// Hub address of `operator` under implementation `version`.
#[must_use]
pub fn hub_address(
    registry: &Address,
    hub_implementation: &Address,
    operator: &Address,
    version: u64,
) -> Address {
    deterministic_address(registry, &hub_salt(operator, version), hub_implementation)
}
