//! Signature verification and signer recovery.
//!
//! Signatures are ed25519. The envelope carries the signer's verifying key,
//! so "recovering" the signer means verifying the signature against that key
//! and deriving the key's address. A signature made by any other key either
//! fails verification or recovers to a different address, which callers
//! compare against the expected signer.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Address, Domain, ImaginovationError, Result, SignedMessage};

/// A detached ed25519 signature together with the key that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub public_key: VerifyingKey,
    pub inner: ed25519_dalek::Signature,
}

impl Signature {
    /// Address of the embedded key, without checking the signature.
    #[must_use]
    pub fn claimed_signer(&self) -> Address {
        Address::from_public_key(self.public_key.as_bytes())
    }
}

/// Recovers the address that signed `digest`.
///
/// # Errors
/// Returns [`ImaginovationError::InvalidSignature`] when the signature does
/// not verify against the embedded key.
pub fn recover_signer(digest: &[u8; 32], signature: &Signature) -> Result<Address> {
    signature
        .public_key
        .verify(digest, &signature.inner)
        .map_err(|e| ImaginovationError::InvalidSignature {
            reason: format!("verification failed: {e}"),
        })?;
    Ok(signature.claimed_signer())
}

/// Recovers the signer of `message` under `domain` and checks it is `expected`.
pub fn verify_signer<M: SignedMessage>(
    message: &M,
    domain: &Domain,
    signature: &Signature,
    expected: &Address,
) -> Result<()> {
    let signer = recover_signer(&message.digest(domain), signature)?;
    if signer != *expected {
        return Err(ImaginovationError::InvalidSignature {
            reason: format!("{} signed by {signer}, expected {expected}", M::KIND),
        });
    }
    Ok(())
}

/// An ed25519 keypair able to sign protocol messages.
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Deterministic wallet from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Fresh random wallet.
    #[cfg(feature = "test-helpers")]
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_public_key(self.signing_key.verifying_key().as_bytes())
    }

    /// Signs a raw 32-byte digest.
    #[must_use]
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Signature {
        Signature {
            public_key: self.signing_key.verifying_key(),
            inner: self.signing_key.sign(digest),
        }
    }

    /// Signs `message` bound to `domain`.
    #[must_use]
    pub fn sign<M: SignedMessage>(&self, message: &M, domain: &Domain) -> Signature {
        self.sign_digest(&message.digest(domain))
    }
}
