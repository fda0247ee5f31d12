//! NUT-00: Notation and models
//!
//! Blinded messages, blind signatures, proofs, and the in-memory
//! pre-mint bundle that keeps each output's secret and blinding factor
//! together for the duration of an operation.

use core::fmt;
use std::str::FromStr;
use std::string::FromUtf8Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut01::{PublicKey, SecretKey};
use super::nut02::KeysetId;
use crate::dhke::{blind_message, hash_to_curve};
use crate::secret::Secret;
use crate::{derivation, Amount};

pub mod token;
pub use token::{Token, TokenEntry};

/// List of [`Proof`]
pub type Proofs = Vec<Proof>;

/// NUT-00 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Proofs required in token
    #[error("Proofs required in token")]
    ProofsRequired,
    /// Unsupported token
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Serde Json error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Utf8 parse error
    #[error(transparent)]
    Utf8Parse(#[from] FromUtf8Error),
    /// Base64 error
    #[error(transparent)]
    Base64(#[from] bitcoin::base64::DecodeError),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
}

/// Currency unit of an amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyUnit {
    /// Satoshi
    #[default]
    Sat,
    /// Millisatoshi
    Msat,
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyUnit::Sat => write!(f, "sat"),
            CurrencyUnit::Msat => write!(f, "msat"),
        }
    }
}

/// Blinded message (also called `output`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// The value requested for the matching [`BlindSignature`]
    pub amount: Amount,
    /// Id of the keyset we expect a signature from
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Blinded secret message (`B_ = Y + rG`)
    #[serde(rename = "B_")]
    pub blinded_secret: PublicKey,
}

impl BlindedMessage {
    /// Compose new blinded message
    #[inline]
    pub fn new(amount: Amount, keyset_id: KeysetId, blinded_secret: PublicKey) -> Self {
        Self {
            amount,
            keyset_id,
            blinded_secret,
        }
    }
}

/// Blind signature (also called `promise`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    /// The value of the blinded token
    pub amount: Amount,
    /// Id of the mint keys that signed
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Blinded signature on the secret message (`C_ = kB_`)
    #[serde(rename = "C_")]
    pub c: PublicKey,
}

/// A spendable bearer token
///
/// Two proofs with the same `C` are the same proof; stores key on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Amount,
    /// Id of the keyset that signed the proof
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Secret message
    pub secret: Secret,
    /// Unblinded mint signature (`C = C_ - rK`)
    #[serde(rename = "C")]
    pub c: PublicKey,
}

impl Proof {
    /// Create new [`Proof`]
    pub fn new(amount: Amount, keyset_id: KeysetId, secret: Secret, c: PublicKey) -> Self {
        Proof {
            amount,
            keyset_id,
            secret,
            c,
        }
    }

    /// The point the mint observes for this proof's secret,
    /// `Y = hash_to_curve(secret)`
    pub fn y(&self) -> Result<PublicKey, Error> {
        Ok(hash_to_curve(self.secret.as_bytes())?)
    }
}

/// Utility methods for [`Proofs`]
pub trait ProofsMethods {
    /// Try to sum up the amounts of all proofs
    fn total_amount(&self) -> Result<Amount, Error>;

    /// The `Y` points of all proofs
    fn ys(&self) -> Result<Vec<PublicKey>, Error>;
}

impl ProofsMethods for Proofs {
    fn total_amount(&self) -> Result<Amount, Error> {
        Amount::try_sum(self.iter().map(|p| p.amount)).map_err(Into::into)
    }

    fn ys(&self) -> Result<Vec<PublicKey>, Error> {
        self.iter().map(Proof::y).collect()
    }
}

/// Secret, blinding factor and blinded message of a single planned output
///
/// The secret material never leaves the process; it lives here, next to
/// the output it belongs to, until the operation commits or aborts.
pub struct PreMint {
    /// Blinded message to send to the mint
    pub blinded_message: BlindedMessage,
    /// Secret of the future proof
    pub secret: Secret,
    /// Blinding factor
    pub r: SecretKey,
    /// Value of the output
    pub amount: Amount,
}

impl fmt::Debug for PreMint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreMint")
            .field("blinded_message", &self.blinded_message)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// The planned outputs of one operation, in the order they were planned
#[derive(Debug, Default)]
pub struct PreMintSecrets {
    /// Planned outputs
    pub secrets: Vec<PreMint>,
}

impl PreMintSecrets {
    /// Plan and blind outputs for `amount` using the binary split
    pub fn random(keyset_id: KeysetId, amount: Amount) -> Result<Self, Error> {
        Self::from_parts(keyset_id, amount.split())
    }

    /// Plan and blind one output per power of two up to `amount`
    ///
    /// Used for melt change, where the mint signs the subset summing to
    /// whatever change is actually owed.
    pub fn ladder(keyset_id: KeysetId, amount: Amount) -> Result<Self, Error> {
        Self::from_parts(keyset_id, amount.ladder())
    }

    fn from_parts(keyset_id: KeysetId, parts: Vec<Amount>) -> Result<Self, Error> {
        let mut secrets = Vec::with_capacity(parts.len());

        for amount in parts {
            let secret = Secret::generate();
            let (blinded, r) = blind_message(secret.as_bytes(), None)?;

            secrets.push(PreMint {
                blinded_message: BlindedMessage::new(amount, keyset_id.clone(), blinded),
                secret,
                r,
                amount,
            });
        }

        Ok(Self { secrets })
    }

    /// Blind the deterministic outputs for restore indices
    /// `start..start + count`, in ascending index order
    ///
    /// Returns the bundle together with the index of each entry; amounts
    /// are zero because the mint, not the wallet, knows the values it
    /// once signed.
    pub fn restore_batch(
        seed: &[u8],
        keyset_id: KeysetId,
        start: u32,
        count: u32,
    ) -> Result<(Self, Vec<u32>), Error> {
        let mut secrets = Vec::with_capacity(count as usize);
        let mut indices = Vec::with_capacity(count as usize);

        for index in start..start + count {
            let (secret, r) = derivation::derive_restore_secrets(seed, &keyset_id, index);
            let (blinded, r) = blind_message(secret.as_bytes(), Some(r))?;

            secrets.push(PreMint {
                blinded_message: BlindedMessage::new(Amount::ZERO, keyset_id.clone(), blinded),
                secret,
                r,
                amount: Amount::ZERO,
            });
            indices.push(index);
        }

        Ok((Self { secrets }, indices))
    }

    /// The blinded messages, in planning order
    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets
            .iter()
            .map(|pre| pre.blinded_message.clone())
            .collect()
    }

    /// Iterate over the planned outputs
    pub fn iter(&self) -> impl Iterator<Item = &PreMint> {
        self.secrets.iter()
    }

    /// Number of planned outputs
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether anything was planned
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Total planned value
    pub fn total_amount(&self) -> Result<Amount, Error> {
        Amount::try_sum(self.secrets.iter().map(|pre| pre.amount)).map_err(Into::into)
    }

    /// Append the outputs of `other`, preserving order
    pub fn combine(&mut self, other: PreMintSecrets) {
        self.secrets.extend(other.secrets)
    }
}

impl FromStr for Proof {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_wire_format() {
        let json = r#"{
            "amount": 2,
            "id": "00ad268c4d1f5826",
            "secret": "407915bc212be61a77e3e6d2aeb4c727980bda51cd06a6afc29e2861768a7837",
            "C": "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        }"#;

        let proof: Proof = serde_json::from_str(json).unwrap();
        assert_eq!(proof.amount, Amount::from(2));
        assert_eq!(proof.keyset_id.as_str(), "00ad268c4d1f5826");

        let value = serde_json::to_value(&proof).unwrap();
        assert!(value.get("C").is_some());
        assert!(value.get("id").is_some());
        assert!(value.get("c").is_none());
        assert!(value.get("keyset_id").is_none());
    }

    #[test]
    fn test_premint_plans_binary_split() {
        let keyset_id = KeysetId::new("00ad268c4d1f5826");
        let premint = PreMintSecrets::random(keyset_id, Amount::from(100)).unwrap();

        let amounts: Vec<u64> = premint.iter().map(|p| p.amount.into()).collect();
        assert_eq!(amounts, vec![4, 32, 64]);
        assert_eq!(premint.total_amount().unwrap(), Amount::from(100));
    }

    #[test]
    fn test_premint_secrets_are_unique() {
        let keyset_id = KeysetId::new("00ad268c4d1f5826");
        let premint = PreMintSecrets::random(keyset_id, Amount::from(7)).unwrap();

        let mut secrets: Vec<&Secret> = premint.iter().map(|p| &p.secret).collect();
        secrets.sort();
        secrets.dedup();
        assert_eq!(secrets.len(), 3);
    }

    #[test]
    fn test_restore_batch_is_deterministic() {
        let seed = [7u8; 64];
        let keyset_id = KeysetId::new("00ad268c4d1f5826");

        let (first, indices) =
            PreMintSecrets::restore_batch(&seed, keyset_id.clone(), 0, 5).unwrap();
        let (second, _) = PreMintSecrets::restore_batch(&seed, keyset_id, 0, 5).unwrap();

        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(first.blinded_messages(), second.blinded_messages());
    }
}
