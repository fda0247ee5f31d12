//! NUT-01: Mint public keys
//!
//! Key newtypes over secp256k1 plus the per-denomination key map of a
//! keyset. The point arithmetic the blinding engine needs (combine,
//! negate, scalar multiply) is exposed here so callers never touch the
//! raw secp256k1 types.

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;
use std::collections::BTreeMap;

use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::{self, Scalar};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{Amount, SECP256K1};

/// NUT-01 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid public key size
    #[error("Invalid public key size: expected={expected}, found={found}")]
    InvalidPublicKeySize {
        /// Expected size
        expected: usize,
        /// Actual size
        found: usize,
    },
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] secp256k1::Error),
}

/// Public key, a point on the curve in 33-byte compressed form
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Deref for PublicKey {
    type Target = secp256k1::PublicKey;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<secp256k1::PublicKey> for PublicKey {
    fn from(inner: secp256k1::PublicKey) -> Self {
        Self { inner }
    }
}

impl PublicKey {
    /// Parse from 33 compressed bytes
    #[inline]
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            inner: secp256k1::PublicKey::from_slice(slice)?,
        })
    }

    /// Parse from `hex` string
    #[inline]
    pub fn from_hex<S>(hex: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        let hex: &str = hex.as_ref();

        if hex.len() != 33 * 2 {
            return Err(Error::InvalidPublicKeySize {
                expected: 33,
                found: hex.len() / 2,
            });
        }

        Ok(Self {
            inner: secp256k1::PublicKey::from_str(hex)?,
        })
    }

    /// Serialize to 33 compressed bytes
    #[inline]
    pub fn to_bytes(&self) -> [u8; 33] {
        self.inner.serialize()
    }

    /// Get public key as lowercase `hex` string
    #[inline]
    pub fn to_hex(&self) -> String {
        self.inner.to_string()
    }

    /// Point addition
    #[inline]
    pub fn combine(&self, other: &PublicKey) -> Result<PublicKey, Error> {
        Ok(self.inner.combine(&other.inner)?.into())
    }

    /// Point negation
    #[inline]
    pub fn negate(&self) -> PublicKey {
        self.inner.negate(&SECP256K1).into()
    }

    /// Scalar multiplication
    #[inline]
    pub fn mul_tweak(&self, scalar: &Scalar) -> Result<PublicKey, Error> {
        Ok(self.inner.mul_tweak(&SECP256K1, scalar)?.into())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Self::from_hex(hex)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let public_key: String = String::deserialize(deserializer)?;
        Self::from_hex(public_key).map_err(serde::de::Error::custom)
    }
}

/// Secret key
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    inner: secp256k1::SecretKey,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}

impl Deref for SecretKey {
    type Target = secp256k1::SecretKey;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<secp256k1::SecretKey> for SecretKey {
    fn from(inner: secp256k1::SecretKey) -> Self {
        Self { inner }
    }
}

impl SecretKey {
    /// Parse from `bytes`
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            inner: secp256k1::SecretKey::from_slice(slice)?,
        })
    }

    /// Parse 32 bytes as a scalar, reducing out-of-range candidates by
    /// re-hashing with SHA-256 until a valid scalar is found
    pub fn from_slice_reduced(bytes: &[u8; 32]) -> Self {
        let mut candidate: [u8; 32] = *bytes;
        loop {
            match secp256k1::SecretKey::from_slice(&candidate) {
                Ok(key) => return key.into(),
                Err(_) => candidate = Sha256Hash::hash(&candidate).to_byte_array(),
            }
        }
    }

    /// Parse from `hex` string
    pub fn from_hex<S>(hex: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            inner: secp256k1::SecretKey::from_str(hex.as_ref())?,
        })
    }

    /// Generate random secret key
    pub fn generate() -> Self {
        let (secret_key, _) = SECP256K1.generate_keypair(&mut OsRng);
        Self { inner: secret_key }
    }

    /// Get secret key as `hex` string
    pub fn to_secret_hex(&self) -> String {
        self.inner.display_secret().to_string()
    }

    /// Get secret key as `bytes`
    pub fn to_secret_bytes(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }

    /// Get public key
    pub fn public_key(&self) -> PublicKey {
        self.inner.public_key(&SECP256K1).into()
    }

    /// [`SecretKey`] as [`Scalar`]
    #[inline]
    pub fn as_scalar(&self) -> Scalar {
        Scalar::from(self.inner)
    }
}

impl FromStr for SecretKey {
    type Err = Error;

    fn from_str(secret_key: &str) -> Result<Self, Self::Err> {
        Self::from_hex(secret_key)
    }
}

/// Keyset public keys, one per denomination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keys(BTreeMap<Amount, PublicKey>);

impl Keys {
    /// Create new [`Keys`]
    pub fn new(keys: BTreeMap<Amount, PublicKey>) -> Self {
        Self(keys)
    }

    /// Public key for the given denomination
    pub fn amount_key(&self, amount: Amount) -> Option<PublicKey> {
        self.0.get(&amount).copied()
    }

    /// Iterate over (denomination, key) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Amount, &PublicKey)> {
        self.0.iter()
    }

    /// Number of denominations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the keyset is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_from_hex() {
        assert!(PublicKey::from_hex(
            "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_public_key_from_hex() {
        // Uncompressed keys are not part of the protocol
        assert!(PublicKey::from_hex("04fd4ce5a16b65576145949e6f99f445f8249fee17c606b688b504a849cdc452de3625246cb2c27dac965cb7200a5986467eee92eb7d496bbf1453b074e223e481")
            .is_err())
    }

    #[test]
    fn test_from_slice_reduced_accepts_any_bytes() {
        // All ones is above the curve order and must be reduced, all zeros
        // is invalid outright; both still produce a usable key
        let key = SecretKey::from_slice_reduced(&[0xff; 32]);
        let _ = key.public_key();
        let key = SecretKey::from_slice_reduced(&[0x00; 32]);
        let _ = key.public_key();
    }

    #[test]
    fn test_keys_json_object_keys_are_amounts() {
        let json = r#"{"1":"02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104","2":"03194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"}"#;
        let keys: Keys = serde_json::from_str(json).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.amount_key(Amount::from(1)).is_some());
        assert!(keys.amount_key(Amount::from(4)).is_none());

        let round = serde_json::to_string(&keys).unwrap();
        let back: Keys = serde_json::from_str(&round).unwrap();
        assert_eq!(back, keys);
    }
}
