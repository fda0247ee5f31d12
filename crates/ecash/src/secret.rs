//! The secret data that allows spending ecash
//!
//! A secret is an opaque byte string; the conventional form is the UTF-8
//! encoding of a 32-byte value in lowercase hex. Whatever the form, the
//! byte sequence must survive serialization unchanged.

use core::fmt;
use core::str::FromStr;

use bitcoin::base64::engine::general_purpose;
use bitcoin::base64::Engine as _;
use bitcoin::secp256k1::rand::{self, RngCore};
use serde::{Deserialize, Serialize};

use crate::util::hex;

/// Wallet secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create secret from an existing string, preserved byte-for-byte
    pub fn new<S>(secret: S) -> Self
    where
        S: Into<String>,
    {
        Self(secret.into())
    }

    /// Generate a fresh secret: 32 random bytes, hex encoded
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut random_bytes = [0u8; 32];
        rng.fill_bytes(&mut random_bytes);
        Self(hex::encode(random_bytes))
    }

    /// Secret from raw bytes
    ///
    /// Valid UTF-8 is kept as-is; anything else is base64 encoded, the
    /// wire rule for binary secrets.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match core::str::from_utf8(bytes) {
            Ok(secret) => Self(secret.to_string()),
            Err(_) => Self(general_purpose::STANDARD.encode(bytes)),
        }
    }

    /// The secret's bytes, the input to hash-to-curve
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The secret as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Secret {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_hex() {
        let secret = Secret::generate();
        assert_eq!(secret.as_str().len(), 64);
        assert!(hex::decode(secret.as_str()).is_ok());
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(Secret::generate(), Secret::generate());
    }

    #[test]
    fn test_from_bytes_utf8() {
        let secret = Secret::from_bytes(b"acoustic secret");
        assert_eq!(secret.as_bytes(), b"acoustic secret");
    }

    #[test]
    fn test_from_bytes_binary() {
        let secret = Secret::from_bytes(&[0xff, 0xfe, 0x00]);
        assert_eq!(secret.as_str(), "//4A");
    }

    #[test]
    fn test_serde_round_trip() {
        let secret = Secret::generate();
        let json = serde_json::to_string(&secret).unwrap();
        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_bytes(), secret.as_bytes());
    }
}
