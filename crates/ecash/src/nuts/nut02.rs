//! NUT-02: Keysets and fees
//!
//! A keyset is a mint's family of per-denomination public keys. The id is
//! chosen by the mint and treated as an opaque string; proofs carry the id
//! of the keyset that signed them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::nut01::Keys;
use crate::Amount;

/// Keyset id, an opaque mint-chosen identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeysetId(String);

impl KeysetId {
    /// New keyset id
    pub fn new<S>(id: S) -> Self
    where
        S: Into<String>,
    {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first four bytes of the id interpreted as a big-endian u32
    ///
    /// This is the keyset component of the deterministic derivation path;
    /// short ids are zero padded. Changing this mapping breaks restore.
    pub fn as_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        for (slot, byte) in bytes.iter_mut().zip(self.0.as_bytes()) {
            *slot = *byte;
        }
        u32::from_be_bytes(bytes)
    }
}

impl fmt::Display for KeysetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeysetId {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Keyset: id plus the key for every denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keyset id
    pub id: KeysetId,
    /// Per-denomination public keys
    pub keys: Keys,
    /// Input fee in parts per thousand per input
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Keyset summary as returned by `/v1/keysets`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySetInfo {
    /// Keyset id
    pub id: KeysetId,
    /// Whether the mint is still signing with this keyset
    pub active: bool,
    /// Input fee in parts per thousand per input
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Response of `/v1/keys`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    /// Active keysets with their keys
    pub keysets: Vec<KeySet>,
}

/// Response of `/v1/keysets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetResponse {
    /// All keysets the mint has ever used
    pub keysets: Vec<KeySetInfo>,
}

/// Fee for spending `input_count` proofs: `ceil(count * ppk / 1000)`
pub fn fee_for_inputs(input_count: u64, input_fee_ppk: u64) -> Amount {
    Amount::from((input_count * input_fee_ppk + 999) / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyset_id_as_u32() {
        // "00ad" -> 0x30 0x30 0x61 0x64
        assert_eq!(KeysetId::new("00ad7af2").as_u32(), 0x3030_6164);
        // Short ids are zero padded on the right
        assert_eq!(KeysetId::new("a").as_u32(), 0x6100_0000);
        assert_eq!(KeysetId::new("").as_u32(), 0);
    }

    #[test]
    fn test_fee_for_inputs() {
        assert_eq!(fee_for_inputs(3, 0), Amount::ZERO);
        assert_eq!(fee_for_inputs(1, 2), Amount::from(1));
        assert_eq!(fee_for_inputs(500, 2), Amount::from(1));
        assert_eq!(fee_for_inputs(1000, 2), Amount::from(2));
        assert_eq!(fee_for_inputs(3501, 2), Amount::from(8));
    }

    #[test]
    fn test_keyset_info_fee_defaults_to_zero() {
        let info: KeySetInfo =
            serde_json::from_str(r#"{"id":"00ad7af2","active":true}"#).unwrap();
        assert_eq!(info.input_fee_ppk, 0);
    }
}
