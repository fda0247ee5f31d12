//! Portable token string (V3)
//!
//! `cashuA` followed by unpadded URL-safe base64 of the JSON object
//! `{token: [{mint, proofs}], memo?}`.

use core::fmt;
use core::str::FromStr;

use bitcoin::base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bitcoin::base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bitcoin::base64::{alphabet, Engine as _};
use serde::{Deserialize, Serialize};

use super::{Error, Proofs, ProofsMethods};
use crate::{Amount, MintUrl};

const PREFIX: &str = "cashuA";

/// Proofs belonging to a single mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Url of the mint that issued the proofs
    pub mint: MintUrl,
    /// Proofs
    pub proofs: Proofs,
}

/// Portable token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Proofs grouped by mint
    pub token: Vec<TokenEntry>,
    /// Memo for the recipient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Token {
    /// New single-mint token
    pub fn new(mint_url: MintUrl, proofs: Proofs, memo: Option<String>) -> Result<Self, Error> {
        if proofs.is_empty() {
            return Err(Error::ProofsRequired);
        }

        Ok(Self {
            token: vec![TokenEntry {
                mint: mint_url,
                proofs,
            }],
            memo,
        })
    }

    /// Total value over all entries
    pub fn value(&self) -> Result<Amount, Error> {
        Amount::try_sum(
            self.token
                .iter()
                .map(|entry| entry.proofs.total_amount())
                .collect::<Result<Vec<Amount>, _>>()?,
        )
        .map_err(Into::into)
    }

    /// Memo, if any
    pub fn memo(&self) -> Option<&String> {
        self.memo.as_ref()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{PREFIX}{}", URL_SAFE_NO_PAD.encode(json))
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix(PREFIX).ok_or(Error::UnsupportedToken)?;

        // Tokens in the wild come both padded and unpadded
        let decode_config = GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent);
        let decoded = GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?;
        let decoded_str = String::from_utf8(decoded)?;

        let token: Token = serde_json::from_str(&decoded_str)?;
        if token.token.iter().all(|entry| entry.proofs.is_empty()) {
            return Err(Error::ProofsRequired);
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nuts::nut02::KeysetId;
    use crate::nuts::Proof;
    use crate::secret::Secret;
    use crate::PublicKey;

    fn test_proofs() -> Proofs {
        let c = PublicKey::from_hex(
            "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104",
        )
        .unwrap();

        vec![
            Proof::new(
                Amount::from(2),
                KeysetId::new("009a1f293253e41e"),
                Secret::new("407915bc212be61a77e3e6d2aeb4c727980bda51cd06a6afc29e2861768a7837"),
                c,
            ),
            Proof::new(
                Amount::from(8),
                KeysetId::new("009a1f293253e41e"),
                Secret::new("fe15109314e61d7756b0f8ee0f23a624acaa3f4e042f61433c728c7057b931be"),
                c,
            ),
        ]
    }

    #[test]
    fn test_token_round_trip() {
        let mint_url = MintUrl::new("https://8333.space:3338");
        let token = Token::new(mint_url.clone(), test_proofs(), Some("Thank you.".to_string()))
            .unwrap();

        let encoded = token.to_string();
        assert!(encoded.starts_with("cashuA"));
        assert!(!encoded.contains('='));

        let decoded = Token::from_str(&encoded).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(decoded.token[0].mint, mint_url);
        assert_eq!(decoded.value().unwrap(), Amount::from(10));
        assert_eq!(decoded.memo(), Some(&"Thank you.".to_string()));

        // Byte-for-byte on the secrets
        for (a, b) in decoded.token[0].proofs.iter().zip(&token.token[0].proofs) {
            assert_eq!(a.secret.as_bytes(), b.secret.as_bytes());
        }
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!(Token::from_str("casshuA11").is_err());
        assert!(Token::from_str("cashuAnot-base64!!").is_err());
        assert!(Token::from_str("").is_err());
    }

    #[test]
    fn test_token_requires_proofs() {
        assert!(Token::new(MintUrl::new("https://mint.example"), vec![], None).is_err());
    }

    #[test]
    fn test_decode_padded_token() {
        let token = Token::new(MintUrl::new("https://mint.example"), test_proofs(), None).unwrap();
        let json = serde_json::to_string(&token).unwrap();

        use bitcoin::base64::engine::general_purpose::URL_SAFE;
        let padded = format!("cashuA{}", URL_SAFE.encode(json));

        assert_eq!(Token::from_str(&padded).unwrap(), token);
    }
}
