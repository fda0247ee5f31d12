//! NUT-04: Mint tokens via bolt11

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage, CurrencyUnit};
use crate::Amount;

/// Mint quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuoteBolt11Request {
    /// Amount to mint
    pub amount: Amount,
    /// Unit of the amount
    pub unit: CurrencyUnit,
}

/// Mint quote response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuoteBolt11Response {
    /// Quote id
    #[serde(alias = "id")]
    pub quote: String,
    /// Bolt11 invoice to pay
    #[serde(alias = "invoice")]
    pub request: String,
    /// Whether the invoice has been paid
    #[serde(default)]
    pub paid: bool,
    /// Unix timestamp the quote expires at
    #[serde(alias = "expires_at")]
    pub expiry: Option<u64>,
}

/// Mint request, executing a paid quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintBolt11Request {
    /// Quote id
    pub quote: String,
    /// Outputs to be signed
    pub outputs: Vec<BlindedMessage>,
}

/// Mint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintBolt11Response {
    /// Blind signatures over the requested outputs
    pub signatures: Vec<BlindSignature>,
}
