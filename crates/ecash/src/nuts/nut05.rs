//! NUT-05: Melt tokens via bolt11
//!
//! Change handling follows NUT-08: the request may carry outputs for the
//! fee surplus, and the mint returns signatures for the subset it owes.

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage, CurrencyUnit, Proofs};
use crate::Amount;

/// Melt quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Request {
    /// Bolt11 invoice to be paid
    pub request: String,
    /// Unit the wallet pays in
    pub unit: CurrencyUnit,
}

/// Melt quote response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Response {
    /// Quote id
    #[serde(alias = "id")]
    pub quote: String,
    /// Amount of the invoice
    pub amount: Amount,
    /// Fee the mint reserves for the lightning payment
    pub fee_reserve: Amount,
    /// Whether the invoice has been paid
    #[serde(default)]
    pub paid: bool,
    /// Unix timestamp the quote expires at
    #[serde(alias = "expires_at")]
    pub expiry: Option<u64>,
}

/// Melt request, executing a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltBolt11Request {
    /// Quote id
    pub quote: String,
    /// Proofs covering amount plus fee reserve
    pub inputs: Proofs,
    /// Outputs for fee change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<BlindedMessage>>,
}

/// Melt response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltBolt11Response {
    /// Whether the lightning payment succeeded
    pub paid: bool,
    /// Preimage of the settled payment
    pub payment_preimage: Option<String>,
    /// Signatures over the change outputs the mint owes; may cover only
    /// a subset of the requested outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Vec<BlindSignature>>,
}
