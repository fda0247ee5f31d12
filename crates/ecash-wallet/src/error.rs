//! Wallet errors
//!
//! The variants are the error kinds surfaced to callers; mint-reported
//! errors keep their wire code so orchestrations can react to specific
//! conditions (notably "outputs already signed" during mint recovery).

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::database;

/// Wallet Error
#[derive(Debug, Error)]
pub enum Error {
    /// No record for the given mint url
    #[error("Mint not found")]
    MintNotFound,
    /// Coverage for the requested amount is not achievable
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Quote missing, unknown or expired
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),
    /// Malformed token string
    #[error("Invalid token")]
    InvalidToken,
    /// The lightning payment did not settle
    #[error("Lightning payment failed")]
    PaymentFailed,
    /// HTTP or transport failure
    #[error("Network error: {0}")]
    Network(String),
    /// Mint response violates the expected schema
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Point parse, hash-to-curve exhaustion or invalid scalar
    #[error("Crypto error: {0}")]
    Crypto(String),
    /// Structured error reported by the mint
    #[error("Mint error: {0}")]
    Mint(ErrorResponse),
    /// Database error
    #[error(transparent)]
    Database(database::Error),
}

impl From<database::Error> for Error {
    fn from(err: database::Error) -> Self {
        match err {
            database::Error::InsufficientFunds => Self::InsufficientFunds,
            err => Self::Database(err),
        }
    }
}

impl From<ecash::dhke::Error> for Error {
    fn from(err: ecash::dhke::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<ecash::nuts::nut01::Error> for Error {
    fn from(err: ecash::nuts::nut01::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<ecash::amount::Error> for Error {
    fn from(err: ecash::amount::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ecash::nuts::nut00::Error> for Error {
    fn from(err: ecash::nuts::nut00::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ecash::mint_url::Error> for Error {
    fn from(err: ecash::mint_url::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Error object returned by the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: ErrorCode,
    /// Human readable text
    #[serde(default)]
    pub error: Option<String>,
    /// Longer description
    #[serde(default)]
    pub detail: Option<String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code: {}, error: {}, detail: {}",
            self.code.to_code(),
            self.error.clone().unwrap_or_default(),
            self.detail.clone().unwrap_or_default()
        )
    }
}

impl ErrorResponse {
    /// Interpret a mint response body that failed to parse as the
    /// expected type
    ///
    /// Bodies that are not even an error object surface as [`Error::Protocol`].
    pub fn from_value(value: Value) -> Error {
        match serde_json::from_value::<ErrorResponse>(value.clone()) {
            Ok(response) => Error::Mint(response),
            Err(_) => Error::Protocol(value.to_string()),
        }
    }
}

/// Well-known mint error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Blinded message already signed
    BlindedMessageAlreadySigned,
    /// Token already spent
    TokenAlreadySpent,
    /// Quote is not paid
    QuoteNotPaid,
    /// Quote has expired
    QuoteExpired,
    /// Keyset is not known
    KeysetNotFound,
    /// Inputs do not balance outputs plus fee
    TransactionUnbalanced,
    /// Lightning payment error
    LightningError,
    /// Any other code
    Unknown(u16),
}

impl ErrorCode {
    /// Error code from the wire number
    pub fn from_code(code: u16) -> Self {
        match code {
            10002 => Self::BlindedMessageAlreadySigned,
            11001 => Self::TokenAlreadySpent,
            11002 => Self::TransactionUnbalanced,
            12001 => Self::KeysetNotFound,
            20000 => Self::LightningError,
            20001 => Self::QuoteNotPaid,
            20007 => Self::QuoteExpired,
            _ => Self::Unknown(code),
        }
    }

    /// The wire number of the code
    pub fn to_code(&self) -> u16 {
        match self {
            Self::BlindedMessageAlreadySigned => 10002,
            Self::TokenAlreadySpent => 11001,
            Self::TransactionUnbalanced => 11002,
            Self::KeysetNotFound => 12001,
            Self::LightningError => 20000,
            Self::QuoteNotPaid => 20001,
            Self::QuoteExpired => 20007,
            Self::Unknown(code) => *code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.to_code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_parse() {
        let value: Value =
            serde_json::from_str(r#"{"code":10002,"error":"outputs have already been signed"}"#)
                .unwrap();

        match ErrorResponse::from_value(value) {
            Error::Mint(response) => {
                assert_eq!(response.code, ErrorCode::BlindedMessageAlreadySigned);
            }
            other => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn test_unstructured_body_is_protocol_error() {
        let value: Value = serde_json::from_str(r#"{"weird":"shape"}"#).unwrap();
        assert!(matches!(
            ErrorResponse::from_value(value),
            Error::Protocol(_)
        ));
    }

    #[test]
    fn test_insufficient_funds_mapping() {
        let err: Error = database::Error::InsufficientFunds.into();
        assert!(matches!(err, Error::InsufficientFunds));
    }
}
