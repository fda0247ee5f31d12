//! NUT-09: Restore signatures
//!
//! The mint echoes, for every submitted blinded message it has ever
//! signed, the original blind signature.

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage};

/// Restore request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    /// Blinded messages whose signatures are being recovered
    pub outputs: Vec<BlindedMessage>,
}

/// Restore response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    /// The subset of submitted outputs the mint has signed before,
    /// aligned with `signatures`
    pub outputs: Vec<BlindedMessage>,
    /// Previously issued blind signatures
    #[serde(alias = "promises")]
    pub signatures: Vec<BlindSignature>,
}
