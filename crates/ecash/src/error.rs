//! Errors

use thiserror::Error;

/// Crate error, aggregating the per-module failures
#[derive(Debug, Error)]
pub enum Error {
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
    /// Key error
    #[error(transparent)]
    Nut01(#[from] crate::nuts::nut01::Error),
    /// Token / proof error
    #[error(transparent)]
    Nut00(#[from] crate::nuts::nut00::Error),
    /// Proof state error
    #[error(transparent)]
    Nut07(#[from] crate::nuts::nut07::Error),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] crate::mint_url::Error),
    /// Hex error
    #[error(transparent)]
    Hex(#[from] crate::util::hex::Error),
}
