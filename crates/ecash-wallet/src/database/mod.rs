//! Wallet database
//!
//! The persistence backend is pluggable behind [`WalletDatabase`]; the
//! engine only relies on the contract stated here. Four logical tables:
//! proofs keyed by the signature point `C`, mints keyed by base url,
//! quotes keyed by quote id, and advisory derivation counters keyed by
//! scope name. Each trait method is atomic with respect to the others on
//! the same store; in particular two concurrent [`reserve_proofs`] calls
//! can never hand out the same proof.
//!
//! [`reserve_proofs`]: WalletDatabase::reserve_proofs

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use ecash::nuts::{KeySet, KeySetInfo, KeysetId, MintInfo, Proofs, PublicKey, State};
use ecash::{Amount, MintUrl};
use thiserror::Error;

use crate::types::{MeltQuote, MintQuote, ProofInfo, Transaction};

mod memory;

pub use memory::WalletMemoryDatabase;

/// Database Error
#[derive(Debug, Error)]
pub enum Error {
    /// Coverage for a reservation is not achievable
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Backend failure
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
}

/// Storage backend of the wallet
#[async_trait]
pub trait WalletDatabase: Debug + Send + Sync {
    /// Record a mint, optionally with its fetched metadata
    async fn add_mint(&self, mint_url: MintUrl, mint_info: Option<MintInfo>)
        -> Result<(), Error>;

    /// Look up a mint record: `None` when the mint is unknown, otherwise
    /// the (possibly absent) metadata
    async fn get_mint(&self, mint_url: &MintUrl) -> Result<Option<Option<MintInfo>>, Error>;

    /// All known mints
    async fn get_mints(&self) -> Result<HashMap<MintUrl, Option<MintInfo>>, Error>;

    /// Cache the keyset listing of a mint, deduplicated by id
    async fn add_mint_keysets(
        &self,
        mint_url: MintUrl,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error>;

    /// Cached keyset listing of a mint
    async fn get_mint_keysets(&self, mint_url: &MintUrl)
        -> Result<Option<Vec<KeySetInfo>>, Error>;

    /// Cache the keys of a keyset
    async fn add_keys(&self, keyset: KeySet) -> Result<(), Error>;

    /// Cached keys of a keyset
    async fn get_keys(&self, keyset_id: &KeysetId) -> Result<Option<KeySet>, Error>;

    /// Upsert proofs, keyed by `C`
    ///
    /// On conflict the mint url and keyset id of the existing record are
    /// overwritten. An incoming unspent record revives a spent or
    /// reserved one (rediscovery during restore); insertion never moves
    /// a proof towards spent.
    async fn add_proofs(&self, proofs: Vec<ProofInfo>) -> Result<(), Error>;

    /// Proofs, optionally filtered by mint and by state
    async fn get_proofs(
        &self,
        mint_url: Option<&MintUrl>,
        states: Option<&[State]>,
    ) -> Result<Vec<ProofInfo>, Error>;

    /// Atomically select and reserve unspent proofs covering `amount`
    ///
    /// Selection is greedy largest-first and stops as soon as the total
    /// covers the amount. Reservations lapse at `now + timeout`, after
    /// which the proofs become selectable again. Fails with
    /// [`Error::InsufficientFunds`] without reserving anything when
    /// coverage cannot be met.
    async fn reserve_proofs(
        &self,
        mint_url: &MintUrl,
        amount: Amount,
        timeout: Duration,
    ) -> Result<Proofs, Error>;

    /// Transition proofs to spent
    async fn mark_proofs_spent(&self, ids: &[PublicKey]) -> Result<(), Error>;

    /// Transition reserved proofs back to unspent (orchestrator rollback)
    async fn unreserve_proofs(&self, ids: &[PublicKey]) -> Result<(), Error>;

    /// Hard-remove proofs
    async fn remove_proofs(&self, ids: &[PublicKey]) -> Result<(), Error>;

    /// Upsert a mint quote
    async fn add_mint_quote(&self, quote: MintQuote) -> Result<(), Error>;

    /// Look up a mint quote
    async fn get_mint_quote(&self, quote_id: &str) -> Result<Option<MintQuote>, Error>;

    /// Remove a mint quote
    async fn remove_mint_quote(&self, quote_id: &str) -> Result<(), Error>;

    /// Upsert a melt quote
    async fn add_melt_quote(&self, quote: MeltQuote) -> Result<(), Error>;

    /// Look up a melt quote
    async fn get_melt_quote(&self, quote_id: &str) -> Result<Option<MeltQuote>, Error>;

    /// Remove a melt quote
    async fn remove_melt_quote(&self, quote_id: &str) -> Result<(), Error>;

    /// Bump an advisory derivation counter, returning the new value
    ///
    /// Counters speed up rescans but correctness never depends on them;
    /// a full restore works from index zero.
    async fn increment_counter(&self, scope: &str, count: u32) -> Result<u32, Error>;

    /// Current value of an advisory counter
    async fn get_counter(&self, scope: &str) -> Result<u32, Error>;

    /// Append a history entry
    async fn add_transaction(&self, transaction: Transaction) -> Result<(), Error>;

    /// History entries, newest first, optionally filtered by mint
    async fn get_transactions(&self, mint_url: Option<&MintUrl>)
        -> Result<Vec<Transaction>, Error>;
}
