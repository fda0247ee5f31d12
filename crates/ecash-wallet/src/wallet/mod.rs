//! Cashu wallet
//!
//! The engine behind every flow: it owns the connector, the database,
//! the event bus and the master seed, and sequences each operation as a
//! saga of reserve, network call and commit-or-rollback.

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bip39::Mnemonic;
use ecash::dhke::hash_to_curve;
use ecash::nuts::{KeySet, KeySetInfo, KeysetId, MintInfo, ProofState, Proofs, State};
use ecash::{Amount, MintUrl};
use tokio::sync::broadcast;
use tracing::instrument;

use crate::client::MintConnector;
use crate::database::WalletDatabase;
use crate::error::Error;
use crate::events::{EventBus, WalletEvent};
use crate::types::Transaction;

mod melt;
mod mint;
mod receive;
mod restore;
mod send;
mod swap;

pub use self::mint::QUOTE_POLL_TIMEOUT;

/// How long a reservation shields proofs from other operations
pub(crate) const RESERVATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Holder of the immutable master seed
///
/// The seed is loaded once, lives in a single place for the process
/// lifetime and never shows up in logs or events.
#[derive(Clone)]
pub struct SeedHolder {
    seed: Arc<[u8; 64]>,
}

impl fmt::Debug for SeedHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedHolder")
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

impl SeedHolder {
    /// Wrap a 64-byte master seed
    pub fn new(seed: [u8; 64]) -> Self {
        Self {
            seed: Arc::new(seed),
        }
    }

    /// Seed from a BIP-39 mnemonic with an empty passphrase
    pub fn from_mnemonic(mnemonic: &Mnemonic) -> Self {
        Self::new(mnemonic.to_seed(""))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.seed.as_slice()
    }
}

/// The wallet engine
#[derive(Debug, Clone)]
pub struct Wallet {
    /// Interface to the remote mint
    pub connector: Arc<dyn MintConnector>,
    /// Persistence backend
    pub localstore: Arc<dyn WalletDatabase>,
    pub(crate) events: EventBus,
    pub(crate) seed: SeedHolder,
}

impl Wallet {
    /// Create new [`Wallet`]
    pub fn new(
        connector: Arc<dyn MintConnector>,
        localstore: Arc<dyn WalletDatabase>,
        seed: SeedHolder,
    ) -> Self {
        Self {
            connector,
            localstore,
            events: EventBus::default(),
            seed,
        }
    }

    /// Subscribe to wallet events
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Record a mint, fetching its metadata best-effort
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn add_mint(&self, mint_url: MintUrl) -> Result<Option<MintInfo>, Error> {
        let mint_info = match self.connector.get_mint_info(&mint_url).await {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::warn!("Could not get mint info: {err}");
                None
            }
        };

        self.localstore
            .add_mint(mint_url, mint_info.clone())
            .await?;

        Ok(mint_info)
    }

    /// Error with [`Error::MintNotFound`] unless the mint is on record
    pub(crate) async fn require_mint(&self, mint_url: &MintUrl) -> Result<(), Error> {
        self.localstore
            .get_mint(mint_url)
            .await?
            .map(|_| ())
            .ok_or(Error::MintNotFound)
    }

    /// Record the mint if this is the first contact with it
    pub(crate) async fn ensure_mint(&self, mint_url: &MintUrl) -> Result<(), Error> {
        if self.localstore.get_mint(mint_url).await?.is_none() {
            self.add_mint(mint_url.clone()).await?;
        }
        Ok(())
    }

    /// Balance of a mint: the sum over its unspent proofs
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn balance(&self, mint_url: &MintUrl) -> Result<Amount, Error> {
        let unspent = self
            .localstore
            .get_proofs(Some(mint_url), Some(&[State::Unspent]))
            .await?;

        Ok(Amount::try_sum(
            unspent.iter().map(|info| info.proof.amount),
        )?)
    }

    /// Balance over all known mints
    #[instrument(skip(self))]
    pub async fn total_balance(&self) -> Result<Amount, Error> {
        let unspent = self
            .localstore
            .get_proofs(None, Some(&[State::Unspent]))
            .await?;

        Ok(Amount::try_sum(
            unspent.iter().map(|info| info.proof.amount),
        )?)
    }

    /// Balance per mint
    #[instrument(skip(self))]
    pub async fn mint_balances(&self) -> Result<HashMap<MintUrl, Amount>, Error> {
        let mut balances: HashMap<MintUrl, Amount> = self
            .localstore
            .get_mints()
            .await?
            .into_keys()
            .map(|mint_url| (mint_url, Amount::ZERO))
            .collect();

        for info in self
            .localstore
            .get_proofs(None, Some(&[State::Unspent]))
            .await?
        {
            *balances.entry(info.mint_url).or_insert(Amount::ZERO) += info.proof.amount;
        }

        Ok(balances)
    }

    /// Transaction history, newest first
    pub async fn transactions(
        &self,
        mint_url: Option<&MintUrl>,
    ) -> Result<Vec<Transaction>, Error> {
        Ok(self.localstore.get_transactions(mint_url).await?)
    }

    /// Fetch and cache the keyset listing of a mint
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn keysets(&self, mint_url: &MintUrl) -> Result<Vec<KeySetInfo>, Error> {
        let response = self.connector.get_keyset_ids(mint_url).await?;

        self.localstore
            .add_mint_keysets(mint_url.clone(), response.keysets.clone())
            .await?;

        Ok(response.keysets)
    }

    /// The mint's current keyset, with its input fee filled in from the
    /// keyset listing
    pub(crate) async fn active_keyset(&self, mint_url: &MintUrl) -> Result<KeySet, Error> {
        let keysets = self.connector.get_keys(mint_url).await?;
        let mut keyset = keysets
            .into_iter()
            .next()
            .ok_or_else(|| Error::Protocol("Mint returned no keysets".to_string()))?;

        // The fee lives on the keyset listing, not the key response
        match self.connector.get_keyset_ids(mint_url).await {
            Ok(response) => {
                if let Some(info) = response.keysets.iter().find(|info| info.id == keyset.id) {
                    keyset.input_fee_ppk = info.input_fee_ppk;
                }
                self.localstore
                    .add_mint_keysets(mint_url.clone(), response.keysets)
                    .await?;
            }
            Err(err) => tracing::debug!("Could not refresh keyset listing: {err}"),
        }

        self.localstore.add_keys(keyset.clone()).await?;

        Ok(keyset)
    }

    /// Keys of a specific keyset, from cache or the mint
    pub(crate) async fn keyset_keys(
        &self,
        mint_url: &MintUrl,
        keyset_id: &KeysetId,
    ) -> Result<KeySet, Error> {
        if let Some(keyset) = self.localstore.get_keys(keyset_id).await? {
            return Ok(keyset);
        }

        let keyset = self.connector.get_keyset_keys(mint_url, keyset_id).await?;
        self.localstore.add_keys(keyset.clone()).await?;

        Ok(keyset)
    }

    /// Ask the mint which of the given proofs are spent
    #[instrument(skip(self, proofs), fields(mint_url = %mint_url))]
    pub async fn check_proofs_spent(
        &self,
        mint_url: &MintUrl,
        proofs: &Proofs,
    ) -> Result<Vec<ProofState>, Error> {
        let ys = proofs
            .iter()
            .map(|proof| hash_to_curve(proof.secret.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .connector
            .post_check_state(mint_url, ecash::nuts::CheckStateRequest { ys })
            .await?;

        Ok(response.states)
    }

    /// Best-effort release of a reservation on the failure path
    ///
    /// A rollback failure is logged, never surfaced: the original error
    /// must not be masked.
    pub(crate) async fn rollback_reservation(&self, inputs: &Proofs) {
        let ids: Vec<_> = inputs.iter().map(|proof| proof.c).collect();
        if let Err(err) = self.localstore.unreserve_proofs(&ids).await {
            tracing::warn!("Failed to release reservation of {} proofs: {err}", ids.len());
        }
    }
}
