//! In-memory database
//!
//! Reference implementation of [`WalletDatabase`]. One lock guards all
//! tables, which makes every trait method atomic and serializes
//! concurrent reservations.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecash::nuts::{KeySet, KeySetInfo, KeysetId, MintInfo, Proofs, PublicKey, State};
use ecash::util::unix_time;
use ecash::{Amount, MintUrl};
use tokio::sync::Mutex;

use super::{Error, WalletDatabase};
use crate::types::{MeltQuote, MintQuote, ProofInfo, Transaction};

#[derive(Debug, Default)]
struct Tables {
    mints: HashMap<MintUrl, Option<MintInfo>>,
    mint_keysets: HashMap<MintUrl, Vec<KeySetInfo>>,
    keys: HashMap<KeysetId, KeySet>,
    proofs: HashMap<PublicKey, ProofInfo>,
    mint_quotes: HashMap<String, MintQuote>,
    melt_quotes: HashMap<String, MeltQuote>,
    counters: HashMap<String, u32>,
    transactions: Vec<Transaction>,
}

/// Memory-backed wallet database
#[derive(Debug, Default, Clone)]
pub struct WalletMemoryDatabase {
    inner: Arc<Mutex<Tables>>,
}

impl WalletMemoryDatabase {
    /// New empty database
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletDatabase for WalletMemoryDatabase {
    async fn add_mint(
        &self,
        mint_url: MintUrl,
        mint_info: Option<MintInfo>,
    ) -> Result<(), Error> {
        self.inner.lock().await.mints.insert(mint_url, mint_info);
        Ok(())
    }

    async fn get_mint(&self, mint_url: &MintUrl) -> Result<Option<Option<MintInfo>>, Error> {
        Ok(self.inner.lock().await.mints.get(mint_url).cloned())
    }

    async fn get_mints(&self) -> Result<HashMap<MintUrl, Option<MintInfo>>, Error> {
        Ok(self.inner.lock().await.mints.clone())
    }

    async fn add_mint_keysets(
        &self,
        mint_url: MintUrl,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error> {
        let mut tables = self.inner.lock().await;
        let known = tables.mint_keysets.entry(mint_url).or_default();

        for keyset in keysets {
            match known.iter_mut().find(|existing| existing.id == keyset.id) {
                Some(existing) => *existing = keyset,
                None => known.push(keyset),
            }
        }

        Ok(())
    }

    async fn get_mint_keysets(
        &self,
        mint_url: &MintUrl,
    ) -> Result<Option<Vec<KeySetInfo>>, Error> {
        Ok(self.inner.lock().await.mint_keysets.get(mint_url).cloned())
    }

    async fn add_keys(&self, keyset: KeySet) -> Result<(), Error> {
        self.inner
            .lock()
            .await
            .keys
            .insert(keyset.id.clone(), keyset);
        Ok(())
    }

    async fn get_keys(&self, keyset_id: &KeysetId) -> Result<Option<KeySet>, Error> {
        Ok(self.inner.lock().await.keys.get(keyset_id).cloned())
    }

    async fn add_proofs(&self, proofs: Vec<ProofInfo>) -> Result<(), Error> {
        let mut tables = self.inner.lock().await;

        for incoming in proofs {
            match tables.proofs.entry(incoming.proof.c) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.mint_url = incoming.mint_url;
                    existing.proof.keyset_id = incoming.proof.keyset_id;

                    // Revive on rediscovery; never regress towards spent
                    if existing.state != State::Unspent && incoming.state == State::Unspent {
                        existing.state = State::Unspent;
                        existing.reserved_until = None;
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(incoming);
                }
            }
        }

        Ok(())
    }

    async fn get_proofs(
        &self,
        mint_url: Option<&MintUrl>,
        states: Option<&[State]>,
    ) -> Result<Vec<ProofInfo>, Error> {
        Ok(self
            .inner
            .lock()
            .await
            .proofs
            .values()
            .filter(|info| mint_url.map_or(true, |url| &info.mint_url == url))
            .filter(|info| states.map_or(true, |states| states.contains(&info.state)))
            .cloned()
            .collect())
    }

    async fn reserve_proofs(
        &self,
        mint_url: &MintUrl,
        amount: Amount,
        timeout: Duration,
    ) -> Result<Proofs, Error> {
        let mut tables = self.inner.lock().await;
        let now = unix_time();

        let mut candidates: Vec<(PublicKey, Amount)> = tables
            .proofs
            .iter()
            .filter(|(_, info)| &info.mint_url == mint_url)
            .filter(|(_, info)| match info.state {
                State::Unspent => true,
                // A lapsed reservation is selectable again
                State::Reserved => info.reserved_until.is_some_and(|until| until <= now),
                _ => false,
            })
            .map(|(id, info)| (*id, info.proof.amount))
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let mut selected: Vec<PublicKey> = Vec::new();
        let mut total = Amount::ZERO;
        for (id, proof_amount) in candidates {
            if total >= amount {
                break;
            }
            selected.push(id);
            total += proof_amount;
        }

        // All or nothing; no partial reservation
        if total < amount {
            return Err(Error::InsufficientFunds);
        }

        let reserved_until = now + timeout.as_secs();
        let mut reserved = Proofs::new();
        for id in selected {
            if let Some(info) = tables.proofs.get_mut(&id) {
                info.state = State::Reserved;
                info.reserved_until = Some(reserved_until);
                reserved.push(info.proof.clone());
            }
        }

        Ok(reserved)
    }

    async fn mark_proofs_spent(&self, ids: &[PublicKey]) -> Result<(), Error> {
        let mut tables = self.inner.lock().await;
        for id in ids {
            if let Some(info) = tables.proofs.get_mut(id) {
                info.state = State::Spent;
                info.reserved_until = None;
            }
        }
        Ok(())
    }

    async fn unreserve_proofs(&self, ids: &[PublicKey]) -> Result<(), Error> {
        let mut tables = self.inner.lock().await;
        for id in ids {
            if let Some(info) = tables.proofs.get_mut(id) {
                if info.state == State::Reserved {
                    info.state = State::Unspent;
                    info.reserved_until = None;
                }
            }
        }
        Ok(())
    }

    async fn remove_proofs(&self, ids: &[PublicKey]) -> Result<(), Error> {
        let mut tables = self.inner.lock().await;
        for id in ids {
            tables.proofs.remove(id);
        }
        Ok(())
    }

    async fn add_mint_quote(&self, quote: MintQuote) -> Result<(), Error> {
        self.inner
            .lock()
            .await
            .mint_quotes
            .insert(quote.id.clone(), quote);
        Ok(())
    }

    async fn get_mint_quote(&self, quote_id: &str) -> Result<Option<MintQuote>, Error> {
        Ok(self.inner.lock().await.mint_quotes.get(quote_id).cloned())
    }

    async fn remove_mint_quote(&self, quote_id: &str) -> Result<(), Error> {
        self.inner.lock().await.mint_quotes.remove(quote_id);
        Ok(())
    }

    async fn add_melt_quote(&self, quote: MeltQuote) -> Result<(), Error> {
        self.inner
            .lock()
            .await
            .melt_quotes
            .insert(quote.id.clone(), quote);
        Ok(())
    }

    async fn get_melt_quote(&self, quote_id: &str) -> Result<Option<MeltQuote>, Error> {
        Ok(self.inner.lock().await.melt_quotes.get(quote_id).cloned())
    }

    async fn remove_melt_quote(&self, quote_id: &str) -> Result<(), Error> {
        self.inner.lock().await.melt_quotes.remove(quote_id);
        Ok(())
    }

    async fn increment_counter(&self, scope: &str, count: u32) -> Result<u32, Error> {
        let mut tables = self.inner.lock().await;
        let counter = tables.counters.entry(scope.to_string()).or_insert(0);
        *counter += count;
        Ok(*counter)
    }

    async fn get_counter(&self, scope: &str) -> Result<u32, Error> {
        Ok(self
            .inner
            .lock()
            .await
            .counters
            .get(scope)
            .copied()
            .unwrap_or(0))
    }

    async fn add_transaction(&self, transaction: Transaction) -> Result<(), Error> {
        self.inner.lock().await.transactions.push(transaction);
        Ok(())
    }

    async fn get_transactions(
        &self,
        mint_url: Option<&MintUrl>,
    ) -> Result<Vec<Transaction>, Error> {
        let mut transactions: Vec<Transaction> = self
            .inner
            .lock()
            .await
            .transactions
            .iter()
            .filter(|tx| mint_url.map_or(true, |url| &tx.mint_url == url))
            .cloned()
            .collect();

        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(transactions)
    }
}
