//! Restore: rebuild the proof set from the seed alone
//!
//! For every keyset the mint has ever used, derive blinded messages at
//! indices 0, 20, 40, ... and ask the mint which of them it has signed
//! before. Each returned signature is matched back to the derivation
//! that produced its blinded message and unblinded into a proof, then
//! filtered through the spend check so only live proofs land in the
//! store.

use std::collections::HashSet;

use ecash::dhke::unblind_message;
use ecash::nuts::{
    BlindedMessage, CheckStateRequest, KeySet, PreMintSecrets, Proof, Proofs, ProofsMethods,
    RestoreRequest, State,
};
use ecash::{Amount, MintUrl};
use tracing::instrument;

use super::Wallet;
use crate::error::Error;
use crate::events::WalletEvent;
use crate::types::ProofInfo;

/// Derivation indices per restore round trip
const BATCH_SIZE: u32 = 20;

/// Consecutive empty batches after which a keyset sweep stops
const GAP_LIMIT: u32 = 3;

/// Hard cap on the derivation index per keyset
const INDEX_CAP: u32 = 100;

/// Largest denomination submitted per blinded message
///
/// Mints differ in the denominations they actually issue; one output per
/// power of two up to 8192 covers the deployed ones.
const MAX_DENOMINATION: u64 = 8192;

impl Wallet {
    /// Scan the mint for proofs derivable from the wallet seed
    ///
    /// Returns the total value recovered. Running the scan twice yields
    /// the same proof set: recovered proofs are keyed by their signature
    /// point, and the ascending-index match below keeps the pairing of
    /// signatures to secrets stable between runs.
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn restore(&self, mint_url: &MintUrl) -> Result<Amount, Error> {
        self.ensure_mint(mint_url).await?;

        let keysets = self.keysets(mint_url).await?;
        let mut restored = Amount::ZERO;

        for keyset_info in keysets {
            let keyset = self.keyset_keys(mint_url, &keyset_info.id).await?;
            restored += self.restore_keyset(mint_url, &keyset).await?;
        }

        if restored > Amount::ZERO {
            self.events.publish(WalletEvent::ProofsUpdated {
                mint_url: mint_url.clone(),
            });
        }

        Ok(restored)
    }

    async fn restore_keyset(&self, mint_url: &MintUrl, keyset: &KeySet) -> Result<Amount, Error> {
        let denominations = Amount::from(MAX_DENOMINATION).ladder();

        let mut restored = Amount::ZERO;
        let mut empty_batches: u32 = 0;
        let mut start_index: u32 = 0;

        while empty_batches < GAP_LIMIT && start_index <= INDEX_CAP {
            let (premint, indices) = PreMintSecrets::restore_batch(
                self.seed.as_bytes(),
                keyset.id.clone(),
                start_index,
                BATCH_SIZE,
            )?;

            tracing::debug!(
                "Restoring indices {start_index}-{} of keyset {}",
                start_index + BATCH_SIZE - 1,
                keyset.id
            );

            // One output per derived point and denomination; the mint
            // echoes the ones it has signed
            let outputs: Vec<BlindedMessage> = premint
                .iter()
                .flat_map(|pre| {
                    denominations.iter().map(move |denomination| {
                        BlindedMessage::new(
                            *denomination,
                            keyset.id.clone(),
                            pre.blinded_message.blinded_secret,
                        )
                    })
                })
                .collect();

            let response = self
                .connector
                .post_restore(mint_url, RestoreRequest { outputs })
                .await?;

            if response.signatures.is_empty() {
                empty_batches += 1;
                start_index += BATCH_SIZE;
                continue;
            }

            let mut seen = HashSet::new();
            let mut proofs = Proofs::new();
            for (output, signature) in response.outputs.iter().zip(response.signatures) {
                // Ascending-index scan, first match wins: re-runs pair
                // signatures with the same secrets every time
                let matched = premint
                    .iter()
                    .find(|pre| pre.blinded_message.blinded_secret == output.blinded_secret);

                let Some(pre) = matched else {
                    tracing::warn!("Mint returned a signature for an unknown blinded message");
                    continue;
                };

                let Some(key) = keyset.keys.amount_key(signature.amount) else {
                    tracing::warn!(
                        "Keyset {} has no key for restored denomination {}",
                        keyset.id,
                        signature.amount
                    );
                    continue;
                };

                let c = unblind_message(&signature.c, &pre.r, &key)?;

                // The same blinded point went out once per denomination,
                // so its signature may echo back more than once
                if seen.insert(c) {
                    proofs.push(Proof::new(
                        signature.amount,
                        signature.keyset_id,
                        pre.secret.clone(),
                        c,
                    ));
                }
            }

            // Strict mode: without a spend check the batch is dropped
            // rather than risking the revival of spent proofs
            match self
                .connector
                .post_check_state(mint_url, CheckStateRequest { ys: proofs.ys()? })
                .await
            {
                Ok(check) => {
                    let live: Vec<ProofInfo> = proofs
                        .iter()
                        .zip(check.states)
                        .filter(|(_, state)| state.state != State::Spent)
                        .map(|(proof, _)| {
                            ProofInfo::new(proof.clone(), mint_url.clone(), State::Unspent)
                        })
                        .collect();

                    restored += Amount::try_sum(live.iter().map(|info| info.proof.amount))?;
                    tracing::debug!(
                        "Restored {} live of {} recovered proofs",
                        live.len(),
                        proofs.len()
                    );
                    self.localstore.add_proofs(live).await?;
                }
                Err(err) => {
                    tracing::warn!("Discarding restore batch, spend check failed: {err}");
                }
            }

            self.localstore
                .increment_counter(
                    &format!("{mint_url}/{}", keyset.id),
                    indices.len() as u32,
                )
                .await?;

            empty_batches = 0;
            start_index += BATCH_SIZE;
        }

        Ok(restored)
    }
}
