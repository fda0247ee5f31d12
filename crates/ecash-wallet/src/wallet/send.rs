//! Send: swap reserved proofs into a portable token plus change

use ecash::nuts::{fee_for_inputs, KeySet, ProofsMethods, State, Token};
use ecash::{Amount, MintUrl, Proofs};
use tracing::instrument;

use super::{Wallet, RESERVATION_TIMEOUT};
use crate::error::Error;
use crate::events::WalletEvent;
use crate::types::{ProofInfo, Transaction, TransactionKind};

impl Wallet {
    /// Create a token worth `amount`
    ///
    /// Reserves covering proofs, swaps them at the mint into exact token
    /// denominations plus change, commits the change and returns the
    /// serialized token. Any failure after the reservation releases it.
    #[instrument(skip(self, memo), fields(mint_url = %mint_url))]
    pub async fn send(
        &self,
        mint_url: &MintUrl,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<String, Error> {
        self.require_mint(mint_url).await?;
        let keyset = self.active_keyset(mint_url).await?;

        // Fee estimate over a heuristic input count, only to size the
        // reservation; the exact fee follows from what got reserved
        let estimated_inputs = amount.split().len() as u64 + 1;
        let estimated_fee = fee_for_inputs(estimated_inputs, keyset.input_fee_ppk);
        let target = amount
            .checked_add(estimated_fee)
            .ok_or(Error::InsufficientFunds)?;

        let inputs = self
            .localstore
            .reserve_proofs(mint_url, target, RESERVATION_TIMEOUT)
            .await?;

        match self
            .swap_for_send(mint_url, &keyset, &inputs, amount, memo)
            .await
        {
            Ok(token) => Ok(token),
            Err(err) => {
                self.rollback_reservation(&inputs).await;
                Err(err)
            }
        }
    }

    async fn swap_for_send(
        &self,
        mint_url: &MintUrl,
        keyset: &KeySet,
        inputs: &Proofs,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<String, Error> {
        let total_input = inputs.total_amount()?;
        let fee = fee_for_inputs(inputs.len() as u64, keyset.input_fee_ppk);

        let change_amount = total_input
            .checked_sub(amount)
            .and_then(|rest| rest.checked_sub(fee))
            .ok_or(Error::InsufficientFunds)?;

        let pre_swap = Self::plan_swap(keyset, inputs.clone(), amount, change_amount)?;
        let mut proofs = self.execute_swap(mint_url, keyset, &pre_swap).await?;

        if proofs.len() < pre_swap.send_count {
            return Err(Error::Protocol(
                "Mint did not sign all token outputs".to_string(),
            ));
        }

        // Planning order: token proofs first, the rest is change
        let change_proofs = proofs.split_off(pre_swap.send_count);
        let token_proofs = proofs;

        self.localstore
            .add_proofs(
                change_proofs
                    .into_iter()
                    .map(|proof| ProofInfo::new(proof, mint_url.clone(), State::Unspent))
                    .collect(),
            )
            .await?;
        let input_ids: Vec<_> = inputs.iter().map(|proof| proof.c).collect();
        self.localstore.mark_proofs_spent(&input_ids).await?;

        self.localstore
            .add_transaction(Transaction::new(
                mint_url.clone(),
                TransactionKind::SendEcash,
                amount,
                fee,
                memo.clone(),
            ))
            .await?;

        let token = Token::new(mint_url.clone(), token_proofs, memo)?.to_string();

        self.events.publish(WalletEvent::ProofsUpdated {
            mint_url: mint_url.clone(),
        });
        self.events.publish(WalletEvent::HistoryUpdated);

        Ok(token)
    }
}
