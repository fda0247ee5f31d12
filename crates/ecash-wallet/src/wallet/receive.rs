//! Receive: redeem a token by swapping its proofs for fresh ones
//!
//! The token's proofs are never inserted into the store; only the
//! freshly unblinded proofs are. Anything else would leave the wallet
//! holding proofs the sender can still double-spend.

use std::str::FromStr;

use ecash::nuts::{fee_for_inputs, ProofsMethods, State, Token};
use ecash::Amount;
use tracing::instrument;

use super::Wallet;
use crate::error::Error;
use crate::events::WalletEvent;
use crate::types::{ProofInfo, Transaction, TransactionKind};

impl Wallet {
    /// Redeem a serialized token, returning the amount credited
    #[instrument(skip_all)]
    pub async fn receive(&self, encoded_token: &str) -> Result<Amount, Error> {
        let token = Token::from_str(encoded_token).map_err(|_| Error::InvalidToken)?;

        let mut received = Amount::ZERO;

        for entry in token.token {
            if entry.proofs.is_empty() {
                continue;
            }

            let mint_url = entry.mint;
            self.ensure_mint(&mint_url).await?;

            let keyset = self.active_keyset(&mint_url).await?;

            let total = entry.proofs.total_amount()?;
            let fee = fee_for_inputs(entry.proofs.len() as u64, keyset.input_fee_ppk);
            let output_amount = total.checked_sub(fee).ok_or(Error::InsufficientFunds)?;

            let pre_swap =
                Self::plan_swap(&keyset, entry.proofs, output_amount, Amount::ZERO)?;
            let proofs = self.execute_swap(&mint_url, &keyset, &pre_swap).await?;
            let credited = proofs.total_amount()?;

            self.localstore
                .add_proofs(
                    proofs
                        .into_iter()
                        .map(|proof| ProofInfo::new(proof, mint_url.clone(), State::Unspent))
                        .collect(),
                )
                .await?;

            self.localstore
                .add_transaction(Transaction::new(
                    mint_url.clone(),
                    TransactionKind::ReceiveEcash,
                    credited,
                    fee,
                    token.memo.clone(),
                ))
                .await?;

            self.events.publish(WalletEvent::ProofsUpdated {
                mint_url: mint_url.clone(),
            });
            self.events.publish(WalletEvent::HistoryUpdated);

            received += credited;
        }

        Ok(received)
    }
}
