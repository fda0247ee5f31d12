//! Melt: ecash in, lightning out

use ecash::dhke::construct_proofs;
use ecash::nuts::{
    CurrencyUnit, KeySet, MeltBolt11Request, MeltQuoteBolt11Request, PreMintSecrets,
    ProofsMethods, State,
};
use ecash::util::unix_time;
use ecash::{Amount, MintUrl, Proofs};
use tracing::instrument;

use super::{Wallet, RESERVATION_TIMEOUT};
use crate::error::Error;
use crate::events::WalletEvent;
use crate::types::{MeltQuote, Melted, ProofInfo, QuoteState, Transaction, TransactionKind};

/// Extra sats reserved on top of amount and fee reserve, so a quote
/// whose reserve turns out a little short still settles
const SAFETY_BUFFER: u64 = 3;

impl Wallet {
    /// Ask the mint what paying `request` will cost
    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    pub async fn melt_quote(
        &self,
        mint_url: &MintUrl,
        request: String,
    ) -> Result<MeltQuote, Error> {
        self.require_mint(mint_url).await?;

        let response = self
            .connector
            .post_melt_quote(
                mint_url,
                MeltQuoteBolt11Request {
                    request: request.clone(),
                    unit: CurrencyUnit::Sat,
                },
            )
            .await?;

        let quote = MeltQuote {
            id: response.quote,
            mint_url: mint_url.clone(),
            amount: response.amount,
            unit: CurrencyUnit::Sat,
            request,
            fee_reserve: response.fee_reserve,
            state: QuoteState::Pending,
            expiry: response.expiry.unwrap_or(0),
        };

        self.localstore.add_melt_quote(quote.clone()).await?;
        self.events.publish(WalletEvent::QuoteUpdated {
            quote_id: quote.id.clone(),
        });

        Ok(quote)
    }

    /// Pay the invoice behind a melt quote
    ///
    /// Inputs covering amount, fee reserve and a small buffer are
    /// reserved up front; the surplus is blinded as a change ladder so
    /// the mint can sign back exactly what the payment did not consume.
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn melt(&self, mint_url: &MintUrl, quote_id: &str) -> Result<Melted, Error> {
        let quote = self
            .localstore
            .get_melt_quote(quote_id)
            .await?
            .ok_or_else(|| Error::InvalidQuote(format!("Unknown melt quote {quote_id}")))?;

        if quote.is_expired(unix_time()) {
            return Err(Error::InvalidQuote(format!("Melt quote {quote_id} expired")));
        }

        let keyset = self.active_keyset(mint_url).await?;

        let target = quote
            .amount
            .checked_add(quote.fee_reserve)
            .and_then(|total| total.checked_add(Amount::from(SAFETY_BUFFER)))
            .ok_or(Error::InsufficientFunds)?;

        let inputs = self
            .localstore
            .reserve_proofs(mint_url, target, RESERVATION_TIMEOUT)
            .await?;

        match self.execute_melt(mint_url, &quote, &keyset, &inputs).await {
            Ok(melted) => Ok(melted),
            Err(err) => {
                self.rollback_reservation(&inputs).await;
                Err(err)
            }
        }
    }

    async fn execute_melt(
        &self,
        mint_url: &MintUrl,
        quote: &MeltQuote,
        keyset: &KeySet,
        inputs: &Proofs,
    ) -> Result<Melted, Error> {
        let total_input = inputs.total_amount()?;
        let surplus = total_input
            .checked_sub(quote.amount)
            .ok_or(Error::InsufficientFunds)?;

        // Change ladder: the mint signs the subset summing to the change
        // actually owed after lightning fees
        super::swap::ensure_denomination_keys(keyset, &surplus.ladder())?;
        let premint = PreMintSecrets::ladder(keyset.id.clone(), surplus)?;

        let request = MeltBolt11Request {
            quote: quote.id.clone(),
            inputs: inputs.clone(),
            outputs: (!premint.is_empty()).then(|| premint.blinded_messages()),
        };

        let response = self.connector.post_melt(mint_url, request).await?;

        if !response.paid {
            return Err(Error::PaymentFailed);
        }

        let change = match response.change {
            Some(signatures) if !signatures.is_empty() => {
                construct_proofs(signatures, &premint, &keyset.keys)?
            }
            _ => Proofs::new(),
        };
        let change_total = change.total_amount()?;

        self.localstore
            .add_proofs(
                change
                    .iter()
                    .cloned()
                    .map(|proof| ProofInfo::new(proof, mint_url.clone(), State::Unspent))
                    .collect(),
            )
            .await?;
        let input_ids: Vec<_> = inputs.iter().map(|proof| proof.c).collect();
        self.localstore.mark_proofs_spent(&input_ids).await?;

        let mut paid_quote = quote.clone();
        paid_quote.state = QuoteState::Paid;
        self.localstore.add_melt_quote(paid_quote).await?;

        // What melting actually cost beyond the invoice amount
        let fee = total_input - change_total - quote.amount;
        self.localstore
            .add_transaction(Transaction::new(
                mint_url.clone(),
                TransactionKind::Melt,
                quote.amount,
                fee,
                None,
            ))
            .await?;

        self.events.publish(WalletEvent::ProofsUpdated {
            mint_url: mint_url.clone(),
        });
        self.events.publish(WalletEvent::QuoteUpdated {
            quote_id: quote.id.clone(),
        });
        self.events.publish(WalletEvent::HistoryUpdated);

        Ok(Melted {
            paid: true,
            preimage: response.payment_preimage,
            change,
        })
    }
}
