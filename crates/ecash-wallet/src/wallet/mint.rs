//! Mint: lightning in, ecash out

use std::time::Duration;

use ecash::dhke::construct_proofs;
use ecash::nuts::{
    CurrencyUnit, MintBolt11Request, MintQuoteBolt11Request, PreMintSecrets, ProofsMethods,
    RestoreRequest, State,
};
use ecash::util::unix_time;
use ecash::{Amount, MintUrl};
use tracing::instrument;

use super::Wallet;
use crate::error::{Error, ErrorCode};
use crate::events::WalletEvent;
use crate::types::{MintQuote, ProofInfo, QuoteState, Transaction, TransactionKind};

/// Interval between payment status polls
const QUOTE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default deadline for a quote to be paid
pub const QUOTE_POLL_TIMEOUT: Duration = Duration::from_secs(120);

impl Wallet {
    /// Request a quote: the mint hands out an invoice that, once paid,
    /// entitles the wallet to `amount` of ecash
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn mint_quote(&self, mint_url: &MintUrl, amount: Amount) -> Result<MintQuote, Error> {
        self.ensure_mint(mint_url).await?;

        let response = self
            .connector
            .post_mint_quote(
                mint_url,
                MintQuoteBolt11Request {
                    amount,
                    unit: CurrencyUnit::Sat,
                },
            )
            .await?;

        let quote = MintQuote {
            id: response.quote,
            mint_url: mint_url.clone(),
            amount,
            unit: CurrencyUnit::Sat,
            request: response.request,
            state: if response.paid {
                QuoteState::Paid
            } else {
                QuoteState::Pending
            },
            expiry: response.expiry.unwrap_or(0),
        };

        self.localstore.add_mint_quote(quote.clone()).await?;
        self.events.publish(WalletEvent::QuoteUpdated {
            quote_id: quote.id.clone(),
        });

        Ok(quote)
    }

    /// Refresh the payment state of a quote from the mint
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn mint_quote_status(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MintQuote, Error> {
        let response = self
            .connector
            .get_mint_quote_status(mint_url, quote_id)
            .await?;

        let mut quote = self
            .localstore
            .get_mint_quote(quote_id)
            .await?
            .ok_or_else(|| Error::InvalidQuote(format!("Unknown mint quote {quote_id}")))?;

        if response.paid && quote.state == QuoteState::Pending {
            quote.state = QuoteState::Paid;
            self.localstore.add_mint_quote(quote.clone()).await?;
            self.events.publish(WalletEvent::QuoteUpdated {
                quote_id: quote.id.clone(),
            });
        }

        Ok(quote)
    }

    /// Poll the quote until its invoice is paid or `deadline` passes
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn wait_for_mint_quote_paid(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
        deadline: Duration,
    ) -> Result<MintQuote, Error> {
        let poll = async {
            loop {
                let quote = self.mint_quote_status(mint_url, quote_id).await?;
                match quote.state {
                    QuoteState::Paid => return Ok(quote),
                    _ if quote.is_expired(unix_time()) => {
                        return Err(Error::InvalidQuote(format!(
                            "Mint quote {quote_id} expired before payment"
                        )))
                    }
                    _ => tokio::time::sleep(QUOTE_POLL_INTERVAL).await,
                }
            }
        };

        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| Error::Network(format!("Timed out waiting for quote {quote_id}")))?
    }

    /// Execute a paid quote: plan, blind, have the mint sign, unblind
    /// and commit the fresh proofs
    ///
    /// If the mint claims the outputs were already signed (a reply to an
    /// earlier attempt was lost), the very same outputs are pushed
    /// through `/restore`, which returns the signatures the mint issued
    /// the first time around.
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    pub async fn mint(&self, mint_url: &MintUrl, quote_id: &str) -> Result<Amount, Error> {
        let mut quote = self
            .localstore
            .get_mint_quote(quote_id)
            .await?
            .ok_or_else(|| Error::InvalidQuote(format!("Unknown mint quote {quote_id}")))?;

        if quote.state != QuoteState::Paid && quote.is_expired(unix_time()) {
            return Err(Error::InvalidQuote(format!("Mint quote {quote_id} expired")));
        }

        let keyset = self.active_keyset(mint_url).await?;
        super::swap::ensure_denomination_keys(&keyset, &quote.amount.split())?;
        let premint = PreMintSecrets::random(keyset.id.clone(), quote.amount)?;

        let request = MintBolt11Request {
            quote: quote_id.to_string(),
            outputs: premint.blinded_messages(),
        };

        let signatures = match self.connector.post_mint(mint_url, request).await {
            Ok(response) => response.signatures,
            Err(Error::Mint(response))
                if response.code == ErrorCode::BlindedMessageAlreadySigned =>
            {
                // Zombie quote: a previous attempt reached the mint but
                // its reply never reached us. Recover the signatures.
                tracing::warn!(
                    "Mint reports outputs of quote {quote_id} already signed, recovering"
                );
                let restore = self
                    .connector
                    .post_restore(
                        mint_url,
                        RestoreRequest {
                            outputs: premint.blinded_messages(),
                        },
                    )
                    .await?;
                restore.signatures
            }
            Err(err) => return Err(err),
        };

        let proofs = construct_proofs(signatures, &premint, &keyset.keys)?;
        let minted = proofs.total_amount()?;

        self.localstore
            .add_proofs(
                proofs
                    .into_iter()
                    .map(|proof| ProofInfo::new(proof, mint_url.clone(), State::Unspent))
                    .collect(),
            )
            .await?;

        quote.state = QuoteState::Paid;
        self.localstore.add_mint_quote(quote).await?;

        self.localstore
            .add_transaction(Transaction::new(
                mint_url.clone(),
                TransactionKind::Mint,
                minted,
                Amount::ZERO,
                None,
            ))
            .await?;

        self.events.publish(WalletEvent::ProofsUpdated {
            mint_url: mint_url.clone(),
        });
        self.events.publish(WalletEvent::QuoteUpdated {
            quote_id: quote_id.to_string(),
        });
        self.events.publish(WalletEvent::HistoryUpdated);

        Ok(minted)
    }
}
