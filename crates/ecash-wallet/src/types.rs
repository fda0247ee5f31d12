//! Wallet types

use ecash::nuts::{CurrencyUnit, Proof, Proofs, State};
use ecash::util::unix_time;
use ecash::{Amount, MintUrl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteState {
    /// Waiting on the lightning side
    Pending,
    /// Settled
    Paid,
    /// Deadline passed before settlement
    Expired,
    /// The mint reported failure
    Failed,
}

/// A mint's promise to issue ecash once its invoice is paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Quote id
    pub id: String,
    /// Mint that issued the quote
    pub mint_url: MintUrl,
    /// Amount to be issued
    pub amount: Amount,
    /// Unit of the amount
    pub unit: CurrencyUnit,
    /// Bolt11 invoice to pay
    pub request: String,
    /// Quote state
    pub state: QuoteState,
    /// Unix timestamp the quote expires at; zero means unknown
    pub expiry: u64,
}

impl MintQuote {
    /// Whether the quote deadline has passed
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry != 0 && self.expiry <= now
    }
}

/// A mint's promise to pay an invoice in exchange for proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    /// Quote id
    pub id: String,
    /// Mint that issued the quote
    pub mint_url: MintUrl,
    /// Amount of the destination invoice
    pub amount: Amount,
    /// Unit of the amount
    pub unit: CurrencyUnit,
    /// The destination bolt11 invoice
    pub request: String,
    /// Fee the mint reserves for the lightning payment
    pub fee_reserve: Amount,
    /// Quote state
    pub state: QuoteState,
    /// Unix timestamp the quote expires at; zero means unknown
    pub expiry: u64,
}

impl MeltQuote {
    /// Whether the quote deadline has passed
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry != 0 && self.expiry <= now
    }
}

/// Outcome of a melt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melted {
    /// Whether the lightning payment settled
    pub paid: bool,
    /// Preimage of the settled payment
    pub preimage: Option<String>,
    /// Change issued back by the mint
    pub change: Proofs,
}

/// Transaction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Lightning in, ecash out
    Mint,
    /// Ecash in, lightning out
    Melt,
    /// Token handed to a counterparty
    SendEcash,
    /// Token redeemed from a counterparty
    ReceiveEcash,
}

/// Status of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Committed
    Completed,
    /// Still in flight
    Pending,
    /// Aborted
    Failed,
}

/// User-facing history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Wallet-local id, for display only; never part of dedup
    pub id: Uuid,
    /// Mint involved
    pub mint_url: MintUrl,
    /// Kind of transaction
    pub kind: TransactionKind,
    /// Amount moved
    pub amount: Amount,
    /// Fee paid
    pub fee: Amount,
    /// Memo
    pub memo: Option<String>,
    /// Unix timestamp
    pub timestamp: u64,
    /// Status
    pub status: TransactionStatus,
}

impl Transaction {
    /// New completed transaction stamped with the current time
    pub fn new(
        mint_url: MintUrl,
        kind: TransactionKind,
        amount: Amount,
        fee: Amount,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mint_url,
            kind,
            amount,
            fee,
            memo,
            timestamp: unix_time(),
            status: TransactionStatus::Completed,
        }
    }
}

/// A proof with its lifecycle metadata, as held by the store
///
/// The store keys on the signature point `C`; two records with the same
/// `C` are the same proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// The wire proof
    pub proof: Proof,
    /// Mint that issued the proof
    pub mint_url: MintUrl,
    /// Lifecycle state
    pub state: State,
    /// Unix timestamp the wallet first saw the proof
    pub created_at: u64,
    /// Reservation deadline while `state` is reserved
    pub reserved_until: Option<u64>,
}

impl ProofInfo {
    /// Wrap a wire proof
    pub fn new(proof: Proof, mint_url: MintUrl, state: State) -> Self {
        Self {
            proof,
            mint_url,
            state,
            created_at: unix_time(),
            reserved_until: None,
        }
    }
}
