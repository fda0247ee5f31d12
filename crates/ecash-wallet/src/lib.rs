#![doc = include_str!("../README.md")]

pub mod client;
pub mod database;
pub mod error;
pub mod events;
pub mod types;
pub mod wallet;

pub use client::{HttpClient, MintConnector};
pub use database::{WalletDatabase, WalletMemoryDatabase};
pub use error::Error;
pub use events::{EventBus, WalletEvent};
pub use types::{
    MeltQuote, Melted, MintQuote, ProofInfo, QuoteState, Transaction, TransactionKind,
    TransactionStatus,
};
pub use wallet::{SeedHolder, Wallet};
