//! Mint protocol types (NUTs)

pub mod nut00;
pub mod nut01;
pub mod nut02;
pub mod nut03;
pub mod nut04;
pub mod nut05;
pub mod nut06;
pub mod nut07;
pub mod nut09;

pub use nut00::{
    BlindSignature, BlindedMessage, CurrencyUnit, PreMint, PreMintSecrets, Proof, Proofs,
    ProofsMethods, Token, TokenEntry,
};
pub use nut01::{Keys, PublicKey, SecretKey};
pub use nut02::{fee_for_inputs, KeySet, KeySetInfo, KeysResponse, KeysetId, KeysetResponse};
pub use nut03::{SwapRequest, SwapResponse};
pub use nut04::{
    MintBolt11Request, MintBolt11Response, MintQuoteBolt11Request, MintQuoteBolt11Response,
};
pub use nut05::{
    MeltBolt11Request, MeltBolt11Response, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
};
pub use nut06::{MintInfo, MintVersion};
pub use nut07::{CheckStateRequest, CheckStateResponse, ProofState, State};
pub use nut09::{RestoreRequest, RestoreResponse};
