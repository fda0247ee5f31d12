#![doc = include_str!("../README.md")]

pub mod amount;
pub mod derivation;
pub mod dhke;
pub mod error;
pub mod mint_url;
pub mod nuts;
pub mod secret;
pub mod util;

pub use self::amount::Amount;
pub use self::error::Error;
pub use self::mint_url::MintUrl;
pub use self::nuts::*;
pub use self::secret::Secret;
pub use self::util::SECP256K1;
