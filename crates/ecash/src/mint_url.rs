//! Mint url
//!
//! Mint identity is the base URL with trailing slashes trimmed, so that
//! `https://mint.example` and `https://mint.example/` compare equal.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

/// Url Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Url path segments could not be joined
    #[error("Url path segments could not be joined")]
    UrlPathSegments,
}

/// Mint base url
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MintUrl(String);

impl MintUrl {
    /// New mint url
    pub fn new<S>(url: S) -> Self
    where
        S: Into<String>,
    {
        let url: String = url.into();
        Self(url.trim_end_matches('/').to_string())
    }

    /// Join path segments onto the base url
    pub fn join_paths(&self, paths: &[&str]) -> Result<Url, Error> {
        let mut url: Url = Url::parse(&self.0)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlPathSegments)?
            .pop_if_empty()
            .extend(paths);
        Ok(url)
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let url = String::deserialize(deserializer)?;
        Ok(MintUrl::new(url))
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(url))
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
