//! Mint connector
//!
//! Everything the engine needs from a mint is a method on
//! [`MintConnector`]; the HTTP implementation below is one binding of
//! that contract, and tests bind it to a scripted fake instead.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use ecash::nuts::{
    CheckStateRequest, CheckStateResponse, KeySet, KeysResponse, KeysetId, KeysetResponse,
    MeltBolt11Request, MeltBolt11Response, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
    MintBolt11Request, MintBolt11Response, MintInfo, MintQuoteBolt11Request,
    MintQuoteBolt11Response, RestoreRequest, RestoreResponse, SwapRequest, SwapResponse,
};
use ecash::MintUrl;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use crate::error::{Error, ErrorResponse};

/// Default timeout of mint requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Restore batches are small and retried by the scanner, so fail fast
const RESTORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Abstract interface to a remote mint
#[async_trait]
pub trait MintConnector: Debug + Send + Sync {
    /// Mint metadata
    async fn get_mint_info(&self, mint_url: &MintUrl) -> Result<MintInfo, Error>;

    /// Active keysets with their keys
    async fn get_keys(&self, mint_url: &MintUrl) -> Result<Vec<KeySet>, Error>;

    /// Keys of a specific keyset
    async fn get_keyset_keys(
        &self,
        mint_url: &MintUrl,
        keyset_id: &KeysetId,
    ) -> Result<KeySet, Error>;

    /// All keyset ids with activity flag and fee
    async fn get_keyset_ids(&self, mint_url: &MintUrl) -> Result<KeysetResponse, Error>;

    /// Request a mint quote
    async fn post_mint_quote(
        &self,
        mint_url: &MintUrl,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error>;

    /// Payment status of a mint quote
    async fn get_mint_quote_status(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error>;

    /// Execute a paid mint quote
    async fn post_mint(
        &self,
        mint_url: &MintUrl,
        request: MintBolt11Request,
    ) -> Result<MintBolt11Response, Error>;

    /// Request a melt quote
    async fn post_melt_quote(
        &self,
        mint_url: &MintUrl,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error>;

    /// Execute a melt quote
    async fn post_melt(
        &self,
        mint_url: &MintUrl,
        request: MeltBolt11Request,
    ) -> Result<MeltBolt11Response, Error>;

    /// Swap inputs for new outputs
    async fn post_swap(
        &self,
        mint_url: &MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error>;

    /// Recover signatures for previously submitted outputs
    async fn post_restore(
        &self,
        mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error>;

    /// Check whether proofs are spent at the mint
    async fn post_check_state(
        &self,
        mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error>;
}

/// HTTP binding of [`MintConnector`]
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Create new [`HttpClient`]
    pub fn new() -> Self {
        Self {
            inner: Client::new(),
        }
    }

    async fn http_get<T>(&self, url: Url) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .get(url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        decode(response).await
    }

    async fn http_post<B, T>(&self, url: Url, body: &B, timeout: Duration) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        decode(response).await
    }
}

/// Decode the expected type, falling back to the mint's error object
async fn decode<T>(response: reqwest::Response) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let value: Value = response
        .json()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;

    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(_) => Err(ErrorResponse::from_value(value)),
    }
}

#[async_trait]
impl MintConnector for HttpClient {
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_info(&self, mint_url: &MintUrl) -> Result<MintInfo, Error> {
        let url = mint_url.join_paths(&["v1", "info"])?;
        self.http_get(url).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_keys(&self, mint_url: &MintUrl) -> Result<Vec<KeySet>, Error> {
        let url = mint_url.join_paths(&["v1", "keys"])?;
        let response: KeysResponse = self.http_get(url).await?;
        Ok(response.keysets)
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_keyset_keys(
        &self,
        mint_url: &MintUrl,
        keyset_id: &KeysetId,
    ) -> Result<KeySet, Error> {
        let url = mint_url.join_paths(&["v1", "keys", keyset_id.as_str()])?;
        let response: KeysResponse = self.http_get(url).await?;
        response
            .keysets
            .into_iter()
            .next()
            .ok_or_else(|| Error::Protocol(format!("No keys returned for keyset {keyset_id}")))
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_keyset_ids(&self, mint_url: &MintUrl) -> Result<KeysetResponse, Error> {
        let url = mint_url.join_paths(&["v1", "keysets"])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_mint_quote(
        &self,
        mint_url: &MintUrl,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "quote", "bolt11"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_quote_status(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_mint(
        &self,
        mint_url: &MintUrl,
        request: MintBolt11Request,
    ) -> Result<MintBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "bolt11"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt_quote(
        &self,
        mint_url: &MintUrl,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "quote", "bolt11"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt(
        &self,
        mint_url: &MintUrl,
        request: MeltBolt11Request,
    ) -> Result<MeltBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "bolt11"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_swap(
        &self,
        mint_url: &MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        let url = mint_url.join_paths(&["v1", "swap"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_restore(
        &self,
        mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error> {
        let url = mint_url.join_paths(&["v1", "restore"])?;
        self.http_post(url, &request, RESTORE_TIMEOUT).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_check_state(
        &self,
        mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let url = mint_url.join_paths(&["v1", "checkstate"])?;
        self.http_post(url, &request, DEFAULT_TIMEOUT).await
    }
}
