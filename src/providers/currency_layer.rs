use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::error::FetchError;
use crate::core::gateway::{CurrencyListResponse, ExchangeRateResponse, RateGateway};

/// Client for the currency layer `list` and `live` endpoints.
pub struct CurrencyLayerProvider {
    base_url: String,
    access_key: String,
    client: reqwest::Client,
}

impl CurrencyLayerProvider {
    pub fn new(base_url: &str, access_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("xchange/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(CurrencyLayerProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &str) -> Result<T, FetchError> {
        // The access key is part of the URL, so only the endpoint is logged.
        let url = format!(
            "{}/{}?access_key={}{}",
            self.base_url, endpoint, self.access_key, query
        );
        debug!("Requesting {} from currency layer", endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(format!("Request error: {e} for {endpoint}")))?;

        if !response.status().is_success() {
            return Err(FetchError::Transport(format!(
                "HTTP error: {} for {}",
                response.status(),
                endpoint
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("Body read error: {e} for {endpoint}")))?;

        serde_json::from_str(&text).map_err(|e| {
            FetchError::Decode(format!("Failed to parse JSON response for {endpoint}: {e}"))
        })
    }
}

#[async_trait]
impl RateGateway for CurrencyLayerProvider {
    #[instrument(name = "CurrencyListFetch", skip(self))]
    async fn fetch_list(&self) -> Result<CurrencyListResponse, FetchError> {
        self.get("list", "").await
    }

    #[instrument(name = "ExchangeRateFetch", skip(self), fields(source = %source))]
    async fn fetch_rate(&self, source: &str) -> Result<ExchangeRateResponse, FetchError> {
        self.get("live", &format!("&source={source}")).await
    }
}
