//! Upstream exchange-rate service abstraction

use crate::core::error::FetchError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Error object reported by upstream next to `success: false`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub info: Option<String>,
}

/// Decoded body of the currency list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrencyListResponse {
    pub success: bool,
    pub error: Option<ApiError>,
    #[serde(default)]
    pub currencies: HashMap<String, String>,
}

/// Decoded body of the live rates endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeRateResponse {
    pub success: bool,
    pub error: Option<ApiError>,
    pub timestamp: Option<i64>,
    pub source: Option<String>,
    #[serde(default)]
    pub quotes: HashMap<String, f64>,
}

/// Turns a `success: false` body into an [`FetchError::Api`].
pub(crate) fn api_failure(error: Option<ApiError>) -> FetchError {
    match error {
        Some(ApiError { code, info }) => FetchError::Api { code, info },
        None => FetchError::Decode("Upstream reported failure without an error object".to_string()),
    }
}

/// Performs the two upstream calls. Transport and decode problems come back
/// as errors; API-level failures come back as `success: false` bodies.
#[async_trait]
pub trait RateGateway: Send + Sync {
    async fn fetch_list(&self) -> Result<CurrencyListResponse, FetchError>;
    async fn fetch_rate(&self, source: &str) -> Result<ExchangeRateResponse, FetchError>;
}
