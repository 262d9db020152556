//! Persistence abstraction for cached rate data

use crate::core::currency::{CurrencyList, ExchangeRate};
use anyhow::Result;
use async_trait::async_trait;

/// Durable storage for the currency list singleton, one rate table per
/// source code and the selected code. Writes replace by key.
#[async_trait]
pub trait CurrencyStore: Send + Sync {
    async fn get_list(&self) -> Result<Option<CurrencyList>>;
    async fn put_list(&self, list: &CurrencyList) -> Result<()>;
    async fn get_rate(&self, source: &str) -> Result<Option<ExchangeRate>>;
    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()>;
    async fn get_selected_code(&self) -> Result<Option<String>>;
    async fn put_selected_code(&self, code: &str) -> Result<()>;
}
