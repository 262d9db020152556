use crate::core::currency::{CurrencyList, ExchangeRate};
use crate::core::store::CurrencyStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    list: Option<CurrencyList>,
    rates: HashMap<String, ExchangeRate>,
    selected_code: Option<String>,
}

/// In-memory store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurrencyStore for MemoryStore {
    async fn get_list(&self) -> Result<Option<CurrencyList>> {
        Ok(self.inner.lock().await.list.clone())
    }

    async fn put_list(&self, list: &CurrencyList) -> Result<()> {
        debug!(entries = list.len(), "Store PUT currency list");
        self.inner.lock().await.list = Some(list.clone());
        Ok(())
    }

    async fn get_rate(&self, source: &str) -> Result<Option<ExchangeRate>> {
        let state = self.inner.lock().await;
        let rate = state.rates.get(source).cloned();
        if rate.is_some() {
            debug!("Store HIT for rate: {}", source);
        } else {
            debug!("Store MISS for rate: {}", source);
        }
        Ok(rate)
    }

    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()> {
        debug!("Store PUT for rate: {}", rate.source());
        self.inner
            .lock()
            .await
            .rates
            .insert(rate.source().to_string(), rate.clone());
        Ok(())
    }

    async fn get_selected_code(&self) -> Result<Option<String>> {
        Ok(self.inner.lock().await.selected_code.clone())
    }

    async fn put_selected_code(&self, code: &str) -> Result<()> {
        self.inner.lock().await.selected_code = Some(code.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::{Currency, Quote};
    use chrono::Utc;

    #[tokio::test]
    async fn test_rate_upsert_by_source() {
        let store = MemoryStore::new();
        assert!(store.get_rate("USD").await.unwrap().is_none());

        let first = ExchangeRate::new("USD", None, Utc::now(), vec![Quote::new("USDJPY", 110.0)]);
        store.put_rate(&first).await.unwrap();
        let second = ExchangeRate::new("USD", None, Utc::now(), vec![Quote::new("USDEUR", 0.9)]);
        store.put_rate(&second).await.unwrap();

        assert_eq!(store.get_rate("USD").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_list_and_selected_code() {
        let store = MemoryStore::new();
        assert!(store.get_list().await.unwrap().is_none());
        assert!(store.get_selected_code().await.unwrap().is_none());

        let list = CurrencyList::new(Utc::now(), vec![Currency::new("USD", "US Dollar")]);
        store.put_list(&list).await.unwrap();
        store.put_selected_code("EUR").await.unwrap();

        assert_eq!(store.get_list().await.unwrap(), Some(list));
        assert_eq!(store.get_selected_code().await.unwrap().as_deref(), Some("EUR"));
    }
}
