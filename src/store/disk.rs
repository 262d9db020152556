use crate::core::currency::{CurrencyList, ExchangeRate};
use crate::core::store::CurrencyStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tracing::debug;

const LIST_KEY: &str = "currency_list";
const SELECTED_CODE_KEY: &str = "selected_code";

/// fjall-backed store. Every write is synced before returning so cached
/// data survives restarts.
pub struct DiskStore {
    keyspace: Keyspace,
    meta: PartitionHandle,
    rates: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;
        let rates = keyspace.open_partition("rates", PartitionCreateOptions::default())?;
        debug!("Opened store at {}", path.display());

        Ok(Self {
            keyspace,
            meta,
            rates,
        })
    }

    fn read<V: DeserializeOwned>(partition: &PartitionHandle, key: &str) -> Result<Option<V>> {
        match partition.get(key)? {
            Some(bytes) => {
                debug!("Store HIT for key: {}", key);
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt store entry for key: {key}"))?;
                Ok(Some(value))
            }
            None => {
                debug!("Store MISS for key: {}", key);
                Ok(None)
            }
        }
    }

    fn write<V: Serialize>(&self, partition: &PartitionHandle, key: &str, value: &V) -> Result<()> {
        partition.insert(key, serde_json::to_vec(value)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Store PUT for key: {}", key);
        Ok(())
    }
}

#[async_trait]
impl CurrencyStore for DiskStore {
    async fn get_list(&self) -> Result<Option<CurrencyList>> {
        Self::read(&self.meta, LIST_KEY)
    }

    async fn put_list(&self, list: &CurrencyList) -> Result<()> {
        self.write(&self.meta, LIST_KEY, list)
    }

    async fn get_rate(&self, source: &str) -> Result<Option<ExchangeRate>> {
        Self::read(&self.rates, source)
    }

    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()> {
        self.write(&self.rates, rate.source(), rate)
    }

    async fn get_selected_code(&self) -> Result<Option<String>> {
        Self::read(&self.meta, SELECTED_CODE_KEY)
    }

    async fn put_selected_code(&self, code: &str) -> Result<()> {
        self.write(&self.meta, SELECTED_CODE_KEY, &code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::{Currency, Quote};
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disk_store_get_put() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        // Initially, store is empty
        assert!(store.get_list().await.unwrap().is_none());
        assert!(store.get_rate("USD").await.unwrap().is_none());

        let list = CurrencyList::new(
            Utc::now(),
            vec![Currency::new("USD", "US Dollar"), Currency::new("EUR", "Euro")],
        );
        store.put_list(&list).await.unwrap();
        assert_eq!(store.get_list().await.unwrap(), Some(list));

        store.put_selected_code("EUR").await.unwrap();
        assert_eq!(
            store.get_selected_code().await.unwrap().as_deref(),
            Some("EUR")
        );
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let rate = ExchangeRate::new("USD", None, Utc::now(), vec![Quote::new("USDJPY", 110.0)]);
        {
            let store = DiskStore::open(dir.path()).unwrap();
            store.put_rate(&rate).await.unwrap();
        }

        let store = DiskStore::open(dir.path()).unwrap();
        assert_eq!(store.get_rate("USD").await.unwrap(), Some(rate));
    }

    #[tokio::test]
    async fn test_disk_store_rate_upsert() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        let old = ExchangeRate::new("USD", None, Utc::now(), vec![Quote::new("USDJPY", 110.0)]);
        let new = ExchangeRate::new("USD", None, Utc::now(), vec![Quote::new("USDEUR", 0.9)]);
        store.put_rate(&old).await.unwrap();
        store.put_rate(&new).await.unwrap();
        assert_eq!(store.get_rate("USD").await.unwrap(), Some(new));
        assert!(store.get_rate("EUR").await.unwrap().is_none());
    }
}
