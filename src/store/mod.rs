pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::CurrencyStore;
use anyhow::Result;
use std::sync::Arc;

pub use disk::DiskStore;
pub use memory::MemoryStore;

/// Opens the durable store under the configured data directory.
pub fn open(config: &AppConfig) -> Result<Arc<dyn CurrencyStore>> {
    let path = config.default_data_path()?.join("cache");
    Ok(Arc::new(DiskStore::open(&path)?))
}
