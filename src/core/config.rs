use anyhow::{Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

fn default_base_url() -> String {
    "http://api.currencylayer.com".to_string()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_fallback_currency() -> String {
    "JPY".to_string()
}

fn default_rates_freshness_minutes() -> i64 {
    30
}

fn default_list_freshness_hours() -> i64 {
    6
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Access key for the currency layer service.
    pub access_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// The only source currency the upstream plan serves directly.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Selected when nothing is stored yet, and whenever a selected code
    /// turns out to be unusable.
    #[serde(default = "default_fallback_currency")]
    pub fallback_currency: String,
    #[serde(default = "default_rates_freshness_minutes")]
    pub rates_freshness_minutes: i64,
    #[serde(default = "default_list_freshness_hours")]
    pub list_freshness_hours: i64,
    pub data_path: Option<String>,
}

/// How long cached entries are served without asking upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub rates: Duration,
    pub list: Duration,
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            rates: Duration::minutes(default_rates_freshness_minutes()),
            list: Duration::hours(default_list_freshness_hours()),
        }
    }
}

impl AppConfig {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            base_url: default_base_url(),
            base_currency: default_base_currency(),
            fallback_currency: default_fallback_currency(),
            rates_freshness_minutes: default_rates_freshness_minutes(),
            list_freshness_hours: default_list_freshness_hours(),
            data_path: None,
        }
    }

    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "xchange", "xchange")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "xchange", "xchange")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn freshness(&self) -> Freshness {
        Freshness {
            rates: Duration::minutes(self.rates_freshness_minutes),
            list: Duration::hours(self.list_freshness_hours),
        }
    }
}
