pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{ExchangeService, ServiceSettings};
use crate::providers::CurrencyLayerProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    List,
    Rates { code: Option<String>, amount: f64 },
}

/// Loads configuration and starts the rate service against the configured
/// upstream and on-disk cache.
pub fn start_service(config: &AppConfig) -> Result<ExchangeService> {
    let gateway = Arc::new(CurrencyLayerProvider::new(
        &config.base_url,
        &config.access_key,
    )?);
    let store = store::open(config)?;
    Ok(ExchangeService::start(
        ServiceSettings::from(config),
        gateway,
        store,
    ))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("XChange starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.base_url,
        base_currency = %config.base_currency,
        "Loaded config"
    );

    let service = start_service(&config)?;

    match command {
        AppCommand::List => cli::list::display_list(&service).await,
        AppCommand::Rates { code, amount } => {
            cli::rates::display_rates(&service, code.as_deref(), amount).await
        }
    }
}
