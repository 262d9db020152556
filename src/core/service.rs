//! Rate and currency-list caching, base fetching and cross-rate derivation.
//!
//! All cache state lives in one actor task. Callers talk to it through a
//! cloneable [`ExchangeService`] handle and learn about results on the
//! [`EventBus`]. Network calls and derivations run on their own tasks and
//! report back to the actor as commands, so only the actor reads or writes
//! the store.

use crate::core::config::{AppConfig, Freshness};
use crate::core::currency::{Currency, CurrencyList, ExchangeRate, Quote};
use crate::core::derive::{Derivation, derive_rate};
use crate::core::error::{DataError, FetchError};
use crate::core::events::EventBus;
use crate::core::gateway::{CurrencyListResponse, ExchangeRateResponse, RateGateway, api_failure};
use crate::core::store::CurrencyStore;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_currency: String,
    pub fallback_currency: String,
    pub freshness: Freshness,
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_currency: config.base_currency.clone(),
            fallback_currency: config.fallback_currency.clone(),
            freshness: config.freshness(),
        }
    }
}

enum Command {
    RequestRate(String),
    RequestDerived(String),
    BaseForDerivation(String),
    RequestList,
    RateFetched {
        code: String,
        result: Result<ExchangeRateResponse, FetchError>,
    },
    ListFetched(Result<CurrencyListResponse, FetchError>),
    DerivationFinished {
        code: String,
        outcome: Result<Derivation, FetchError>,
    },
    PersistSelection(String),
    RestoreSelection(oneshot::Sender<()>),
}

/// Handle to the rate data layer. Cheap to clone; the actor stops once every
/// handle and every task it spawned is gone.
#[derive(Clone)]
pub struct ExchangeService {
    commands: mpsc::UnboundedSender<Command>,
    bus: EventBus,
}

impl ExchangeService {
    /// Spawns the actor on the current tokio runtime.
    pub fn start(
        settings: ServiceSettings,
        gateway: Arc<dyn RateGateway>,
        store: Arc<dyn CurrencyStore>,
    ) -> Self {
        let bus = EventBus::new(settings.fallback_currency.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = RateActor {
            settings,
            gateway,
            store,
            bus: bus.clone(),
            commands: tx.downgrade(),
            rate_fetches: HashSet::new(),
            list_fetch: false,
            derivations: HashMap::new(),
        };
        tokio::spawn(actor.run(rx));

        Self { commands: tx, bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Result arrives on `exchange_rate_ready` (and `base_exchange_rate_ready`
    /// for the base currency) or `data_error`.
    pub fn request_rate(&self, code: &str) {
        self.send(Command::RequestRate(code.to_string()));
    }

    /// Derives `code` from the base table. Concurrent requests for the same
    /// code share one derivation.
    pub fn request_derived(&self, code: &str) {
        self.send(Command::RequestDerived(code.to_string()));
    }

    /// Result arrives on `currency_list_ready` or `data_error`.
    pub fn request_list(&self) {
        self.send(Command::RequestList);
    }

    /// Publishes a new selected currency code.
    pub fn select(&self, code: &str) {
        self.bus.selected_currency.publish(code.to_string());
    }

    /// Republishes the persisted selected code if it differs from the
    /// current one.
    pub async fn restore_selection(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RestoreSelection(tx));
        let _ = rx.await;
    }

    /// Persists every selected code and requests its rates. Subscribers of
    /// the selection topic are notified before the code is persisted.
    pub fn follow_selection(&self) -> JoinHandle<()> {
        let mut selection = self.bus.selected_currency.subscribe();
        let service = self.clone();
        tokio::spawn(async move {
            while let Some(code) = selection.recv().await {
                debug!("Selected currency: {}", code);
                service.send(Command::PersistSelection(code.clone()));
                service.request_rate(&code);
            }
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Rate service is no longer running");
        }
    }
}

struct RateActor {
    settings: ServiceSettings,
    gateway: Arc<dyn RateGateway>,
    store: Arc<dyn CurrencyStore>,
    bus: EventBus,
    commands: mpsc::WeakUnboundedSender<Command>,
    // Codes with a network fetch outstanding.
    rate_fetches: HashSet<String>,
    list_fetch: bool,
    // Derivations waiting for the base table, one per target code.
    derivations: HashMap<String, JoinHandle<()>>,
}

impl RateActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("Rate service started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::RequestRate(code) => self.request_rate(code).await,
                Command::RequestDerived(code) => self.request_derived(code),
                Command::BaseForDerivation(code) => self.base_for_derivation(code).await,
                Command::RequestList => self.request_list().await,
                Command::RateFetched { code, result } => self.rate_fetched(code, result).await,
                Command::ListFetched(result) => self.list_fetched(result).await,
                Command::DerivationFinished { code, outcome } => {
                    self.derivation_finished(code, outcome).await
                }
                Command::PersistSelection(code) => {
                    if let Err(e) = self.store.put_selected_code(&code).await {
                        warn!(error = %e, "Failed to persist selected currency {}", code);
                    }
                }
                Command::RestoreSelection(done) => {
                    self.restore_selection().await;
                    let _ = done.send(());
                }
            }
        }
        for (_, derivation) in self.derivations.drain() {
            derivation.abort();
        }
        debug!("Rate service stopped");
    }

    async fn request_rate(&mut self, code: String) {
        match self.store.get_rate(&code).await {
            Ok(Some(rate)) if rate.is_fresh(Utc::now(), self.settings.freshness.rates) => {
                debug!(
                    "Exchange rate for {} retrieved {} minutes ago, reusing it",
                    code,
                    (Utc::now() - rate.retrieved_at()).num_minutes()
                );
                self.publish_rate(rate);
                return;
            }
            Ok(Some(_)) => debug!("Exchange rate for {} is stale", code),
            Ok(None) => debug!("No cached exchange rate for {}", code),
            Err(e) => warn!(error = %e, "Failed to read cached exchange rate for {}", code),
        }

        if code == self.settings.base_currency {
            self.fetch_rate(code);
        } else {
            self.request_derived(code);
        }
    }

    fn fetch_rate(&mut self, code: String) {
        if !self.rate_fetches.insert(code.clone()) {
            debug!("Fetch for {} already in flight", code);
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        info!("Fetching exchange rates for {}", code);
        tokio::spawn(async move {
            let result = gateway.fetch_rate(&code).await;
            let _ = commands.send(Command::RateFetched { code, result });
        });
    }

    async fn rate_fetched(&mut self, code: String, result: Result<ExchangeRateResponse, FetchError>) {
        self.rate_fetches.remove(&code);
        match result.and_then(|response| rate_from_response(&code, response)) {
            Ok(rate) => {
                info!("Received {} quotes for {}", rate.quotes().len(), code);
                self.persist_rate(&rate).await;
                self.publish_rate(rate);
            }
            Err(e) => {
                if code == self.settings.base_currency {
                    self.abort_derivations();
                }
                self.publish_error(&e);
            }
        }
    }

    fn request_derived(&mut self, code: String) {
        if code == self.settings.base_currency {
            debug!("Refusing to derive base currency {} from itself", code);
            return;
        }
        if self.derivations.contains_key(&code) {
            debug!("Derivation for {} already in flight", code);
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        info!("Deriving exchange rates for {}", code);
        let derivation = tokio::spawn(derive_from_base(code.clone(), self.bus.clone(), commands));
        self.derivations.insert(code, derivation);
    }

    // Derivations released by a failed base fetch must not start another one.
    async fn base_for_derivation(&mut self, code: String) {
        if !self.derivations.contains_key(&code) {
            debug!("Derivation for {} was released, skipping base request", code);
            return;
        }
        self.request_rate(self.settings.base_currency.clone()).await;
    }

    async fn derivation_finished(&mut self, code: String, outcome: Result<Derivation, FetchError>) {
        self.derivations.remove(&code);
        match outcome {
            Ok(Derivation::Derived(rate)) => {
                self.persist_rate(&rate).await;
                self.bus.exchange_rate_ready.publish(rate);
            }
            Ok(Derivation::UnknownTarget) if code == self.settings.fallback_currency => {
                self.publish_error(&FetchError::Derivation(format!(
                    "Fallback currency {} is not offered by the current plan",
                    code
                )));
            }
            Ok(Derivation::UnknownTarget) => {
                warn!(
                    "No {}{} quote, resetting selection to {}",
                    self.settings.base_currency, code, self.settings.fallback_currency
                );
                self.bus
                    .selected_currency
                    .publish(self.settings.fallback_currency.clone());
            }
            Err(e) => self.publish_error(&e),
        }
    }

    fn abort_derivations(&mut self) {
        for (code, derivation) in self.derivations.drain() {
            debug!("Aborting derivation for {}", code);
            derivation.abort();
        }
    }

    async fn request_list(&mut self) {
        match self.store.get_list().await {
            Ok(Some(list)) if list.is_fresh(Utc::now(), self.settings.freshness.list) => {
                debug!(
                    "Currency list retrieved {} minutes ago, reusing it",
                    (Utc::now() - list.retrieved_at()).num_minutes()
                );
                self.bus.currency_list_ready.publish(list);
                return;
            }
            Ok(Some(_)) => debug!("Currency list is stale"),
            Ok(None) => debug!("No cached currency list"),
            Err(e) => warn!(error = %e, "Failed to read cached currency list"),
        }

        if self.list_fetch {
            debug!("Currency list fetch already in flight");
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        self.list_fetch = true;
        let gateway = Arc::clone(&self.gateway);
        info!("Fetching currency list");
        tokio::spawn(async move {
            let result = gateway.fetch_list().await;
            let _ = commands.send(Command::ListFetched(result));
        });
    }

    async fn list_fetched(&mut self, result: Result<CurrencyListResponse, FetchError>) {
        self.list_fetch = false;
        match result.and_then(list_from_response) {
            Ok(list) => {
                info!("Received {} currencies", list.len());
                if let Err(e) = self.store.put_list(&list).await {
                    warn!(error = %e, "Failed to persist currency list");
                }
                self.bus.currency_list_ready.publish(list);
            }
            Err(e) => self.publish_error(&e),
        }
    }

    async fn restore_selection(&mut self) {
        match self.store.get_selected_code().await {
            Ok(Some(code)) if self.bus.selected_currency.current().as_ref() != Some(&code) => {
                debug!("Restoring selected currency {}", code);
                self.bus.selected_currency.publish(code);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read selected currency"),
        }
    }

    async fn persist_rate(&self, rate: &ExchangeRate) {
        if let Err(e) = self.store.put_rate(rate).await {
            warn!(error = %e, "Failed to persist exchange rate for {}", rate.source());
        }
    }

    fn publish_rate(&self, rate: ExchangeRate) {
        if rate.source() == self.settings.base_currency {
            self.bus.exchange_rate_ready.publish(rate.clone());
            self.bus.base_exchange_rate_ready.publish(rate);
        } else {
            self.bus.exchange_rate_ready.publish(rate);
        }
    }

    fn publish_error(&self, err: &FetchError) {
        warn!(error = %err, "Data request failed");
        self.bus.data_error.publish(DataError::from(err));
    }
}

/// Waits for the next base table, then derives `code` from it and hands the
/// outcome back to the actor.
async fn derive_from_base(
    code: String,
    bus: EventBus,
    commands: mpsc::UnboundedSender<Command>,
) {
    let base_ready = bus.base_exchange_rate_ready.once();
    if commands.send(Command::BaseForDerivation(code.clone())).is_err() {
        return;
    }
    let Ok(base) = base_ready.await else {
        return;
    };
    let outcome = derive_rate(&base, &code);
    let _ = commands.send(Command::DerivationFinished { code, outcome });
}

fn rate_from_response(code: &str, response: ExchangeRateResponse) -> Result<ExchangeRate, FetchError> {
    if !response.success {
        return Err(api_failure(response.error));
    }
    let source = response
        .source
        .ok_or_else(|| FetchError::Decode(format!("Missing source in rates for {code}")))?;
    if source != code {
        return Err(FetchError::Decode(format!(
            "Requested rates for {code} but received {source}"
        )));
    }
    let api_timestamp = response
        .timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
    let quotes = response
        .quotes
        .into_iter()
        .map(|(pair, rate)| Quote::new(pair, rate));
    Ok(ExchangeRate::new(source, api_timestamp, Utc::now(), quotes))
}

fn list_from_response(response: CurrencyListResponse) -> Result<CurrencyList, FetchError> {
    if !response.success {
        return Err(api_failure(response.error));
    }
    let currencies = response
        .currencies
        .into_iter()
        .map(|(code, description)| Currency::new(code, description));
    Ok(CurrencyList::new(Utc::now(), currencies))
}
