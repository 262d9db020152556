//! Exchange-rate data layer: records, events, caching and derivation

pub mod config;
pub mod currency;
pub mod derive;
pub mod error;
pub mod events;
pub mod gateway;
pub mod log;
pub mod service;
pub mod store;

// Re-export main types for cleaner imports
pub use currency::{Currency, CurrencyList, ExchangeRate, Quote};
pub use error::{DataError, FetchError};
pub use events::{EventBus, Subscription, Topic};
pub use gateway::RateGateway;
pub use service::{ExchangeService, ServiceSettings};
pub use store::CurrencyStore;
