//! Currency, currency list and exchange rate records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use tracing::debug;

/// A currency the upstream service knows about. Equality and ordering only
/// consider the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    description: String,
}

impl Currency {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Currency {}

impl PartialOrd for Currency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Currency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code.cmp(&other.code)
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.description)
    }
}

/// The one supported-currency list. Entries are unique by code and sorted
/// ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyList {
    retrieved_at: DateTime<Utc>,
    currencies: Vec<Currency>,
}

impl CurrencyList {
    /// Builds a list, sorting by code and keeping the first entry of any
    /// duplicated code.
    pub fn new(retrieved_at: DateTime<Utc>, currencies: impl IntoIterator<Item = Currency>) -> Self {
        let mut currencies: Vec<Currency> = currencies.into_iter().collect();
        currencies.sort();
        currencies.dedup();
        Self {
            retrieved_at,
            currencies,
        }
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&Currency> {
        self.currencies
            .binary_search_by(|c| c.code.as_str().cmp(code))
            .ok()
            .map(|index| &self.currencies[index])
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.retrieved_at <= window
    }
}

/// A single pair quote, e.g. `USDJPY` at `110.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub code: String,
    pub rate: f64,
}

impl Quote {
    pub fn new(code: impl Into<String>, rate: f64) -> Self {
        Self {
            code: code.into(),
            rate,
        }
    }

    /// The three-letter code being quoted against the source.
    pub fn target(&self) -> &str {
        self.code.get(3..).unwrap_or_default()
    }
}

/// All quotes for one source currency. Stored at most once per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    source: String,
    api_timestamp: Option<DateTime<Utc>>,
    retrieved_at: DateTime<Utc>,
    quotes: Vec<Quote>,
}

impl ExchangeRate {
    /// Quotes whose pair code does not start with `source` are dropped.
    pub fn new(
        source: impl Into<String>,
        api_timestamp: Option<DateTime<Utc>>,
        retrieved_at: DateTime<Utc>,
        quotes: impl IntoIterator<Item = Quote>,
    ) -> Self {
        let source = source.into();
        let mut quotes: Vec<Quote> = quotes
            .into_iter()
            .filter(|q| {
                let owned = q.code.len() == 6 && q.code.starts_with(&source);
                if !owned {
                    debug!(source = %source, pair = %q.code, "Dropping quote for foreign source");
                }
                owned
            })
            .collect();
        quotes.sort_by(|a, b| a.code.cmp(&b.code));
        quotes.dedup_by(|a, b| a.code == b.code);
        Self {
            source,
            api_timestamp,
            retrieved_at,
            quotes,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn api_timestamp(&self) -> Option<DateTime<Utc>> {
        self.api_timestamp
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Rate for an exact six-letter pair code.
    pub fn quote(&self, pair: &str) -> Option<f64> {
        self.quotes
            .binary_search_by(|q| q.code.as_str().cmp(pair))
            .ok()
            .map(|index| self.quotes[index].rate)
    }

    /// Rate from the source to `target`. The source always converts to
    /// itself at 1.0, even when upstream omits the self pair.
    pub fn rate_for(&self, target: &str) -> Option<f64> {
        let pair = format!("{}{}", self.source, target);
        self.quote(&pair)
            .or_else(|| (target == self.source).then_some(1.0))
    }

    /// Converts `amount` of the source currency into `target`.
    pub fn convert(&self, amount: f64, target: &str) -> Option<f64> {
        self.rate_for(target).map(|rate| amount * rate)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.retrieved_at <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd_rate() -> ExchangeRate {
        ExchangeRate::new(
            "USD",
            None,
            Utc::now(),
            vec![
                Quote::new("USDJPY", 110.0),
                Quote::new("USDEUR", 0.85),
                Quote::new("EURJPY", 129.0),
            ],
        )
    }

    #[test]
    fn test_currency_list_sorted_and_unique() {
        let list = CurrencyList::new(
            Utc::now(),
            vec![
                Currency::new("USD", "United States Dollar"),
                Currency::new("EUR", "Euro"),
                Currency::new("AED", "UAE Dirham"),
                Currency::new("EUR", "Euro again"),
            ],
        );

        let codes: Vec<&str> = list.currencies().iter().map(Currency::code).collect();
        assert_eq!(codes, vec!["AED", "EUR", "USD"]);
        assert_eq!(list.get("EUR").map(Currency::description), Some("Euro"));
        assert!(list.get("GBP").is_none());
    }

    #[test]
    fn test_exchange_rate_drops_foreign_quotes() {
        let rate = usd_rate();
        assert_eq!(rate.quotes().len(), 2);
        assert!(rate.quote("EURJPY").is_none());
        assert!(rate.quotes().iter().all(|q| q.code.starts_with("USD")));
    }

    #[test]
    fn test_rate_lookup_and_conversion() {
        let rate = usd_rate();
        assert_eq!(rate.rate_for("JPY"), Some(110.0));
        assert_eq!(rate.rate_for("USD"), Some(1.0));
        assert!(rate.rate_for("GBP").is_none());
        assert_eq!(rate.convert(2.0, "JPY"), Some(220.0));
        assert_eq!(Quote::new("USDJPY", 1.0).target(), "JPY");
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        let window = Duration::minutes(30);
        let fresh = ExchangeRate::new("USD", None, now - Duration::minutes(29), vec![]);
        let stale = ExchangeRate::new("USD", None, now - Duration::minutes(31), vec![]);
        assert!(fresh.is_fresh(now, window));
        assert!(!stale.is_fresh(now, window));

        let list = CurrencyList::new(now - Duration::hours(7), vec![]);
        assert!(!list.is_fresh(now, Duration::hours(6)));
    }
}
