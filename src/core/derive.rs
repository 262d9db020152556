//! Cross-rate synthesis from the base currency table

use crate::core::currency::{ExchangeRate, Quote};
use crate::core::error::FetchError;

/// Outcome of deriving one currency's table from the base table.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    Derived(ExchangeRate),
    /// The base table has no quote for the target, so the plan cannot serve it.
    UnknownTarget,
}

/// Re-expresses every quote of `base` relative to `target`.
///
/// With `b` the base-to-target rate, each base pair `BASEXXX` at `r` becomes
/// `TARGETXXX` at `r / b`. The target-to-base pair is always present at
/// `1 / b`. Timestamps are carried over from `base` since both tables
/// describe the same upstream snapshot.
pub fn derive_rate(base: &ExchangeRate, target: &str) -> Result<Derivation, FetchError> {
    let Some(base_to_target) = base.quote(&format!("{}{}", base.source(), target)) else {
        return Ok(Derivation::UnknownTarget);
    };
    if !base_to_target.is_finite() || base_to_target <= 0.0 {
        return Err(FetchError::Derivation(format!(
            "Unusable {}{} rate {} for derivation",
            base.source(),
            target,
            base_to_target
        )));
    }

    let mut quotes: Vec<Quote> = base
        .quotes()
        .iter()
        .map(|q| Quote::new(format!("{}{}", target, q.target()), q.rate / base_to_target))
        .collect();
    let to_base = format!("{}{}", target, base.source());
    if !quotes.iter().any(|q| q.code == to_base) {
        quotes.push(Quote::new(to_base, 1.0 / base_to_target));
    }

    Ok(Derivation::Derived(ExchangeRate::new(
        target,
        base.api_timestamp(),
        base.retrieved_at(),
        quotes,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn base_table(quotes: Vec<Quote>) -> ExchangeRate {
        ExchangeRate::new(
            "USD",
            Utc.timestamp_opt(1_617_000_000, 0).single(),
            Utc::now() - Duration::minutes(3),
            quotes,
        )
    }

    fn derived(result: Result<Derivation, FetchError>) -> ExchangeRate {
        match result {
            Ok(Derivation::Derived(rate)) => rate,
            other => panic!("Expected derived rate, got {other:?}"),
        }
    }

    #[test]
    fn test_derives_cross_rates() {
        let base = base_table(vec![Quote::new("USDJPY", 110.0), Quote::new("USDEUR", 0.85)]);
        let eur = derived(derive_rate(&base, "EUR"));

        assert_eq!(eur.source(), "EUR");
        assert!((eur.quote("EURUSD").unwrap() - 1.176_470_588).abs() < 1e-6);
        assert!((eur.quote("EURJPY").unwrap() - 129.411_764_7).abs() < 1e-6);
        assert!((eur.quote("EUREUR").unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(eur.quotes().iter().all(|q| q.code.starts_with("EUR")));
    }

    #[test]
    fn test_copies_base_timestamps() {
        let base = base_table(vec![Quote::new("USDUSD", 1.0), Quote::new("USDEUR", 0.85)]);
        let eur = derived(derive_rate(&base, "EUR"));

        assert_eq!(eur.api_timestamp(), base.api_timestamp());
        assert_eq!(eur.retrieved_at(), base.retrieved_at());
        assert_eq!(eur.quotes().len(), 2);
    }

    #[test]
    fn test_unknown_target() {
        let base = base_table(vec![Quote::new("USDEUR", 0.85)]);
        assert_eq!(derive_rate(&base, "XYZ"), Ok(Derivation::UnknownTarget));
    }

    #[test]
    fn test_rejects_unusable_base_rate() {
        for bad in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let base = base_table(vec![Quote::new("USDEUR", bad)]);
            assert!(matches!(
                derive_rate(&base, "EUR"),
                Err(FetchError::Derivation(_))
            ));
        }
    }
}
