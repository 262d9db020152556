use super::ui;
use crate::core::{CurrencyList, ExchangeRate, ExchangeService};
use anyhow::{Result, anyhow};
use comfy_table::Cell;

/// Renders `amount` of the rate's source currency in every listed currency.
pub fn display_conversions(list: &CurrencyList, rate: &ExchangeRate, amount: f64) -> String {
    let source = rate.source();
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
        ui::header_cell(&format!("{amount} {source}")),
    ]);

    for currency in list.currencies().iter().filter(|c| c.code() != source) {
        table.add_row(vec![
            Cell::new(currency.code()),
            Cell::new(currency.description()),
            ui::format_optional_cell(rate.rate_for(currency.code()), |r| format!("{r:.6}")),
            ui::format_optional_cell(rate.convert(amount, currency.code()), |v| format!("{v:.4}")),
        ]);
    }

    let as_of = rate
        .api_timestamp()
        .unwrap_or_else(|| rate.retrieved_at())
        .format("%Y-%m-%d %H:%M UTC");

    format!(
        "{} {}\n\n{}\n\n{}",
        ui::style_text("Converting from", ui::StyleType::Label),
        ui::style_text(source, ui::StyleType::Title),
        table,
        ui::style_text(&format!("Rates as of {as_of}"), ui::StyleType::Subtle)
    )
}

/// Selects `code` (or the persisted selection) and waits until both the
/// currency list and the selected currency's rates are available. A reset of
/// the selection to the fallback code is followed.
pub async fn fetch_selected_rates(
    service: &ExchangeService,
    code: Option<&str>,
) -> Result<(CurrencyList, ExchangeRate)> {
    let bus = service.bus();
    let mut lists = bus.currency_list_ready.subscribe();
    let mut rates = bus.exchange_rate_ready.subscribe();
    let mut errors = bus.data_error.subscribe();

    service.restore_selection().await;
    if let Some(code) = code {
        service.select(&code.trim().to_uppercase());
    }
    let mut selection = bus.selected_currency.subscribe();
    let follower = service.follow_selection();
    service.request_list();

    let mut selected: Option<String> = None;
    let mut list: Option<CurrencyList> = None;
    let mut rate: Option<ExchangeRate> = None;

    let result = loop {
        tokio::select! {
            biased;

            Some(code) = selection.recv() => {
                if let Some(previous) = selected.replace(code.clone()) {
                    eprintln!(
                        "{}",
                        ui::style_text(
                            &format!("{previous} is not available, switched to {code}"),
                            ui::StyleType::Notice
                        )
                    );
                }
                rate = None;
            }
            Some(received) = lists.recv() => list = Some(received),
            Some(received) = rates.recv() => {
                if selected.as_deref() == Some(received.source()) {
                    rate = Some(received);
                }
            }
            Some(error) = errors.recv() => break Err(anyhow!(error)),
            else => break Err(anyhow!("Rate service stopped")),
        }

        if let (Some(list), Some(rate)) = (&list, &rate) {
            break Ok((list.clone(), rate.clone()));
        }
    };
    follower.abort();
    result
}

pub async fn display_rates(service: &ExchangeService, code: Option<&str>, amount: f64) -> Result<()> {
    let spinner = ui::new_spinner("Loading exchange rates");
    let result = fetch_selected_rates(service, code).await;
    spinner.finish_and_clear();

    let (list, rate) = result?;
    println!("{}", display_conversions(&list, &rate, amount));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Currency, Quote};
    use chrono::Utc;

    #[test]
    fn test_conversion_table() {
        let list = CurrencyList::new(
            Utc::now(),
            vec![
                Currency::new("USD", "United States Dollar"),
                Currency::new("EUR", "Euro"),
                Currency::new("GBP", "British Pound Sterling"),
            ],
        );
        let rate = ExchangeRate::new(
            "USD",
            None,
            Utc::now(),
            vec![Quote::new("USDEUR", 0.5), Quote::new("USDUSD", 1.0)],
        );

        let output = display_conversions(&list, &rate, 10.0);
        assert!(output.contains("10 USD"));
        assert!(output.contains("0.500000"));
        assert!(output.contains("5.0000"));
        // No quote for GBP
        assert!(output.contains("N/A"));
        assert!(!output.contains("United States Dollar"));
    }
}
