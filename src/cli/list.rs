use super::ui;
use crate::core::{CurrencyList, ExchangeService};
use anyhow::{Result, anyhow};
use comfy_table::Cell;

impl CurrencyList {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Currency")]);

        for currency in self.currencies() {
            table.add_row(vec![Cell::new(currency.code()), Cell::new(currency.description())]);
        }

        format!(
            "{}\n\n{}\n\n{}",
            ui::style_text("Supported currencies", ui::StyleType::Title),
            table,
            ui::style_text(
                &format!(
                    "{} currencies, retrieved {}",
                    self.len(),
                    self.retrieved_at().format("%Y-%m-%d %H:%M UTC")
                ),
                ui::StyleType::Subtle
            )
        )
    }
}

/// Waits for the currency list, from cache or upstream.
pub async fn fetch_list(service: &ExchangeService) -> Result<CurrencyList> {
    let mut lists = service.bus().currency_list_ready.subscribe();
    let mut errors = service.bus().data_error.subscribe();

    service.request_list();

    tokio::select! {
        Some(list) = lists.recv() => Ok(list),
        Some(error) = errors.recv() => Err(anyhow!(error)),
        else => Err(anyhow!("Rate service stopped")),
    }
}

pub async fn display_list(service: &ExchangeService) -> Result<()> {
    let spinner = ui::new_spinner("Loading currencies");
    let result = fetch_list(service).await;
    spinner.finish_and_clear();

    println!("{}", result?.display_as_table());
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::{Currency, CurrencyList};
    use chrono::Utc;

    #[test]
    fn test_list_table_contains_currencies() {
        let list = CurrencyList::new(
            Utc::now(),
            vec![Currency::new("USD", "United States Dollar"), Currency::new("EUR", "Euro")],
        );

        let output = list.display_as_table();
        assert!(output.contains("Supported currencies"));
        assert!(output.contains("United States Dollar"));
        assert!(output.find("EUR").unwrap() < output.find("USD").unwrap());
        assert!(output.contains("2 currencies"));
    }
}
