use super::{fetch_quotes, ui, unique_tickers};
use crate::core::persistence::TransactionStore;
use crate::core::price::MarketDataProvider;
use crate::core::transaction::Transaction;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::HashMap;

pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn TransactionStore,
    currency: &str,
) -> Result<()> {
    let mut transactions = store
        .load_transactions()
        .await
        .context("Failed to load transactions")?;
    if transactions.is_empty() {
        println!("No transactions recorded yet. Add one with `etfolio add`.");
        return Ok(());
    }
    transactions.sort_by(|a, b| a.date().cmp(&b.date()).then_with(|| a.ticker().cmp(b.ticker())));

    let names = display_names(provider, &transactions).await;

    println!(
        "\n{}",
        ui::style_text(&format!("Transactions ({currency})"), ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("ISIN"),
        ui::header_cell("Quantity"),
        ui::header_cell("Price"),
        ui::header_cell("Total"),
    ]);
    for tx in &transactions {
        table.add_row(vec![
            Cell::new(tx.date()),
            Cell::new(tx.ticker()),
            names
                .get(tx.ticker())
                .map_or_else(|| ui::na_cell(false), Cell::new),
            Cell::new(tx.isin()),
            Cell::new(format!("{:.4}", tx.quantity())),
            ui::amount_cell(tx.price()),
            ui::amount_cell(tx.outlay()),
        ]);
    }
    let total: f64 = transactions.iter().map(Transaction::outlay).sum();
    table.add_row(vec![
        Cell::new(ui::style_text("Total", ui::StyleType::TotalLabel)),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(ui::style_text(&format!("{total:.2}"), ui::StyleType::TotalValue)),
    ]);
    println!("{table}");
    Ok(())
}

/// Resolved instrument name per ticker. Tickers that do not resolve are absent.
pub async fn display_names(
    provider: &(dyn MarketDataProvider + Send + Sync),
    transactions: &[Transaction],
) -> HashMap<String, String> {
    fetch_quotes(provider, &unique_tickers(transactions))
        .await
        .into_iter()
        .filter_map(|(ticker, quote)| quote.map(|q| (ticker, q.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::tests::FixtureProvider;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_display_names() {
        let provider = FixtureProvider::default().with_quote("SWDA.MI", 90.0);
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let transactions = vec![
            Transaction::new(d, "IE00B4L5Y983", "SWDA.MI", 70.0, 1.0).unwrap(),
            Transaction::new(d, "", "GONE.DE", 1.0, 1.0).unwrap(),
        ];

        let names = display_names(&provider, &transactions).await;
        assert_eq!(names.len(), 1);
        assert_eq!(names["SWDA.MI"], "SWDA.MI ETF");
    }
}
