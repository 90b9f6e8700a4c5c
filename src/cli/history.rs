use super::{fetch_histories, print_warning, ui, unique_tickers};
use crate::core::history::{DailyValuePoint, PriceTable, daily_value_series};
use crate::core::persistence::TransactionStore;
use crate::core::price::{HistoryRange, MarketDataProvider, PriceBar};
use crate::core::transaction::Transaction;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::HashMap;

pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn TransactionStore,
    currency: &str,
    limit: usize,
) -> Result<()> {
    let transactions = store
        .load_transactions()
        .await
        .context("Failed to load transactions")?;
    if transactions.is_empty() {
        println!("No transactions recorded yet. Add one with `etfolio add`.");
        return Ok(());
    }

    let (points, unpriced) = build_series(provider, &transactions).await;
    for ticker in &unpriced {
        print_warning(&format!("No price history for {ticker}, it is left out of market value"));
    }
    if points.is_empty() {
        println!("No price history available for any holding.");
        return Ok(());
    }

    let shown = if limit == 0 || limit >= points.len() {
        &points[..]
    } else {
        &points[points.len() - limit..]
    };

    println!(
        "\n{}",
        ui::style_text(&format!("Daily value ({currency})"), ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Invested"),
        ui::header_cell("Market Value"),
        ui::header_cell("Gain/Loss"),
    ]);
    for point in shown {
        table.add_row(vec![
            Cell::new(point.date),
            ui::amount_cell(point.invested_value),
            ui::amount_cell(point.market_value),
            ui::gain_cell(point.gain_loss),
        ]);
    }
    println!("{table}");
    if shown.len() < points.len() {
        println!(
            "{}",
            ui::style_text(
                &format!("Showing the last {} of {} days", shown.len(), points.len()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}

/// Daily value series since the first purchase, and the tickers for which no
/// history was found.
pub async fn build_series(
    provider: &(dyn MarketDataProvider + Send + Sync),
    transactions: &[Transaction],
) -> (Vec<DailyValuePoint>, Vec<String>) {
    let Some(first) = transactions.iter().map(|tx| tx.date()).min() else {
        return (Vec::new(), Vec::new());
    };
    let requests: Vec<(String, HistoryRange)> = unique_tickers(transactions)
        .into_iter()
        .map(|ticker| (ticker, HistoryRange::Since(first)))
        .collect();

    let mut unpriced = Vec::new();
    let mut bars: HashMap<String, Vec<PriceBar>> = HashMap::new();
    for (ticker, history) in fetch_histories(provider, &requests).await {
        match history {
            Some((_, series)) => {
                bars.insert(ticker, series);
            }
            None => unpriced.push(ticker),
        }
    }
    unpriced.sort();

    let table = PriceTable::from_bars(&bars);
    (daily_value_series(transactions, &table), unpriced)
}
