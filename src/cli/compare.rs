use super::{fetch_histories, ui, unique_tickers};
use crate::core::change::relative_performance;
use crate::core::persistence::TransactionStore;
use crate::core::price::{HistoryRange, MarketDataProvider};
use crate::core::transaction::Transaction;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::Cell;

/// Performance of one holding since the portfolio's most recent purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub ticker: String,
    pub symbol: Option<String>,
    pub since: NaiveDate,
    /// Percent change against the first close, per trading day.
    pub performance: Option<Vec<(NaiveDate, f64)>>,
}

impl Comparison {
    pub fn latest(&self) -> Option<f64> {
        self.performance.as_ref()?.last().map(|(_, pct)| *pct)
    }

    /// Worst and best points of the normalized series.
    pub fn extremes(&self) -> Option<(f64, f64)> {
        self.performance.as_ref()?.iter().fold(None, |acc, (_, pct)| match acc {
            None => Some((*pct, *pct)),
            Some((lo, hi)) => Some((lo.min(*pct), hi.max(*pct))),
        })
    }
}

pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn TransactionStore,
) -> Result<()> {
    let transactions = store
        .load_transactions()
        .await
        .context("Failed to load transactions")?;
    if transactions.is_empty() {
        println!("No transactions recorded yet. Add one with `etfolio add`.");
        return Ok(());
    }

    let comparisons = build_comparisons(provider, &transactions).await;

    println!(
        "\n{}",
        ui::style_text("Performance since last purchase", ui::StyleType::Title)
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Symbol"),
        ui::header_cell("Since"),
        ui::header_cell("Change"),
        ui::header_cell("Worst"),
        ui::header_cell("Best"),
    ]);
    for comparison in &comparisons {
        let mut row = vec![
            Cell::new(&comparison.ticker),
            Cell::new(comparison.symbol.as_deref().unwrap_or("-")),
            Cell::new(comparison.since),
        ];
        match (comparison.latest(), comparison.extremes()) {
            (Some(latest), Some((worst, best))) => {
                row.push(ui::change_cell(latest));
                row.push(ui::change_cell(worst));
                row.push(ui::change_cell(best));
            }
            _ => row.extend([ui::na_cell(true), ui::na_cell(false), ui::na_cell(false)]),
        }
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

/// Every holding is measured from the portfolio's most recent purchase so the
/// percentages cover the same window.
pub async fn build_comparisons(
    provider: &(dyn MarketDataProvider + Send + Sync),
    transactions: &[Transaction],
) -> Vec<Comparison> {
    let Some(since) = transactions.iter().map(Transaction::date).max() else {
        return Vec::new();
    };
    let requests: Vec<(String, HistoryRange)> = unique_tickers(transactions)
        .into_iter()
        .map(|ticker| (ticker, HistoryRange::Since(since)))
        .collect();

    let mut histories = fetch_histories(provider, &requests).await;
    requests
        .into_iter()
        .map(|(ticker, _)| {
            let history = histories.remove(&ticker).flatten();
            Comparison {
                symbol: history.as_ref().map(|(symbol, _)| symbol.clone()),
                performance: history.and_then(|(_, bars)| relative_performance(&bars)),
                ticker,
                since,
            }
        })
        .collect()
}
