use super::{fetch_histories, fetch_quotes, print_warning, ui, unique_tickers};
use crate::core::performance::{
    CloseSeries, HoldingSnapshot, PortfolioTotals, calculate_snapshots, portfolio_totals,
};
use crate::core::persistence::TransactionStore;
use crate::core::price::{HistoryRange, MarketDataProvider};
use crate::core::transaction::Transaction;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use comfy_table::{Cell, Table};
use std::collections::HashMap;

pub struct PortfolioReport {
    pub snapshots: Vec<HoldingSnapshot>,
    pub totals: PortfolioTotals,
}

pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn TransactionStore,
    currency: &str,
    today: NaiveDate,
) -> Result<()> {
    let transactions = store
        .load_transactions()
        .await
        .context("Failed to load transactions")?;
    if transactions.is_empty() {
        println!("No transactions recorded yet. Add one with `etfolio add`.");
        return Ok(());
    }

    let report = build_report(provider, &transactions, today).await;

    println!(
        "\n{}",
        ui::style_text(&format!("Portfolio ({currency})"), ui::StyleType::Title)
    );
    println!("{}", render(&report));
    for warning in missing_price_warnings(&report.snapshots) {
        print_warning(&warning);
    }
    Ok(())
}

/// Prices every holding and computes its snapshot.
///
/// Histories are only requested for positions held for at least a year, where
/// the annualized return needs a close from one year back.
pub async fn build_report(
    provider: &(dyn MarketDataProvider + Send + Sync),
    transactions: &[Transaction],
    today: NaiveDate,
) -> PortfolioReport {
    let tickers = unique_tickers(transactions);
    let quotes = fetch_quotes(provider, &tickers).await;
    let prices: HashMap<String, f64> = quotes
        .iter()
        .filter_map(|(ticker, quote)| quote.as_ref().map(|q| (ticker.clone(), q.price)))
        .collect();

    let year_ago = today - Duration::days(365);
    let long_held: Vec<(String, HistoryRange)> = tickers
        .iter()
        .filter(|ticker| {
            transactions
                .iter()
                .any(|tx| tx.ticker() == ticker.as_str() && tx.date() <= year_ago)
        })
        .map(|ticker| (ticker.clone(), HistoryRange::Since(year_ago)))
        .collect();
    let series: HashMap<String, CloseSeries> = fetch_histories(provider, &long_held)
        .await
        .into_iter()
        .filter_map(|(ticker, history)| {
            history.map(|(_, bars)| (ticker, bars.iter().map(|b| (b.date, b.close)).collect()))
        })
        .collect();

    let mut snapshots = calculate_snapshots(transactions, &prices, Some(&series), today);
    snapshots.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    let totals = portfolio_totals(&snapshots);
    PortfolioReport { snapshots, totals }
}

/// One line per held ticker that could not be priced.
pub fn missing_price_warnings(snapshots: &[HoldingSnapshot]) -> Vec<String> {
    snapshots
        .iter()
        .filter(|s| s.is_missing_price())
        .map(|s| format!("No current price for {}, valued at 0", s.ticker))
        .collect()
}

fn render(report: &PortfolioReport) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Quantity"),
        ui::header_cell("Avg Cost"),
        ui::header_cell("Price"),
        ui::header_cell("Invested"),
        ui::header_cell("Value"),
        ui::header_cell("Gain/Loss"),
        ui::header_cell("Gain %"),
        ui::header_cell("Annualized"),
        ui::header_cell("Days"),
    ]);

    for s in &report.snapshots {
        let price_cell = if s.is_missing_price() {
            ui::na_cell(true)
        } else {
            ui::amount_cell(s.current_price)
        };
        table.add_row(vec![
            Cell::new(&s.ticker),
            Cell::new(format!("{:.4}", s.quantity)),
            ui::amount_cell(s.average_cost),
            price_cell,
            ui::amount_cell(s.invested_value),
            ui::amount_cell(s.current_value),
            ui::gain_cell(s.gain_loss),
            ui::change_cell(s.gain_loss_pct),
            ui::change_cell(s.annualized_return_pct),
            Cell::new(s.days_held),
        ]);
    }

    let totals = &report.totals;
    table.add_row(vec![
        Cell::new(ui::style_text("Total", ui::StyleType::TotalLabel)),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        ui::amount_cell(totals.invested_value),
        Cell::new(ui::style_text(
            &format!("{:.2}", totals.current_value),
            ui::StyleType::TotalValue,
        )),
        ui::gain_cell(totals.gain_loss),
        ui::change_cell(totals.gain_loss_pct),
        Cell::new(""),
        Cell::new(""),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::tests::FixtureProvider;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(d: NaiveDate, ticker: &str, price: f64, quantity: f64) -> Transaction {
        Transaction::new(d, "", ticker, price, quantity).unwrap()
    }

    #[tokio::test]
    async fn test_report_prices_holdings() {
        let provider = FixtureProvider::default()
            .with_quote("SWDA.MI", 90.0)
            .with_quote("SXR8.DE", 420.0);
        let transactions = vec![
            tx(date(2025, 1, 1), "SWDA.MI", 70.0, 10.0),
            tx(date(2025, 2, 1), "SWDA.MI", 80.0, 5.0),
            tx(date(2025, 3, 1), "SXR8.DE", 400.0, 1.0),
        ];

        let report = build_report(&provider, &transactions, date(2025, 6, 1)).await;

        assert_eq!(report.snapshots.len(), 2);
        let swda = &report.snapshots[0];
        assert_eq!(swda.ticker, "SWDA.MI");
        assert!((swda.invested_value - 1100.0).abs() < 1e-9);
        assert!((swda.current_value - 1350.0).abs() < 1e-9);
        assert!((swda.gain_loss_pct - 22.727272).abs() < 1e-4);
        let sxr8 = &report.snapshots[1];
        assert!((sxr8.gain_loss - 20.0).abs() < 1e-9);
        assert!((report.totals.current_value - 1770.0).abs() < 1e-9);
        assert!(missing_price_warnings(&report.snapshots).is_empty());
        // No position is a year old, so no history was requested.
        assert!(!provider.calls().iter().any(|c| c.starts_with("history:")));
    }

    #[tokio::test]
    async fn test_unpriced_holding_is_flagged() {
        let provider = FixtureProvider::default().with_quote("SWDA.MI", 90.0);
        let transactions = vec![
            tx(date(2025, 1, 1), "SWDA.MI", 70.0, 1.0),
            tx(date(2025, 1, 1), "GONE.DE", 50.0, 2.0),
        ];

        let report = build_report(&provider, &transactions, date(2025, 6, 1)).await;
        let gone = &report.snapshots[0];
        assert_eq!(gone.ticker, "GONE.DE");
        assert_eq!(gone.current_value, 0.0);
        assert_eq!(
            missing_price_warnings(&report.snapshots),
            vec!["No current price for GONE.DE, valued at 0"]
        );
    }

    #[tokio::test]
    async fn test_long_positions_use_year_old_close() {
        let today = date(2025, 6, 1);
        let provider = FixtureProvider::default()
            .with_quote("SWDA.MI", 110.0)
            .with_history(
                "SWDA.MI",
                &[(date(2024, 6, 3), 100.0), (date(2025, 5, 30), 109.0)],
            );
        let transactions = vec![tx(date(2024, 1, 1), "SWDA.MI", 50.0, 1.0)];

        let report = build_report(&provider, &transactions, today).await;
        let snapshot = &report.snapshots[0];
        assert!((snapshot.annualized_return_pct - 10.0).abs() < 1e-9);
        assert!(provider.calls().contains(&"history:SWDA.MI".to_string()));
    }

    #[test]
    fn test_render_includes_total_row() {
        let report = PortfolioReport {
            snapshots: Vec::new(),
            totals: PortfolioTotals {
                invested_value: 100.0,
                current_value: 110.0,
                gain_loss: 10.0,
                gain_loss_pct: 10.0,
            },
        };
        let rendered = render(&report).to_string();
        assert!(rendered.contains("Total"));
        assert!(rendered.contains("110.00"));
        assert!(rendered.contains("+10.00"));
    }
}
