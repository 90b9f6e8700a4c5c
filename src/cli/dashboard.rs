use super::watchlist::{canonicalize, load, save};
use super::{fetch_quotes, ui};
use crate::core::change::{PriceChange, period_range, price_change};
use crate::core::persistence::WatchlistStore;
use crate::core::price::{ChartPeriod, HistoryRange, MarketDataProvider, PriceBar, Quote};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::warn;

pub struct DashboardOptions {
    /// History window for low/high and the recent bars.
    pub period: ChartPeriod,
    /// Window the price change is measured over.
    pub change_period: ChartPeriod,
    pub bars: usize,
}

pub struct DashboardRow {
    pub ticker: String,
    pub quote: Option<Quote>,
    pub change: Option<PriceChange>,
    pub range: Option<(f64, f64)>,
    pub recent: Vec<PriceBar>,
}

pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn WatchlistStore,
    options: &DashboardOptions,
) -> Result<()> {
    let mut watchlist = load(store).await?;
    if watchlist.is_empty() {
        println!("The watchlist is empty. Add a ticker with `etfolio watch add`.");
        return Ok(());
    }

    let quotes = fetch_quotes(provider, watchlist.tickers()).await;
    if canonicalize(&mut watchlist, &quotes) {
        if let Err(e) = save(store, &watchlist).await {
            warn!("Could not store resolved watchlist symbols: {e:#}");
        }
    }

    let quotes: HashMap<String, Quote> = quotes
        .into_values()
        .flatten()
        .map(|quote| (quote.symbol.clone(), quote))
        .collect();
    let rows = build_rows(provider, watchlist.tickers(), &quotes, options).await;

    println!(
        "\n{}",
        ui::style_text(
            &format!(
                "Dashboard: {} window, {} change",
                options.period.label(),
                options.change_period.label()
            ),
            ui::StyleType::Title
        )
    );
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Change"),
        ui::header_cell("Change %"),
        ui::header_cell("Low"),
        ui::header_cell("High"),
        ui::header_cell("Recent closes"),
    ]);
    for row in &rows {
        let Some(quote) = &row.quote else {
            table.add_row(vec![
                Cell::new(&row.ticker),
                ui::na_cell(true),
                ui::na_cell(true),
                ui::na_cell(false),
                ui::na_cell(false),
                ui::na_cell(false),
                ui::na_cell(false),
                Cell::new(""),
            ]);
            continue;
        };
        let change = row.change.unwrap_or(PriceChange {
            previous: None,
            change: 0.0,
            pct_change: 0.0,
        });
        let recent = row
            .recent
            .iter()
            .map(|bar| format!("{:.2}", bar.close))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(&row.ticker),
            Cell::new(&quote.name),
            Cell::new(format!("{:.2} {}", quote.price, quote.currency)),
            ui::gain_cell(change.change),
            ui::change_cell(change.pct_change),
            ui::format_optional_cell(row.range.map(|(low, _)| low), |v| format!("{v:.2}")),
            ui::format_optional_cell(row.range.map(|(_, high)| high), |v| format!("{v:.2}")),
            Cell::new(recent),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// One row per watched ticker, in watchlist order. `quotes` is keyed by
/// resolved symbol; tickers without a quote get an empty row.
pub async fn build_rows(
    provider: &(dyn MarketDataProvider + Send + Sync),
    tickers: &[String],
    quotes: &HashMap<String, Quote>,
    options: &DashboardOptions,
) -> Vec<DashboardRow> {
    let futures = tickers.iter().map(|ticker| {
        let quote = quotes.get(ticker).cloned();
        async move {
            let Some(quote) = quote else {
                return DashboardRow {
                    ticker: ticker.clone(),
                    quote: None,
                    change: None,
                    range: None,
                    recent: Vec::new(),
                };
            };

            let window = history(provider, &quote.symbol, options.period).await;
            let change_bars = if options.change_period == options.period {
                window.clone()
            } else {
                history(provider, &quote.symbol, options.change_period).await
            };

            DashboardRow {
                ticker: ticker.clone(),
                change: Some(price_change(quote.price, &change_bars, quote.previous_close)),
                range: period_range(&window),
                recent: window[window.len().saturating_sub(options.bars)..].to_vec(),
                quote: Some(quote),
            }
        }
    });
    join_all(futures).await
}

async fn history(
    provider: &(dyn MarketDataProvider + Send + Sync),
    symbol: &str,
    period: ChartPeriod,
) -> Vec<PriceBar> {
    provider
        .fetch_history(symbol, HistoryRange::Period(period))
        .await
        .unwrap_or_else(|e| {
            warn!("History lookup failed for {symbol} ({period}): {e}");
            Vec::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol::tests::FixtureProvider;
    use crate::store::csv_file::CsvWatchlistStore;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn options(bars: usize) -> DashboardOptions {
        DashboardOptions {
            period: ChartPeriod::OneMonth,
            change_period: ChartPeriod::OneMonth,
            bars,
        }
    }

    #[tokio::test]
    async fn test_rows_compute_period_change() {
        let provider = FixtureProvider::default()
            .with_quote("SWDA.MI", 110.0)
            .with_history(
                "SWDA.MI",
                &[(date(1), 100.0), (date(2), 105.0), (date(5), 110.0)],
            );
        let tickers = vec!["SWDA.MI".to_string(), "GONE".to_string()];

        let rows = build_rows(&provider, &tickers, &provider.quotes, &options(2)).await;

        assert_eq!(rows.len(), 2);
        let change = rows[0].change.unwrap();
        assert_eq!(change.previous, Some(100.0));
        assert!((change.pct_change - 10.0).abs() < 1e-9);
        assert_eq!(rows[0].range, Some((100.0, 110.0)));
        assert_eq!(rows[0].recent.len(), 2);
        assert_eq!(rows[0].recent[0].close, 105.0);
        assert!(rows[1].quote.is_none());
    }

    #[tokio::test]
    async fn test_single_bar_uses_previous_close() {
        let mut provider =
            FixtureProvider::default().with_history("SXR8.DE", &[(date(5), 500.0)]);
        provider.quotes.insert(
            "SXR8.DE".to_string(),
            Quote {
                symbol: "SXR8.DE".to_string(),
                name: "S&P 500".to_string(),
                price: 500.0,
                currency: "EUR".to_string(),
                previous_close: Some(490.0),
            },
        );
        let tickers = vec!["SXR8.DE".to_string()];

        let rows = build_rows(&provider, &tickers, &provider.quotes, &options(5)).await;
        let change = rows[0].change.unwrap();
        assert_eq!(change.previous, Some(490.0));
        assert!((change.change - 10.0).abs() < 1e-9);
        assert_eq!(rows[0].recent.len(), 1);
    }

    #[tokio::test]
    async fn test_run_canonicalizes_watchlist() {
        let dir = TempDir::new().unwrap();
        let store = CsvWatchlistStore::new(dir.path().join("watchlist.csv"));
        store.save_watchlist(&["SXR8".to_string()]).await.unwrap();
        let provider = FixtureProvider::default().with_quote("SXR8.DE", 500.0);

        run(&provider, &store, &options(3)).await.unwrap();
        assert_eq!(store.load_watchlist().await.unwrap(), vec!["SXR8.DE"]);
    }
}
