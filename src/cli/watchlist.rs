use super::{canonical_ticker, fetch_quotes, print_warning, ui};
use crate::core::change::price_change;
use crate::core::persistence::WatchlistStore;
use crate::core::price::{MarketDataProvider, Quote};
use crate::core::watchlist::Watchlist;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::HashMap;
use tracing::warn;

pub async fn load(store: &dyn WatchlistStore) -> Result<Watchlist> {
    let tickers = store
        .load_watchlist()
        .await
        .context("Failed to load watchlist")?;
    Ok(Watchlist::new(tickers))
}

pub async fn save(store: &dyn WatchlistStore, watchlist: &Watchlist) -> Result<()> {
    store
        .save_watchlist(watchlist.tickers())
        .await
        .context("Failed to save watchlist")
}

/// Adds `ticker` unless already watched. Returns whether it was added.
pub async fn ensure_watched(store: &dyn WatchlistStore, ticker: &str) -> Result<bool> {
    let mut watchlist = load(store).await?;
    if !watchlist.add(ticker) {
        return Ok(false);
    }
    save(store, &watchlist).await?;
    Ok(true)
}

/// Replaces every entry with the symbol its quote resolved to. Returns
/// whether anything changed.
pub fn canonicalize(watchlist: &mut Watchlist, quotes: &HashMap<String, Option<Quote>>) -> bool {
    let mut changed = false;
    for ticker in watchlist.tickers().to_vec() {
        if let Some(Some(quote)) = quotes.get(&ticker) {
            if quote.symbol != ticker {
                changed |= watchlist.canonicalize(&ticker, &quote.symbol);
            }
        }
    }
    changed
}

pub async fn add(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn WatchlistStore,
    ticker: &str,
) -> Result<()> {
    let ticker = canonical_ticker(provider, ticker).await;
    if ensure_watched(store, &ticker).await? {
        println!("Added {ticker} to the watchlist");
    } else {
        println!("{ticker} is already on the watchlist");
    }
    Ok(())
}

pub async fn remove(store: &dyn WatchlistStore, ticker: &str) -> Result<()> {
    let ticker = ticker.trim().to_uppercase();
    let mut watchlist = load(store).await?;
    if watchlist.remove(&ticker) {
        save(store, &watchlist).await?;
        println!("Removed {ticker} from the watchlist");
    } else {
        println!("{ticker} is not on the watchlist");
    }
    Ok(())
}

pub async fn list(
    provider: &(dyn MarketDataProvider + Send + Sync),
    store: &dyn WatchlistStore,
) -> Result<()> {
    let mut watchlist = load(store).await?;
    if watchlist.is_empty() {
        println!("The watchlist is empty. Add a ticker with `etfolio watch add`.");
        return Ok(());
    }

    let quotes = fetch_quotes(provider, watchlist.tickers()).await;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Currency"),
        ui::header_cell("Day"),
    ]);
    for ticker in watchlist.tickers() {
        match quotes.get(ticker).and_then(Option::as_ref) {
            Some(quote) => {
                let change = price_change(quote.price, &[], quote.previous_close);
                table.add_row(vec![
                    Cell::new(&quote.symbol),
                    Cell::new(&quote.name),
                    ui::amount_cell(quote.price),
                    Cell::new(&quote.currency),
                    ui::format_optional_cell(change.previous.map(|_| change.pct_change), |pct| {
                        format!("{pct:.2}%")
                    }),
                ]);
            }
            None => {
                table.add_row(vec![
                    Cell::new(ticker),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(false),
                    ui::na_cell(false),
                ]);
            }
        }
    }
    println!("{table}");

    for ticker in watchlist.tickers() {
        if quotes.get(ticker).and_then(Option::as_ref).is_none() {
            print_warning(&format!("No quote for {ticker}"));
        }
    }
    if canonicalize(&mut watchlist, &quotes) {
        if let Err(e) = save(store, &watchlist).await {
            warn!("Could not store resolved watchlist symbols: {e:#}");
        }
    }
    Ok(())
}
