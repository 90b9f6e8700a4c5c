//! Ticker resolution policy shared by every lookup.
//!
//! Snapshot prices, comparative charts and the dashboard all go through
//! [`candidates`], so a bare identifier resolves to the same exchange listing
//! in every view.

use super::price::{HistoryRange, MarketDataProvider, PriceBar, Quote};
use anyhow::Result;
use tracing::debug;

/// Market suffixes tried, in order, after the bare identifier.
pub const MARKET_SUFFIXES: [&str; 5] = [".DE", ".MI", ".L", ".PA", ".AS"];

/// Symbols to try for `identifier`, most specific first.
///
/// An identifier that already carries a suffix (`SWDA.MI`) is only tried
/// as-is.
pub fn candidates(identifier: &str) -> Vec<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Vec::new();
    }
    if identifier.contains('.') {
        return vec![identifier.to_string()];
    }

    std::iter::once(identifier.to_string())
        .chain(
            MARKET_SUFFIXES
                .iter()
                .map(|suffix| format!("{identifier}{suffix}")),
        )
        .collect()
}

/// Returns the quote of the first candidate that resolves.
///
/// `Ok(None)` when no candidate resolves. A transport error is only returned
/// when every candidate failed with one.
pub async fn resolve_quote(
    provider: &(dyn MarketDataProvider + Send + Sync),
    identifier: &str,
) -> Result<Option<Quote>> {
    let mut last_error = None;
    let mut any_clean_miss = false;

    for symbol in candidates(identifier) {
        match provider.fetch_quote(&symbol).await {
            Ok(Some(quote)) => {
                debug!("Resolved {identifier} as {}", quote.symbol);
                return Ok(Some(quote));
            }
            Ok(None) => {
                debug!("No listing for {symbol}");
                any_clean_miss = true;
            }
            Err(e) => {
                debug!("Quote lookup failed for {symbol}: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_clean_miss => Err(e),
        _ => Ok(None),
    }
}

/// Returns the first candidate with a non-empty history, with the symbol that
/// produced it.
pub async fn resolve_history(
    provider: &(dyn MarketDataProvider + Send + Sync),
    identifier: &str,
    range: HistoryRange,
) -> Result<Option<(String, Vec<PriceBar>)>> {
    let mut last_error = None;
    let mut any_clean_miss = false;

    for symbol in candidates(identifier) {
        match provider.fetch_history(&symbol, range).await {
            Ok(bars) if !bars.is_empty() => return Ok(Some((symbol, bars))),
            Ok(_) => {
                debug!("No history for {symbol} ({range})");
                any_clean_miss = true;
            }
            Err(e) => {
                debug!("History lookup failed for {symbol}: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_clean_miss => Err(e),
        _ => Ok(None),
    }
}
