pub mod add;
pub mod compare;
pub mod dashboard;
pub mod history;
pub mod portfolio;
pub mod search;
pub mod setup;
pub mod transactions;
pub mod ui;
pub mod watchlist;

use crate::core::price::{HistoryRange, MarketDataProvider, PriceBar, Quote};
use crate::core::symbol::{resolve_history, resolve_quote};
use crate::core::transaction::Transaction;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Distinct tickers of `transactions`, sorted.
pub(crate) fn unique_tickers(transactions: &[Transaction]) -> Vec<String> {
    transactions
        .iter()
        .map(|tx| tx.ticker().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolves every identifier concurrently. Failed lookups are logged and map
/// to `None` like unresolved ones.
pub(crate) async fn fetch_quotes(
    provider: &(dyn MarketDataProvider + Send + Sync),
    identifiers: &[String],
) -> HashMap<String, Option<Quote>> {
    let pb = ui::new_progress_bar(identifiers.len() as u64);
    let futures = identifiers.iter().map(|id| {
        let pb = pb.clone();
        async move {
            let quote = resolve_quote(provider, id).await.unwrap_or_else(|e| {
                warn!("Quote lookup failed for {id}: {e}");
                None
            });
            pb.inc(1);
            (id.clone(), quote)
        }
    });
    let quotes = join_all(futures).await.into_iter().collect();
    pb.finish_and_clear();
    quotes
}

/// Fetches the history of each `(identifier, range)` concurrently, keyed by
/// identifier. The value carries the symbol that resolved.
pub(crate) async fn fetch_histories(
    provider: &(dyn MarketDataProvider + Send + Sync),
    requests: &[(String, HistoryRange)],
) -> HashMap<String, Option<(String, Vec<PriceBar>)>> {
    let pb = ui::new_progress_bar(requests.len() as u64);
    let futures = requests.iter().map(|(id, range)| {
        let pb = pb.clone();
        async move {
            let history = resolve_history(provider, id, *range)
                .await
                .unwrap_or_else(|e| {
                    warn!("History lookup failed for {id}: {e}");
                    None
                });
            pb.inc(1);
            (id.clone(), history)
        }
    });
    let histories = join_all(futures).await.into_iter().collect();
    pb.finish_and_clear();
    histories
}

/// Symbol `input` resolves to, or the trimmed input when it does not resolve.
pub(crate) async fn canonical_ticker(
    provider: &(dyn MarketDataProvider + Send + Sync),
    input: &str,
) -> String {
    let input = input.trim().to_uppercase();
    match resolve_quote(provider, &input).await {
        Ok(Some(quote)) => quote.symbol,
        Ok(None) => {
            print_warning(&format!("Could not resolve {input}, keeping it as entered"));
            input
        }
        Err(e) => {
            warn!("Lookup failed for {input}: {e}");
            print_warning(&format!("Could not look up {input}, keeping it as entered"));
            input
        }
    }
}

pub(crate) fn print_warning(message: &str) {
    println!("{}", ui::style_text(&format!("Warning: {message}"), ui::StyleType::Warning));
}
