use super::watchlist::ensure_watched;
use super::{canonical_ticker, print_warning, ui};
use crate::core::persistence::{TransactionStore, WatchlistStore};
use crate::core::price::MarketDataProvider;
use crate::core::transaction::{Transaction, parse_date};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::warn;

/// A purchase as entered on the command line.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub ticker: String,
    pub quantity: f64,
    pub price: f64,
    /// Defaults to today.
    pub date: Option<String>,
    pub isin: Option<String>,
}

/// Records the purchase under its resolved symbol and makes sure the symbol
/// is watched.
pub async fn run(
    provider: &(dyn MarketDataProvider + Send + Sync),
    transactions: &dyn TransactionStore,
    watchlist: &dyn WatchlistStore,
    entry: NewTransaction,
    today: NaiveDate,
) -> Result<Transaction> {
    let date = match entry.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => today,
    };
    let isin = entry.isin.as_deref().unwrap_or("");
    // Reject bad input before touching the network.
    Transaction::new(date, isin, &entry.ticker, entry.price, entry.quantity)?;

    let ticker = canonical_ticker(provider, &entry.ticker).await;
    let transaction = Transaction::new(date, isin, &ticker, entry.price, entry.quantity)?;
    transactions
        .append_transaction(&transaction)
        .await
        .context("Failed to save transaction")?;

    println!(
        "Recorded {} x {} at {:.2} on {}",
        transaction.quantity(),
        ui::style_text(transaction.ticker(), ui::StyleType::TotalLabel),
        transaction.price(),
        transaction.date()
    );

    match ensure_watched(watchlist, transaction.ticker()).await {
        Ok(true) => println!("Added {} to the watchlist", transaction.ticker()),
        Ok(false) => {}
        Err(e) => {
            warn!("Could not update watchlist: {e:#}");
            print_warning(&format!("{} was not added to the watchlist", transaction.ticker()));
        }
    }
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TransactionError;
    use crate::core::symbol::tests::FixtureProvider;
    use crate::store::csv_file::{CsvTransactionStore, CsvWatchlistStore};
    use tempfile::TempDir;

    fn entry(ticker: &str, quantity: f64, date: Option<&str>) -> NewTransaction {
        NewTransaction {
            ticker: ticker.to_string(),
            quantity,
            price: 410.0,
            date: date.map(str::to_string),
            isin: Some("IE00B5BMR087".to_string()),
        }
    }

    #[tokio::test]
    async fn test_add_stores_resolved_ticker_and_watches_it() {
        let dir = TempDir::new().unwrap();
        let transactions = CsvTransactionStore::new(dir.path().join("transactions.csv"));
        let watchlist = CsvWatchlistStore::new(dir.path().join("watchlist.csv"));
        let provider = FixtureProvider::default().with_quote("SXR8.DE", 412.0);
        let today = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();

        let tx = run(
            &provider,
            &transactions,
            &watchlist,
            entry("sxr8", 2.0, Some("01/04/2025")),
            today,
        )
        .await
        .unwrap();

        assert_eq!(tx.ticker(), "SXR8.DE");
        assert_eq!(tx.date(), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(transactions.load_transactions().await.unwrap(), vec![tx]);
        assert_eq!(watchlist.load_watchlist().await.unwrap(), vec!["SXR8.DE"]);

        let second = run(&provider, &transactions, &watchlist, entry("SXR8.DE", 1.0, None), today)
            .await
            .unwrap();
        assert_eq!(second.date(), today);
        assert_eq!(transactions.load_transactions().await.unwrap().len(), 2);
        assert_eq!(watchlist.load_watchlist().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_entry_is_rejected_before_lookup() {
        let dir = TempDir::new().unwrap();
        let transactions = CsvTransactionStore::new(dir.path().join("transactions.csv"));
        let watchlist = CsvWatchlistStore::new(dir.path().join("watchlist.csv"));
        let provider = FixtureProvider::default();
        let today = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();

        let err = run(&provider, &transactions, &watchlist, entry("SXR8", 0.0, None), today)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransactionError>(),
            Some(&TransactionError::NonPositiveQuantity(0.0))
        );
        assert!(provider.calls().is_empty());
        assert!(!transactions.path().exists());
    }
}
