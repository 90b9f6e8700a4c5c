//! Storage abstractions for transactions and the watchlist

use super::error::PersistenceError;
use super::transaction::Transaction;
use async_trait::async_trait;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn load_transactions(&self) -> Result<Vec<Transaction>, PersistenceError>;

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait WatchlistStore: Send + Sync {
    fn name(&self) -> &str;

    async fn load_watchlist(&self) -> Result<Vec<String>, PersistenceError>;

    async fn save_watchlist(&self, tickers: &[String]) -> Result<(), PersistenceError>;
}
