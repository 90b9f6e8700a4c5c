//! Ordered chains of stores: the first store that answers wins.

use crate::core::error::PersistenceError;
use crate::core::persistence::{TransactionStore, WatchlistStore};
use crate::core::transaction::Transaction;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Tries each transaction store in order until one succeeds.
pub struct FallbackTransactionStore {
    stores: Vec<Box<dyn TransactionStore>>,
}

impl FallbackTransactionStore {
    pub fn new(stores: Vec<Box<dyn TransactionStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl TransactionStore for FallbackTransactionStore {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn load_transactions(&self) -> Result<Vec<Transaction>, PersistenceError> {
        let mut failures = Vec::new();
        for store in &self.stores {
            match store.load_transactions().await {
                Ok(transactions) => {
                    debug!("Transactions loaded from {}", store.name());
                    return Ok(transactions);
                }
                Err(e) => {
                    warn!("Could not load transactions from {}: {e}", store.name());
                    failures.push(format!("{}: {e}", store.name()));
                }
            }
        }
        Err(PersistenceError::Exhausted(failures))
    }

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), PersistenceError> {
        let mut failures = Vec::new();
        for store in &self.stores {
            match store.append_transaction(transaction).await {
                Ok(()) => {
                    debug!("Transaction saved to {}", store.name());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Could not save transaction to {}: {e}", store.name());
                    failures.push(format!("{}: {e}", store.name()));
                }
            }
        }
        Err(PersistenceError::Exhausted(failures))
    }
}

/// Tries each watchlist store in order until one succeeds.
pub struct FallbackWatchlistStore {
    stores: Vec<Box<dyn WatchlistStore>>,
}

impl FallbackWatchlistStore {
    pub fn new(stores: Vec<Box<dyn WatchlistStore>>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl WatchlistStore for FallbackWatchlistStore {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn load_watchlist(&self) -> Result<Vec<String>, PersistenceError> {
        let mut failures = Vec::new();
        for store in &self.stores {
            match store.load_watchlist().await {
                Ok(tickers) => return Ok(tickers),
                Err(e) => {
                    warn!("Could not load watchlist from {}: {e}", store.name());
                    failures.push(format!("{}: {e}", store.name()));
                }
            }
        }
        Err(PersistenceError::Exhausted(failures))
    }

    async fn save_watchlist(&self, tickers: &[String]) -> Result<(), PersistenceError> {
        let mut failures = Vec::new();
        for store in &self.stores {
            match store.save_watchlist(tickers).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Could not save watchlist to {}: {e}", store.name());
                    failures.push(format!("{}: {e}", store.name()));
                }
            }
        }
        Err(PersistenceError::Exhausted(failures))
    }
}
