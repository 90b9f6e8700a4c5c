//! Core domain types, calculations and seams

pub mod cache;
pub mod change;
pub mod config;
pub mod error;
pub mod history;
pub mod log;
pub mod performance;
pub mod persistence;
pub mod price;
pub mod symbol;
pub mod transaction;
pub mod watchlist;

// Re-export main types for cleaner imports
pub use error::{PersistenceError, TransactionError};
pub use history::{DailyValuePoint, PriceTable, daily_value_series};
pub use performance::{
    CloseSeries, HoldingSnapshot, PortfolioTotals, calculate_snapshots, portfolio_totals,
};
pub use persistence::{TransactionStore, WatchlistStore};
pub use price::{ChartPeriod, HistoryRange, MarketDataProvider, PriceBar, Quote, SearchHit};
pub use transaction::Transaction;
pub use watchlist::Watchlist;
