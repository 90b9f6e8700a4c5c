pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::add::NewTransaction;
use crate::cli::dashboard::DashboardOptions;
use crate::core::cache::Store;
use crate::core::config::AppConfig;
use crate::core::persistence::{TransactionStore, WatchlistStore};
use crate::core::price::MarketDataProvider;
use crate::providers::{CachingMarketDataProvider, YahooFinanceProvider};
use crate::store::KeyValueStore;
use crate::store::csv_file::{CsvTransactionStore, CsvWatchlistStore};
use crate::store::fallback::{FallbackTransactionStore, FallbackWatchlistStore};
use crate::store::sheets::SheetsStore;
use anyhow::Result;
use chrono::Local;
use tracing::{debug, info};

pub enum AppCommand {
    Add(NewTransaction),
    Transactions,
    Portfolio,
    History { limit: usize },
    Compare,
    Search { query: String },
    Watch(WatchCommand),
    Dashboard(DashboardOptions),
}

pub enum WatchCommand {
    Add { ticker: String },
    Remove { ticker: String },
    List,
}

/// Collaborators for one command run, built from the config.
struct App {
    config: AppConfig,
    provider: Box<dyn MarketDataProvider + Send + Sync>,
    transactions: FallbackTransactionStore,
    watchlist: FallbackWatchlistStore,
    // Holds the cache keyspace open while the provider uses it.
    _cache: KeyValueStore,
}

impl App {
    fn new(config: AppConfig) -> Result<Self> {
        let cache = KeyValueStore::new(config.cache_dir().ok().as_deref());
        let yahoo = YahooFinanceProvider::new(&config.providers.yahoo.base_url)?;
        let provider: Box<dyn MarketDataProvider + Send + Sync> = match cache
            .get_collection("market_data", true, true)
            .or_else(|| cache.get_collection("market_data", false, true))
        {
            Some(collection) => Box::new(CachingMarketDataProvider::new(
                yahoo,
                collection,
                config.cache.ttl(),
            )),
            None => Box::new(yahoo),
        };

        let mut transactions: Vec<Box<dyn TransactionStore>> = Vec::new();
        let mut watchlist: Vec<Box<dyn WatchlistStore>> = Vec::new();
        if let Some(sheets) = &config.storage.sheets {
            debug!("Using spreadsheet {} as primary store", sheets.spreadsheet_id);
            let store = || {
                SheetsStore::new(
                    &sheets.base_url,
                    &sheets.spreadsheet_id,
                    &sheets.transactions_sheet,
                    sheets.token(),
                )
            };
            transactions.push(Box::new(store()));
            watchlist.push(Box::new(store()));
        }
        transactions.push(Box::new(CsvTransactionStore::new(config.transactions_path()?)));
        watchlist.push(Box::new(CsvWatchlistStore::new(config.watchlist_path()?)));

        Ok(Self {
            provider,
            transactions: FallbackTransactionStore::new(transactions),
            watchlist: FallbackWatchlistStore::new(watchlist),
            _cache: cache,
            config,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("etfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::new(config)?;
    let provider = app.provider.as_ref();
    let today = Local::now().date_naive();
    let currency = app.config.currency.as_str();

    match command {
        AppCommand::Add(entry) => {
            cli::add::run(provider, &app.transactions, &app.watchlist, entry, today)
                .await
                .map(|_| ())
        }
        AppCommand::Transactions => {
            cli::transactions::run(provider, &app.transactions, currency).await
        }
        AppCommand::Portfolio => {
            cli::portfolio::run(provider, &app.transactions, currency, today).await
        }
        AppCommand::History { limit } => {
            cli::history::run(provider, &app.transactions, currency, limit).await
        }
        AppCommand::Compare => cli::compare::run(provider, &app.transactions).await,
        AppCommand::Search { query } => cli::search::run(provider, &query).await,
        AppCommand::Watch(WatchCommand::Add { ticker }) => {
            cli::watchlist::add(provider, &app.watchlist, &ticker).await
        }
        AppCommand::Watch(WatchCommand::Remove { ticker }) => {
            cli::watchlist::remove(&app.watchlist, &ticker).await
        }
        AppCommand::Watch(WatchCommand::List) => {
            cli::watchlist::list(provider, &app.watchlist).await
        }
        AppCommand::Dashboard(options) => {
            cli::dashboard::run(provider, &app.watchlist, &options).await
        }
    }
}
