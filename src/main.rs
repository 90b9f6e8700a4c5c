use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use etfolio::cli::add::NewTransaction;
use etfolio::cli::dashboard::DashboardOptions;
use etfolio::core::log::init_logging;
use etfolio::core::price::ChartPeriod;
use etfolio::{AppCommand, WatchCommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Record an ETF purchase
    Add {
        /// Ticker or bare symbol, e.g. SXR8 or SWDA.MI
        ticker: String,
        #[arg(short, long)]
        quantity: f64,
        /// Price paid per unit
        #[arg(short, long)]
        price: f64,
        /// Purchase date (2025-01-31 or 31/01/2025), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        #[arg(long)]
        isin: Option<String>,
    },
    /// List recorded transactions
    Transactions,
    /// Display holdings, gains and annualized returns
    Portfolio,
    /// Display the portfolio value day by day
    History {
        /// Number of most recent days to show, 0 for all
        #[arg(short, long, default_value_t = 30)]
        limit: usize,
    },
    /// Compare holdings since the most recent purchase
    Compare,
    /// Search instruments by ISIN, ticker or name
    Search { query: String },
    /// Manage the watchlist
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Display quotes and period changes for the watchlist
    Dashboard {
        /// Chart window: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y or max
        #[arg(long, default_value = "1mo")]
        period: ChartPeriod,
        /// Window the change is measured over
        #[arg(long, default_value = "1d")]
        change_period: ChartPeriod,
        /// Number of recent closes to show
        #[arg(long, default_value_t = 5)]
        bars: usize,
    },
}

#[derive(Subcommand)]
enum WatchAction {
    /// Watch a ticker
    Add { ticker: String },
    /// Stop watching a ticker
    Remove { ticker: String },
    /// Show watched tickers with their quotes
    List,
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Add {
                ticker,
                quantity,
                price,
                date,
                isin,
            } => AppCommand::Add(NewTransaction {
                ticker,
                quantity,
                price,
                date,
                isin,
            }),
            Commands::Transactions => AppCommand::Transactions,
            Commands::Portfolio => AppCommand::Portfolio,
            Commands::History { limit } => AppCommand::History { limit },
            Commands::Compare => AppCommand::Compare,
            Commands::Search { query } => AppCommand::Search { query },
            Commands::Watch { action } => AppCommand::Watch(match action {
                WatchAction::Add { ticker } => WatchCommand::Add { ticker },
                WatchAction::Remove { ticker } => WatchCommand::Remove { ticker },
                WatchAction::List => WatchCommand::List,
            }),
            Commands::Dashboard {
                period,
                change_period,
                bars,
            } => AppCommand::Dashboard(DashboardOptions {
                period,
                change_period,
                bars,
            }),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => etfolio::cli::setup::setup_at_path(path),
            None => etfolio::cli::setup::setup(),
        },
        Some(cmd) => etfolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
