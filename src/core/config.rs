use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

pub const SHEETS_TOKEN_ENV: &str = "ETFOLIO_SHEETS_TOKEN";

const TRANSACTIONS_FILE: &str = "transactions.csv";
const WATCHLIST_FILE: &str = "watchlist.csv";

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_yahoo_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_sheets_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_transactions_sheet() -> String {
    "Sheet1".to_string()
}

fn default_ttl_minutes() -> u64 {
    15
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    #[serde(default = "default_yahoo_url")]
    pub base_url: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_yahoo_url(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheets_url")]
    pub base_url: String,
    #[serde(default = "default_transactions_sheet")]
    pub transactions_sheet: String,
    pub access_token: Option<String>,
}

impl SheetsConfig {
    /// Token from the config file, else from `ETFOLIO_SHEETS_TOKEN`.
    pub fn token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(SHEETS_TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageConfig {
    pub data_path: Option<String>,
    pub sheets: Option<SheetsConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "etfolio", "etfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.storage.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "etfolio", "etfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn transactions_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(TRANSACTIONS_FILE))
    }

    pub fn watchlist_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(WATCHLIST_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("cache"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
