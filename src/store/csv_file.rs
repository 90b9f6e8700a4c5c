//! Local CSV files for transactions and the watchlist.

use crate::core::error::PersistenceError;
use crate::core::persistence::{TransactionStore, WatchlistStore};
use crate::core::transaction::{COLUMNS, REQUIRED_COLUMNS, Transaction};
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const WATCHLIST_HEADER: &str = "Ticker";

pub struct CsvTransactionStore {
    path: PathBuf,
}

impl CsvTransactionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_headers(&self) -> Result<Option<StringRecord>, PersistenceError> {
        if !self.path.exists() || fs::metadata(&self.path)?.len() == 0 {
            return Ok(None);
        }
        let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        Ok(Some(reader.headers()?.clone()))
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Whether the last byte of a non-empty file is a newline.
fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[async_trait]
impl TransactionStore for CsvTransactionStore {
    fn name(&self) -> &str {
        "csv"
    }

    async fn load_transactions(&self) -> Result<Vec<Transaction>, PersistenceError> {
        let Some(headers) = self.read_headers()? else {
            debug!("No transaction file at {}", self.path.display());
            return Ok(Vec::new());
        };

        let mut indices = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for column in REQUIRED_COLUMNS {
            match column_index(&headers, column) {
                Some(index) => indices.push(index),
                None => {
                    warn!(
                        "{} is missing the {column} column, ignoring its rows",
                        self.path.display()
                    );
                    return Ok(Vec::new());
                }
            }
        }
        let (date, ticker, price, quantity) = (indices[0], indices[1], indices[2], indices[3]);
        let isin = column_index(&headers, "ISIN");

        let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        let mut transactions = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable row {} of {}: {e}", line + 2, self.path.display());
                    continue;
                }
            };
            let field = |index: usize| record.get(index).unwrap_or("");
            match Transaction::from_fields(
                field(date),
                isin.map_or("", field),
                field(ticker),
                field(price),
                field(quantity),
            ) {
                Ok(tx) => transactions.push(tx),
                Err(e) => warn!("Skipping row {} of {}: {e}", line + 2, self.path.display()),
            }
        }

        debug!(
            "Loaded {} transactions from {}",
            transactions.len(),
            self.path.display()
        );
        Ok(transactions)
    }

    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), PersistenceError> {
        let existing = self.read_headers()?;

        // Follow the column order already on disk so older files stay readable.
        let row: Vec<String> = match &existing {
            Some(headers) => {
                if let Some(missing) = REQUIRED_COLUMNS
                    .iter()
                    .find(|c| column_index(headers, c).is_none())
                {
                    return Err(PersistenceError::Schema(format!(
                        "{} has no {missing} column",
                        self.path.display()
                    )));
                }
                let values = transaction.to_row();
                headers
                    .iter()
                    .map(|h| {
                        COLUMNS
                            .iter()
                            .position(|c| h.trim().eq_ignore_ascii_case(c))
                            .map(|i| values[i].clone())
                            .unwrap_or_default()
                    })
                    .collect()
            }
            None => transaction.to_row().to_vec(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let unterminated = existing.is_some() && !ends_with_newline(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if unterminated {
            file.write_all(b"\n")?;
        }
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if existing.is_none() {
            writer.write_record(COLUMNS)?;
        }
        writer.write_record(&row)?;
        writer.flush()?;

        debug!("Appended {} to {}", transaction.ticker(), self.path.display());
        Ok(())
    }
}

pub struct CsvWatchlistStore {
    path: PathBuf,
}

impl CsvWatchlistStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WatchlistStore for CsvWatchlistStore {
    fn name(&self) -> &str {
        "csv"
    }

    async fn load_watchlist(&self) -> Result<Vec<String>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut records = reader.records();
        let Some(first) = records.next().transpose()? else {
            return Ok(Vec::new());
        };

        let mut tickers = Vec::new();
        let index = match column_index(&first, WATCHLIST_HEADER) {
            Some(index) => index,
            None => {
                warn!(
                    "{} has no {WATCHLIST_HEADER} header, reading the first column",
                    self.path.display()
                );
                push_ticker(&mut tickers, &first, 0);
                0
            }
        };
        for record in records {
            push_ticker(&mut tickers, &record?, index);
        }
        Ok(tickers)
    }

    async fn save_watchlist(&self, tickers: &[String]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(&self.path)?;
        writer.write_record([WATCHLIST_HEADER])?;
        for ticker in tickers {
            writer.write_record([ticker])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn push_ticker(tickers: &mut Vec<String>, record: &StringRecord, index: usize) {
    if let Some(ticker) = record.get(index).map(str::trim).filter(|t| !t.is_empty()) {
        tickers.push(ticker.to_string());
    }
}
