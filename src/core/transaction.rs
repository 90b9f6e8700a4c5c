//! Buy transactions and the parsing rules for their persisted form.

use super::error::TransactionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Persisted column names, in write order.
pub const COLUMNS: [&str; 5] = ["Date", "ISIN", "Ticker", "Price", "Quantity"];

/// Columns a store must provide. Legacy data may omit `ISIN`.
pub const REQUIRED_COLUMNS: [&str; 4] = ["Date", "Ticker", "Price", "Quantity"];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// A single buy of `quantity` units of `ticker` at `price`.
///
/// Fields are private so a constructed transaction always satisfies
/// `quantity > 0` and `price >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    date: NaiveDate,
    isin: String,
    ticker: String,
    price: f64,
    quantity: f64,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        isin: &str,
        ticker: &str,
        price: f64,
        quantity: f64,
    ) -> Result<Self, TransactionError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(TransactionError::EmptyTicker);
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(TransactionError::NonPositiveQuantity(quantity));
        }
        if !price.is_finite() || price < 0.0 {
            return Err(TransactionError::NegativePrice(price));
        }
        Ok(Self {
            date,
            isin: isin.trim().to_string(),
            ticker: ticker.to_string(),
            price,
            quantity,
        })
    }

    /// Builds a transaction from the raw text of a persisted row.
    pub fn from_fields(
        date: &str,
        isin: &str,
        ticker: &str,
        price: &str,
        quantity: &str,
    ) -> Result<Self, TransactionError> {
        Self::new(
            parse_date(date)?,
            isin,
            ticker,
            parse_number("Price", price)?,
            parse_number("Quantity", quantity)?,
        )
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn isin(&self) -> &str {
        &self.isin
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Amount paid for this lot.
    pub fn outlay(&self) -> f64 {
        self.price * self.quantity
    }

    /// Row values in [`COLUMNS`] order, dates as ISO-8601.
    pub fn to_row(&self) -> [String; 5] {
        [
            self.date.format("%Y-%m-%d").to_string(),
            self.isin.clone(),
            self.ticker.clone(),
            self.price.to_string(),
            self.quantity.to_string(),
        ]
    }
}

/// Parses an ISO-8601 or day-first locale date. Time of day and any UTC
/// offset are dropped, keeping the calendar date as written.
pub fn parse_date(value: &str) -> Result<NaiveDate, TransactionError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.date());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    Err(TransactionError::InvalidDate(value.to_string()))
}

/// Parses a decimal value, accepting a decimal comma (`73,5`).
pub fn parse_number(column: &'static str, value: &str) -> Result<f64, TransactionError> {
    let trimmed = value.trim();
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized
        .parse::<f64>()
        .map_err(|_| TransactionError::InvalidNumber {
            column,
            value: value.to_string(),
        })
}
