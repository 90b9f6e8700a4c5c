//! Market data abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ChartPeriod {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    Max,
}

impl Display for ChartPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChartPeriod::OneDay => "1d",
                ChartPeriod::FiveDays => "5d",
                ChartPeriod::OneMonth => "1mo",
                ChartPeriod::ThreeMonths => "3mo",
                ChartPeriod::SixMonths => "6mo",
                ChartPeriod::OneYear => "1y",
                ChartPeriod::TwoYears => "2y",
                ChartPeriod::FiveYears => "5y",
                ChartPeriod::Max => "max",
            }
        )
    }
}

impl ChartPeriod {
    /// Human label used in dashboard headers.
    pub fn label(&self) -> &'static str {
        match self {
            ChartPeriod::OneDay => "Daily",
            ChartPeriod::FiveDays => "5 Days",
            ChartPeriod::OneMonth => "Monthly",
            ChartPeriod::ThreeMonths => "Quarterly",
            ChartPeriod::SixMonths => "Semi-Annual",
            ChartPeriod::OneYear => "Annual",
            ChartPeriod::TwoYears => "2 Years",
            ChartPeriod::FiveYears => "5 Years",
            ChartPeriod::Max => "Max",
        }
    }
}

impl FromStr for ChartPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1d" => Ok(ChartPeriod::OneDay),
            "5d" => Ok(ChartPeriod::FiveDays),
            "1mo" => Ok(ChartPeriod::OneMonth),
            "3mo" => Ok(ChartPeriod::ThreeMonths),
            "6mo" => Ok(ChartPeriod::SixMonths),
            "1y" => Ok(ChartPeriod::OneYear),
            "2y" => Ok(ChartPeriod::TwoYears),
            "5y" => Ok(ChartPeriod::FiveYears),
            "max" => Ok(ChartPeriod::Max),
            _ => Err(anyhow::anyhow!("Invalid chart period: {}", s)),
        }
    }
}

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryRange {
    Period(ChartPeriod),
    Since(NaiveDate),
}

impl Display for HistoryRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryRange::Period(period) => write!(f, "{period}"),
            HistoryRange::Since(date) => write!(f, "since:{date}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub previous_close: Option<f64>,
}

/// One daily OHLC bar. `date` is the exchange-local trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub quote_type: String,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// `Ok(None)` means the symbol does not resolve. Transport failures are `Err`.
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>>;

    /// Daily bars in ascending date order; empty when there is no data.
    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<PriceBar>>;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}
