//! Day-by-day portfolio value over a joined price table.

use super::performance::CloseSeries;
use super::price::PriceBar;
use super::transaction::Transaction;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Closing prices of several tickers aligned on the union of their trading
/// days. A gap after a ticker's first close carries the previous close
/// forward; days before its first close stay empty.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    closes: HashMap<String, Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn new(series: &HashMap<String, CloseSeries>) -> Self {
        let dates: Vec<NaiveDate> = series
            .values()
            .flat_map(|s| s.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let closes = series
            .iter()
            .map(|(ticker, s)| {
                let mut last = None;
                let column = dates
                    .iter()
                    .map(|date| {
                        if let Some(close) = s.get(date) {
                            last = Some(*close);
                        }
                        last
                    })
                    .collect();
                (ticker.clone(), column)
            })
            .collect();

        Self { dates, closes }
    }

    pub fn from_bars(bars: &HashMap<String, Vec<PriceBar>>) -> Self {
        let series: HashMap<String, CloseSeries> = bars
            .iter()
            .map(|(ticker, bars)| {
                (
                    ticker.clone(),
                    bars.iter().map(|bar| (bar.date, bar.close)).collect(),
                )
            })
            .collect();
        Self::new(&series)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn close(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let index = self.dates.binary_search(&date).ok()?;
        self.close_at(ticker, index)
    }

    fn close_at(&self, ticker: &str, index: usize) -> Option<f64> {
        self.closes.get(ticker).and_then(|column| column[index])
    }

    /// The forward-filled closes of one ticker.
    pub fn close_series(&self, ticker: &str) -> Option<CloseSeries> {
        let column = self.closes.get(ticker)?;
        Some(
            self.dates
                .iter()
                .zip(column)
                .filter_map(|(date, close)| close.map(|c| (*date, c)))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyValuePoint {
    pub date: NaiveDate,
    pub invested_value: f64,
    pub market_value: f64,
    pub gain_loss: f64,
}

/// Portfolio value on every table date from the first purchase onward.
///
/// Holdings and invested value are rebuilt from the transaction list for each
/// date. A ticker without a close on a date, even after forward-fill, adds
/// nothing to that day's market value.
pub fn daily_value_series(transactions: &[Transaction], table: &PriceTable) -> Vec<DailyValuePoint> {
    let mut points = Vec::new();

    for (index, date) in table.dates.iter().enumerate() {
        let mut holdings: HashMap<&str, f64> = HashMap::new();
        let mut invested_value = 0.0;
        let mut any_eligible = false;

        for tx in transactions.iter().filter(|tx| tx.date() <= *date) {
            any_eligible = true;
            *holdings.entry(tx.ticker()).or_insert(0.0) += tx.quantity();
            invested_value += tx.outlay();
        }

        if !any_eligible {
            continue;
        }

        let market_value: f64 = holdings
            .iter()
            .filter_map(|(ticker, quantity)| {
                table.close_at(ticker, index).map(|close| quantity * close)
            })
            .sum();

        points.push(DailyValuePoint {
            date: *date,
            invested_value,
            market_value,
            gain_loss: market_value - invested_value,
        });
    }

    points
}
