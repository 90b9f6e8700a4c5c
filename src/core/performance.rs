//! Per-ticker holding snapshots and portfolio totals.
//!
//! Everything here is recomputed from the full transaction list on each
//! call. Missing prices count as 0 and every ratio with a zero denominator is
//! 0.
use super::transaction::Transaction;
use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Daily closes for one ticker, keyed by trading day.
pub type CloseSeries = BTreeMap<NaiveDate, f64>;

const DAYS_PER_YEAR: i64 = 365;

/// Derived position of one ticker as of the evaluation date.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingSnapshot {
    pub ticker: String,
    pub quantity: f64,
    pub average_cost: f64,
    pub current_price: f64,
    pub invested_value: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    pub gain_loss_pct: f64,
    pub annualized_return_pct: f64,
    pub first_purchase: NaiveDate,
    pub days_held: i64,
}

impl HoldingSnapshot {
    /// True when the position is held but no price could be found for it.
    pub fn is_missing_price(&self) -> bool {
        self.current_price == 0.0 && self.quantity > 0.0
    }
}

/// Sums over all snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioTotals {
    pub invested_value: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    pub gain_loss_pct: f64,
}

/// Builds one snapshot per ticker present in `transactions`.
///
/// `current_prices` missing a ticker yields a price of 0. `history` is only
/// consulted for positions held for at least a year.
pub fn calculate_snapshots(
    transactions: &[Transaction],
    current_prices: &HashMap<String, f64>,
    history: Option<&HashMap<String, CloseSeries>>,
    today: NaiveDate,
) -> Vec<HoldingSnapshot> {
    let mut groups: BTreeMap<&str, (NaiveDate, Vec<&Transaction>)> = BTreeMap::new();
    for tx in transactions {
        let (first, lots) = groups
            .entry(tx.ticker())
            .or_insert_with(|| (tx.date(), Vec::new()));
        *first = (*first).min(tx.date());
        lots.push(tx);
    }

    let mut snapshots = Vec::with_capacity(groups.len());
    for (ticker, (first_purchase, lots)) in groups {
        let quantity: f64 = lots.iter().map(|tx| tx.quantity()).sum();
        if quantity <= 0.0 {
            debug!("Skipping {ticker}: no units held");
            continue;
        }

        let average_cost = lots.iter().map(|tx| tx.outlay()).sum::<f64>() / quantity;
        let current_price = current_prices.get(ticker).copied().unwrap_or(0.0);

        let invested_value = quantity * average_cost;
        let current_value = quantity * current_price;
        let gain_loss = current_value - invested_value;
        let gain_loss_pct = percent_of(gain_loss, invested_value);

        let days_held = (today - first_purchase).num_days();

        let annualized_return_pct = annualized_return(
            days_held,
            invested_value,
            current_value,
            current_price,
            history.and_then(|h| h.get(ticker)),
            today,
        );

        snapshots.push(HoldingSnapshot {
            ticker: ticker.to_string(),
            quantity,
            average_cost,
            current_price,
            invested_value,
            current_value,
            gain_loss,
            gain_loss_pct,
            annualized_return_pct,
            first_purchase,
            days_held,
        });
    }

    snapshots
}

pub fn portfolio_totals(snapshots: &[HoldingSnapshot]) -> PortfolioTotals {
    let invested_value: f64 = snapshots.iter().map(|s| s.invested_value).sum();
    let current_value: f64 = snapshots.iter().map(|s| s.current_value).sum();
    let gain_loss = current_value - invested_value;
    PortfolioTotals {
        invested_value,
        current_value,
        gain_loss,
        gain_loss_pct: percent_of(gain_loss, invested_value),
    }
}

/// Yearly rate of return for a position held `days_held` days.
///
/// Under a year the simple return is scaled linearly. From a year on, the
/// close one year back in `series` anchors the rate; without it the growth
/// since purchase is compounded.
pub fn annualized_return(
    days_held: i64,
    invested_value: f64,
    current_value: f64,
    current_price: f64,
    series: Option<&CloseSeries>,
    today: NaiveDate,
) -> f64 {
    if days_held <= 0 {
        return 0.0;
    }

    if days_held < DAYS_PER_YEAR {
        let simple_return_pct = if invested_value == 0.0 {
            0.0
        } else {
            (current_value / invested_value - 1.0) * 100.0
        };
        return simple_return_pct / days_held as f64 * DAYS_PER_YEAR as f64;
    }

    let year_ago = today - Duration::days(DAYS_PER_YEAR);
    if let Some((date, price)) = series.and_then(|s| s.range(year_ago..).next()) {
        if *price > 0.0 {
            debug!("Annualizing against close {price} on {date}");
            return (current_price / price - 1.0) * 100.0;
        }
    }

    compound_annualized(invested_value, current_value, days_held)
}

fn compound_annualized(invested_value: f64, current_value: f64, days_held: i64) -> f64 {
    if invested_value == 0.0 {
        return 0.0;
    }
    if current_value <= 0.0 {
        return -100.0;
    }

    let years = days_held as f64 / DAYS_PER_YEAR as f64;
    let rate = match (
        Decimal::from_f64(invested_value),
        Decimal::from_f64(current_value),
        Decimal::from_f64(years),
    ) {
        (Some(begin_bal), Some(end_bal), Some(n_years)) if !n_years.is_zero() => {
            (cagr(begin_bal, end_bal, n_years) * Decimal::from(100)).to_f64()
        }
        _ => None,
    };

    rate.unwrap_or_else(|| {
        debug!("Decimal CAGR unavailable, using f64 for {current_value}/{invested_value}");
        ((current_value / invested_value).powf(1.0 / years) - 1.0) * 100.0
    })
}

fn percent_of(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}
