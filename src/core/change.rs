//! Price change over a period and normalized comparative performance.

use super::price::PriceBar;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub previous: Option<f64>,
    pub change: f64,
    pub pct_change: f64,
}

/// Change of `current_price` against the start of `period_bars`.
///
/// With fewer than two bars the quote's previous close is the reference.
/// A missing or zero reference yields a zero percentage.
pub fn price_change(
    current_price: f64,
    period_bars: &[PriceBar],
    previous_close: Option<f64>,
) -> PriceChange {
    let previous = if period_bars.len() > 1 {
        period_bars.first().map(|bar| bar.close)
    } else {
        previous_close
    };

    let change = previous.map_or(0.0, |p| current_price - p);
    let pct_change = match previous {
        Some(p) if p != 0.0 => change / p * 100.0,
        _ => 0.0,
    };

    PriceChange {
        previous,
        change,
        pct_change,
    }
}

/// `(close / first close - 1) * 100` for every bar. `None` when the series is
/// empty or starts at a non-positive close.
pub fn relative_performance(bars: &[PriceBar]) -> Option<Vec<(NaiveDate, f64)>> {
    let start = bars.first()?.close;
    if start <= 0.0 {
        return None;
    }
    Some(
        bars.iter()
            .map(|bar| (bar.date, (bar.close / start - 1.0) * 100.0))
            .collect(),
    )
}

/// Lowest low and highest high across `bars`.
pub fn period_range(bars: &[PriceBar]) -> Option<(f64, f64)> {
    bars.iter().fold(None, |acc, bar| match acc {
        None => Some((bar.low, bar.high)),
        Some((low, high)) => Some((low.min(bar.low), high.max(bar.high))),
    })
}
