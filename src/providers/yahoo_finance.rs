use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use super::util::with_retry;
use crate::core::price::{HistoryRange, MarketDataProvider, PriceBar, Quote, SearchHit};

pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("etfolio/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn chart_url(&self, symbol: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Yahoo base url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Yahoo base url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    /// `Ok(None)` when Yahoo does not know the symbol.
    async fn fetch_chart(&self, symbol: &str, url: Url) -> Result<Option<ChartItem>> {
        debug!("Requesting chart data from {}", url);
        let response = with_retry(|| self.client.get(url.clone()).send(), 2, 300)
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Symbol {symbol} not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;
        Ok(data.chart.result.and_then(|items| items.into_iter().next()))
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    currency: Option<String>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<QuoteIndicator>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteIndicator {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchQuote {
    symbol: Option<String>,
    #[serde(rename = "longname")]
    long_name: Option<String>,
    #[serde(rename = "shortname")]
    short_name: Option<String>,
    exchange: Option<String>,
    quote_type: Option<String>,
}

fn value_at(series: &Option<Vec<Option<f64>>>, index: usize) -> Option<f64> {
    series.as_ref().and_then(|s| s.get(index).copied().flatten())
}

/// Daily bars keyed by exchange-local date. Bars without a close are dropped;
/// a later bar on the same date replaces an earlier one.
fn extract_bars(item: &ChartItem) -> Vec<PriceBar> {
    let (Some(timestamps), Some(quote)) = (
        item.timestamp.as_ref(),
        item.indicators.as_ref().and_then(|i| i.quote.first()),
    ) else {
        return Vec::new();
    };

    let mut bars = BTreeMap::new();
    for (index, ts) in timestamps.iter().enumerate() {
        let Some(close) = value_at(&quote.close, index) else {
            continue;
        };
        let Some(date) = DateTime::<Utc>::from_timestamp(ts + item.meta.gmtoffset, 0)
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        bars.insert(
            date,
            PriceBar {
                date,
                open: value_at(&quote.open, index).unwrap_or(close),
                high: value_at(&quote.high, index).unwrap_or(close),
                low: value_at(&quote.low, index).unwrap_or(close),
                close,
            },
        );
    }
    bars.into_values().collect()
}

fn range_params(range: HistoryRange, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    match range {
        HistoryRange::Period(period) => vec![("range", period.to_string())],
        HistoryRange::Since(date) => {
            let start = date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default();
            vec![
                ("period1", start.to_string()),
                ("period2", now.timestamp().to_string()),
            ]
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let url = self.chart_url(symbol, &[("range", "5d".to_string())])?;
        let Some(item) = self.fetch_chart(symbol, url).await? else {
            return Ok(None);
        };
        let Some(price) = item.meta.regular_market_price else {
            debug!("No market price for {symbol}");
            return Ok(None);
        };

        let meta = item.meta;
        Ok(Some(Quote {
            symbol: symbol.to_string(),
            name: meta
                .long_name
                .or(meta.short_name)
                .unwrap_or_else(|| symbol.to_string()),
            price,
            currency: meta.currency.unwrap_or_default(),
            previous_close: meta.chart_previous_close.or(meta.previous_close),
        }))
    }

    #[instrument(name = "YahooHistoryFetch", skip(self), fields(symbol = %symbol, range = %range))]
    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(symbol, &range_params(range, Utc::now()))?;
        let bars = self
            .fetch_chart(symbol, url)
            .await?
            .map(|item| extract_bars(&item))
            .unwrap_or_default();
        debug!("Received {} bars", bars.len());
        Ok(bars)
    }

    #[instrument(name = "YahooSearch", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut url = Url::parse(&format!("{}/v1/finance/search", self.base_url))
            .with_context(|| format!("Invalid Yahoo base url: {}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("quotesCount", "10")
            .append_pair("newsCount", "0");

        let response = with_retry(|| self.client.get(url.clone()).send(), 2, 300)
            .await
            .map_err(|e| anyhow!("Request error: {} for search: {}", e, query))?;
        if !response.status().is_success() {
            warn!("Search for {query} failed with HTTP {}", response.status());
            return Ok(Vec::new());
        }

        let data: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse search response for {query}"))?;
        Ok(data
            .quotes
            .into_iter()
            .filter_map(|q| {
                let symbol = q.symbol?;
                Some(SearchHit {
                    name: q.long_name.or(q.short_name).unwrap_or_else(|| symbol.clone()),
                    symbol,
                    exchange: q.exchange.unwrap_or_default(),
                    quote_type: q.quote_type.unwrap_or_default(),
                })
            })
            .collect())
    }
}
