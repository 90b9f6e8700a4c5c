use crate::core::cache::KeyValueCollection;
use crate::core::price::{HistoryRange, MarketDataProvider, PriceBar, Quote, SearchHit};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Caches successful quote and history lookups of `inner` for `ttl`.
/// Errors are never cached; searches always go to `inner`.
pub struct CachingMarketDataProvider<T: MarketDataProvider> {
    inner: T,
    collection: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

impl<T: MarketDataProvider> CachingMarketDataProvider<T> {
    pub fn new(inner: T, collection: Arc<dyn KeyValueCollection>, ttl: Duration) -> Self {
        Self {
            inner,
            collection,
            ttl,
        }
    }

    async fn cached<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let raw = self.collection.get(key.as_bytes()).await?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Discarding unreadable cache entry {key}: {e}");
                self.collection.remove(key.as_bytes()).await;
                None
            }
        }
    }

    async fn store<V: Serialize>(&self, key: &str, value: &V) {
        match serde_json::to_vec(value) {
            Ok(raw) => self.collection.put(key.as_bytes(), &raw, Some(self.ttl)).await,
            Err(e) => debug!("Could not serialize cache entry {key}: {e}"),
        }
    }
}

#[async_trait]
impl<T: MarketDataProvider> MarketDataProvider for CachingMarketDataProvider<T> {
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let key = format!("quote:{symbol}");
        if let Some(quote) = self.cached(&key).await {
            debug!("Cache hit for quote: {}", symbol);
            return Ok(quote);
        }
        let quote = self.inner.fetch_quote(symbol).await?;
        self.store(&key, &quote).await;
        Ok(quote)
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<PriceBar>> {
        let key = format!("history:{symbol}:{range}");
        if let Some(bars) = self.cached(&key).await {
            debug!("Cache hit for history: {} ({})", symbol, range);
            return Ok(bars);
        }
        let bars = self.inner.fetch_history(symbol, range).await?;
        self.store(&key, &bars).await;
        Ok(bars)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.inner.search(query).await
    }
}
