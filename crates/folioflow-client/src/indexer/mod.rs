//! History Fetcher
//!
//! Lists an address's most recent transactions from the chain indexer, then
//! fetches each one's detail sequentially with a fixed delay between calls.

pub mod blockfrost;
pub mod cache;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use folioflow_core::{FetchError, FetchResult, TransactionRecord, TransactionRef};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use cache::HistoryCache;

/// Daily indexer call count above which a usage warning is logged
pub const USAGE_WARNING_THRESHOLD: u64 = 90_000;

/// One bucket of the indexer's usage metrics
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UsageMetric {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub calls: u64,
}

/// Chain indexer operations used by the fetcher
#[async_trait]
pub trait IndexerApi: Send + Sync {
    /// Transaction references for an address, newest first
    async fn list_transactions(&self, address: &str, count: u32) -> FetchResult<Vec<TransactionRef>>;

    async fn transaction_detail(&self, tx_hash: &str) -> FetchResult<TransactionRecord>;

    /// Usage buckets, oldest first
    async fn usage_metrics(&self) -> FetchResult<Vec<UsageMetric>>;
}

#[derive(Clone)]
pub struct HistoryFetcher {
    api: Arc<dyn IndexerApi>,
    cache: Option<HistoryCache>,
    page_size: u32,
    detail_limit: usize,
    request_delay: Duration,
}

impl HistoryFetcher {
    pub fn new(api: Arc<dyn IndexerApi>, config: &IndexerConfig) -> Self {
        Self {
            api,
            cache: None,
            page_size: config.page_size,
            detail_limit: config.detail_limit,
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    pub fn with_cache(mut self, cache: HistoryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetch up to `detail_limit` transaction records for `address`, newest first.
    ///
    /// Individual detail failures are skipped. A 429 during the detail loop ends
    /// it early with the records gathered so far. The call fails when the list
    /// call fails or the detail loop gathered nothing.
    pub async fn fetch_history(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<Vec<TransactionRecord>> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        if let Some(cache) = &self.cache {
            if let Some(records) = cache.get(address).await {
                tracing::debug!(wallet = %address, count = %records.len(), "History cache hit");
                return Ok(records);
            }
        }

        let start = Instant::now();
        self.check_usage().await;

        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            listed = self.api.list_transactions(address, self.page_size) => listed,
        };
        let refs = match listed {
            Ok(refs) => refs,
            Err(FetchError::NotFound) => {
                tracing::info!(wallet = %address, "Address not found on indexer, treating as empty history");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(wallet = %address, error = %e, "Failed to list transactions");
                return Err(e);
            }
        };

        if refs.is_empty() {
            tracing::info!(wallet = %address, "No transactions found");
            return Ok(Vec::new());
        }

        tracing::info!(
            wallet = %address,
            listed = %refs.len(),
            limit = %self.detail_limit,
            "Fetching transaction details"
        );

        let mut records = Vec::new();
        let mut last_error: Option<FetchError> = None;
        let mut rate_limited = false;

        for (i, tx_ref) in refs.iter().take(self.detail_limit).enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(wallet = %address, fetched = %records.len(), "History fetch cancelled");
                        return Err(FetchError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.request_delay) => {}
                }
            } else if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let detail = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(wallet = %address, fetched = %records.len(), "History fetch cancelled");
                    return Err(FetchError::Cancelled);
                }
                detail = self.api.transaction_detail(&tx_ref.tx_hash) => detail,
            };

            match detail {
                Ok(record) => records.push(record),
                Err(FetchError::RateLimited) => {
                    tracing::warn!(
                        tx = %tx_ref.tx_hash,
                        fetched = %records.len(),
                        "Rate limited during detail fetch, returning partial history"
                    );
                    rate_limited = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(tx = %tx_ref.tx_hash, error = %e, "Skipping transaction detail");
                    last_error = Some(e);
                }
            }
        }

        if records.is_empty() {
            let err = if rate_limited {
                FetchError::RateLimited
            } else {
                last_error.unwrap_or_else(|| FetchError::Transport("no transaction details fetched".to_string()))
            };
            tracing::error!(wallet = %address, error = %err, "Every transaction detail fetch failed");
            return Err(err);
        }

        let complete = !rate_limited && last_error.is_none();
        if complete {
            if let Some(cache) = &self.cache {
                cache.insert(address, records.clone()).await;
            }
        }

        tracing::info!(
            wallet = %address,
            count = %records.len(),
            partial = %!complete,
            duration_ms = %start.elapsed().as_millis(),
            "Fetched transaction history"
        );

        Ok(records)
    }

    /// Warn when today's indexer usage is close to the daily quota.
    async fn check_usage(&self) {
        match self.api.usage_metrics().await {
            Ok(metrics) => {
                let (day, today) = metrics.last().map(|m| (m.time, m.calls)).unwrap_or_default();
                if today > USAGE_WARNING_THRESHOLD {
                    tracing::warn!(day = %day, calls = %today, "Indexer usage is close to the daily limit");
                } else {
                    tracing::debug!(day = %day, calls = %today, "Indexer usage today");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Could not fetch indexer usage metrics"),
        }
    }
}
