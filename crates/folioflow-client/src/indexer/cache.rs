use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use folioflow_core::TransactionRecord;

use crate::config::CacheConfig;

/// Complete transaction histories keyed by wallet address
#[derive(Clone)]
pub struct HistoryCache {
    cache: Cache<String, Arc<Vec<TransactionRecord>>>,
}

impl HistoryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity, Duration::from_secs(config.ttl_seconds))
    }

    pub async fn get(&self, address: &str) -> Option<Vec<TransactionRecord>> {
        self.cache
            .get(address)
            .await
            .map(|records| records.as_ref().clone())
    }

    pub async fn insert(&self, address: &str, records: Vec<TransactionRecord>) {
        self.cache
            .insert(address.to_string(), Arc::new(records))
            .await;
    }
}
