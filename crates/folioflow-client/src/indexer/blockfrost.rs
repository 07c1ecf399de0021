use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use folioflow_core::{FetchError, FetchResult, TransactionRecord, TransactionRef};

use super::{IndexerApi, UsageMetric};
use crate::config::{key_preview, IndexerConfig};

// ============================================================================
// Blockfrost Client - Address History and Transaction Detail
// ============================================================================

#[derive(Clone)]
pub struct BlockfrostClient {
    client: Client,
    base_url: String,
    project_id: String,
}

impl BlockfrostClient {
    pub fn new(config: &IndexerConfig) -> FetchResult<Self> {
        tracing::info!(
            base_url = %config.base_url,
            project_id = %key_preview(&config.project_id),
            "Creating indexer client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("project_id", &self.project_id)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(path = %path, error = %e, "Indexer request failed");
                FetchError::Transport(format!("Indexer request failed: {}", e))
            })?;

        let response = check_status(response).await?;

        let body = response.json::<T>().await.map_err(|e| {
            tracing::error!(path = %path, error = %e, "Failed to parse indexer response");
            FetchError::Transport(format!("Failed to parse indexer response: {}", e))
        })?;

        tracing::debug!(
            path = %path,
            duration_ms = %start.elapsed().as_millis(),
            "Indexer request complete"
        );

        Ok(body)
    }
}

/// Map indexer HTTP status codes onto [`FetchError`]
async fn check_status(response: Response) -> FetchResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = %status, body = %body, "Indexer API error");
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::FORBIDDEN => FetchError::Auth,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::BAD_REQUEST => FetchError::BadRequest(body),
        other => FetchError::Transport(format!("Indexer API error {}: {}", other, body)),
    }
}

#[async_trait]
impl IndexerApi for BlockfrostClient {
    async fn list_transactions(&self, address: &str, count: u32) -> FetchResult<Vec<TransactionRef>> {
        self.get_json(
            &format!("/addresses/{}/transactions", address),
            &[("count", count.to_string()), ("order", "desc".to_string())],
        )
        .await
    }

    async fn transaction_detail(&self, tx_hash: &str) -> FetchResult<TransactionRecord> {
        self.get_json(&format!("/txs/{}", tx_hash), &[]).await
    }

    async fn usage_metrics(&self) -> FetchResult<Vec<UsageMetric>> {
        self.get_json("/metrics", &[]).await
    }
}
