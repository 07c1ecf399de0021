//! Analysis Submitter
//!
//! One request per analysis, no retry. The premium agent shares the same
//! client and error mapping.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use folioflow_core::{
    AnalysisRequest, AnalysisResult, BackendError, BackendResult, PremiumAnalysis, PremiumRequest,
};

use crate::config::BackendConfig;

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> BackendResult<AnalysisResult>;

    async fn premium_analyze(&self, request: &PremiumRequest) -> BackendResult<PremiumAnalysis>;

    /// Informational description of the premium agent
    async fn capabilities(&self) -> BackendResult<Value>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    agent_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        tracing::info!(
            base_url = %config.base_url,
            agent_url = %config.agent_url,
            "Creating analysis backend client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Unreachable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent_url: config.agent_url.trim_end_matches('/').to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| BackendError::InvalidResponse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(rejection(status, &body))
    }
}

/// Non-2xx response to error, preferring the backend's own `error` field
fn rejection(status: StatusCode, body: &str) -> BackendError {
    if status == StatusCode::PAYMENT_REQUIRED {
        return BackendError::PaymentRequired;
    }

    let reason = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("Backend error: {}", status.as_u16()));
    BackendError::Rejected(reason)
}

fn unreachable(e: reqwest::Error) -> BackendError {
    tracing::error!(error = %e, "Analysis backend request failed");
    BackendError::Unreachable(e.to_string())
}

#[async_trait]
impl AnalysisBackend for BackendClient {
    async fn analyze(&self, request: &AnalysisRequest) -> BackendResult<AnalysisResult> {
        let start = Instant::now();
        tracing::info!(
            wallet = %request.wallet_address(),
            count = %request.transactions().len(),
            "Submitting transactions for analysis"
        );

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(unreachable)?;

        let result: AnalysisResult = Self::decode(response).await.map_err(|e| {
            tracing::error!(error = %e, "Analysis request failed");
            e
        })?;

        tracing::info!(
            status = ?result.status,
            duration_ms = %start.elapsed().as_millis(),
            "Analysis complete"
        );
        Ok(result)
    }

    async fn premium_analyze(&self, request: &PremiumRequest) -> BackendResult<PremiumAnalysis> {
        let start = Instant::now();
        tracing::info!(
            wallet = %request.wallet_address,
            blockchain_identifier = %request.blockchain_identifier,
            "Requesting premium analysis"
        );

        let response = self
            .client
            .post(format!("{}/analyze", self.agent_url))
            .json(request)
            .send()
            .await
            .map_err(unreachable)?;

        let result: PremiumAnalysis = Self::decode(response).await?;

        tracing::info!(
            status = %result.status,
            duration_ms = %start.elapsed().as_millis(),
            "Premium analysis complete"
        );
        Ok(result)
    }

    async fn capabilities(&self) -> BackendResult<Value> {
        let response = self
            .client
            .get(format!("{}/capabilities", self.agent_url))
            .send()
            .await
            .map_err(unreachable)?;

        Self::decode(response).await
    }
}
