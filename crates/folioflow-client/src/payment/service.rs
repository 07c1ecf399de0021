use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use folioflow_core::{OnChainState, PaymentDeadlines, PaymentError, PaymentResult};

use super::{CreatedPayment, PaymentService};
use crate::config::{key_preview, PaymentConfig};

// ============================================================================
// Payment Service Client - Escrowed Agent Payments
// ============================================================================

#[derive(Clone)]
pub struct PaymentServiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    network: String,
    agent_identifier: String,
}

#[derive(Debug, Serialize)]
struct RequestedFunds {
    amount: String,
    unit: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody<'a> {
    input_hash: &'a str,
    network: &'a str,
    agent_identifier: &'a str,
    #[serde(rename = "RequestedFunds")]
    requested_funds: Vec<RequestedFunds>,
    pay_by_time: DateTime<Utc>,
    submit_result_time: DateTime<Utc>,
    unlock_time: DateTime<Utc>,
    external_dispute_unlock_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveBody<'a> {
    blockchain_identifier: &'a str,
    network: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedData {
    blockchain_identifier: String,
    #[serde(default)]
    pay_by_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedData {
    #[serde(default)]
    on_chain_state: Option<String>,
}

impl PaymentServiceClient {
    pub fn new(config: &PaymentConfig) -> PaymentResult<Self> {
        tracing::info!(
            base_url = %config.base_url,
            network = %config.network,
            api_key = %key_preview(&config.api_key),
            "Creating payment service client"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PaymentError::CreationFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            network: config.network.clone(),
            agent_identifier: config.agent_identifier.clone(),
        })
    }

    fn create_body<'a>(
        &'a self,
        input_hash: &'a str,
        amount: u64,
        deadlines: &PaymentDeadlines,
    ) -> CreatePaymentBody<'a> {
        CreatePaymentBody {
            input_hash,
            network: &self.network,
            agent_identifier: &self.agent_identifier,
            requested_funds: vec![RequestedFunds {
                amount: amount.to_string(),
                unit: String::new(),
            }],
            pay_by_time: deadlines.pay_by,
            submit_result_time: deadlines.submit_result_by,
            unlock_time: deadlines.unlock,
            external_dispute_unlock_time: deadlines.dispute_unlock,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl PaymentService for PaymentServiceClient {
    async fn create_payment(
        &self,
        input_hash: &str,
        amount: u64,
        deadlines: &PaymentDeadlines,
    ) -> PaymentResult<CreatedPayment> {
        let response = self
            .client
            .post(format!("{}/api/v1/payment/", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.create_body(input_hash, amount, deadlines))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Payment request creation failed");
                PaymentError::CreationFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Payment service rejected request");
            return Err(PaymentError::CreationFailed(format!(
                "payment service error {}",
                status
            )));
        }

        let envelope: Envelope<CreatedData> = response
            .json()
            .await
            .map_err(|e| PaymentError::CreationFailed(format!("invalid response: {}", e)))?;

        Ok(CreatedPayment {
            pay_by: envelope.data.pay_by_time.as_deref().and_then(parse_timestamp),
            blockchain_identifier: envelope.data.blockchain_identifier,
        })
    }

    async fn resolve(&self, blockchain_identifier: &str) -> PaymentResult<OnChainState> {
        let response = self
            .client
            .post(format!(
                "{}/api/v1/payment/resolve-blockchain-identifier",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .json(&ResolveBody {
                blockchain_identifier,
                network: &self.network,
            })
            .send()
            .await
            .map_err(|e| PaymentError::VerificationInconclusive(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::VerificationInconclusive(format!(
                "payment service error {}",
                response.status()
            )));
        }

        let envelope: Envelope<ResolvedData> = response
            .json()
            .await
            .map_err(|e| PaymentError::VerificationInconclusive(format!("invalid response: {}", e)))?;

        let state = OnChainState::parse(envelope.data.on_chain_state.as_deref());
        tracing::debug!(blockchain_identifier = %blockchain_identifier, state = ?state, "Resolved payment state");
        Ok(state)
    }
}
