//! Data models shared by every step of the analysis flow
//!
//! Wallet sessions, indexer records, backend request/response shapes and the
//! payment request. Backend responses are produced by a language model and are
//! deserialized leniently: a field of the wrong shape degrades to its default
//! instead of failing the whole result.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Wallet Session
// =============================================================================

/// Optional methods a wallet provider exposes, probed once at discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub used_addresses: bool,
    pub unused_addresses: bool,
    pub change_address: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            used_addresses: true,
            unused_addresses: true,
            change_address: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.used_addresses && !self.unused_addresses && !self.change_address
    }
}

/// A wallet provider found in the host registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    /// Registry key (e.g. "lace", "nami")
    pub key: String,
    /// Human-readable name (e.g. "Lace")
    pub name: String,
    pub capabilities: Capabilities,
}

/// Why the connected wallet's address was replaced by the placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressDegradation {
    /// The wallet returned a long value this client does not decode
    EncodedAddress { length: usize },
    /// The address does not start with a recognized network prefix
    UnrecognizedPrefix { raw: String },
}

/// The single active wallet connection.
///
/// Owned by the flow controller; there is never more than one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSession {
    pub provider_key: String,
    pub display_name: String,
    /// Address used for every history fetch and analysis call
    pub address: String,
    pub session_handle: String,
    pub connected_at: DateTime<Utc>,
    /// Set when `address` is the configured placeholder, not the wallet's own
    pub degradation: Option<AddressDegradation>,
}

impl WalletSession {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

// =============================================================================
// Indexer Records
// =============================================================================

/// Entry of an address transaction listing (newest first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub tx_hash: String,
    #[serde(default)]
    pub tx_index: Option<u32>,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Asset amount in a transaction output (`unit` is "lovelace" for ADA)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAmount {
    pub unit: String,
    pub quantity: String,
}

/// Read-only projection of an indexer transaction.
///
/// Field names match what the analysis backend expects on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    /// Block hash containing the transaction
    pub block: String,
    /// Unix seconds
    pub block_time: i64,
    /// Fee in lovelace, as the indexer's decimal string
    pub fees: String,
    pub size: u64,
    pub output_amount: Vec<OutputAmount>,
    pub slot: u64,
    /// Position of the transaction within its block
    pub index: u32,
}

// =============================================================================
// Analysis Request / Result
// =============================================================================

/// Request body for `POST /analyze`. Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    transactions: Vec<TransactionRecord>,
    wallet_address: String,
}

impl AnalysisRequest {
    /// Returns `None` for an empty history; there is nothing to analyze.
    pub fn new(transactions: Vec<TransactionRecord>, wallet_address: impl Into<String>) -> Option<Self> {
        if transactions.is_empty() {
            return None;
        }
        Some(Self {
            transactions,
            wallet_address: wallet_address.into(),
        })
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn wallet_address(&self) -> &str {
        &self.wallet_address
    }
}

/// Structured insights returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    #[serde(default, deserialize_with = "lenient_text")]
    pub spending_patterns: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub risk_assessment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub recommendations: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tax_considerations: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Summary statistics returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_transactions: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_fees_paid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub transaction_frequency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub account_type_assessment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of the per-category pattern breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternCategory {
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub count: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
}

/// Response of `POST /analyze`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Markdown narrative
    #[serde(default, deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(default, deserialize_with = "object_or_default")]
    pub insights: Insights,
    #[serde(default, deserialize_with = "object_or_default")]
    pub portfolio_summary: PortfolioSummary,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub transaction_analysis: Vec<PatternCategory>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub wallet_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub transactions_analyzed: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ai_service: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
}

// =============================================================================
// Premium Analysis
// =============================================================================

/// Request body for the paid agent endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumRequest {
    pub blockchain_identifier: String,
    pub wallet_address: String,
    pub input_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Response of the paid agent endpoint. `analysis` is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumAnalysis {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result_hash: Option<String>,
    #[serde(default)]
    pub analysis: Value,
    #[serde(default)]
    pub agent: Option<AgentInfo>,
    #[serde(default)]
    pub processed_at: Option<String>,
}

// =============================================================================
// Payment Request
// =============================================================================

/// Escalating deadlines attached to a payment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentDeadlines {
    pub pay_by: DateTime<Utc>,
    pub submit_result_by: DateTime<Utc>,
    pub unlock: DateTime<Utc>,
    pub dispute_unlock: DateTime<Utc>,
}

/// A payment request created for one premium-analysis attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub blockchain_identifier: String,
    /// Content hash of the canonical request payload
    pub input_hash: String,
    /// Required amount in lovelace
    pub amount: u64,
    pub deadlines: PaymentDeadlines,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// The deadline the user must pay by
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadlines.pay_by
    }
}

/// On-chain state reported by the payment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnChainState {
    FundsLocked,
    Other(String),
    Unknown,
}

impl OnChainState {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("FundsLocked") => OnChainState::FundsLocked,
            Some(other) => OnChainState::Other(other.to_string()),
            None => OnChainState::Unknown,
        }
    }

    pub fn is_funds_locked(&self) -> bool {
        matches!(self, OnChainState::FundsLocked)
    }
}

// =============================================================================
// Lenient deserialization helpers
// =============================================================================

/// Flatten an arbitrary JSON value into display text.
pub fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(value_to_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        obj @ Value::Object(_) => Some(obj.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_object() {
        Ok(serde_json::from_value(value).unwrap_or_default())
    } else {
        Ok(T::default())
    }
}

fn list_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
