use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use folioflow_core::PREMIUM_ANALYSIS_PRICE;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub indexer: IndexerConfig,
    pub backend: BackendConfig,
    pub payment: PaymentConfig,
    pub wallet: WalletConfig,
    pub session: SessionConfig,
    pub render: RenderConfig,
    pub cache: CacheConfig,
    /// Wallet adapters available to this host, keyed by provider id
    #[serde(default)]
    pub wallets: Vec<WalletAdapterConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    pub base_url: String,
    pub project_id: String,
    pub page_size: u32,
    pub detail_limit: usize,
    pub request_delay_ms: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub agent_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub api_key: String,
    pub network: String,
    pub agent_identifier: String,
    pub price_lovelace: u64,
    pub pay_by_seconds: i64,
    pub submit_result_seconds: i64,
    pub unlock_seconds: i64,
    pub dispute_unlock_seconds: i64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// Substituted when the wallet's address cannot be used; empty disables substitution
    #[serde(default)]
    pub placeholder_address: Option<String>,
    pub address_prefixes: Vec<String>,
    pub max_address_length: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub state_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    pub truncate_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub ttl_seconds: u64,
}

/// A watch-only wallet declared in configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalletAdapterConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub used_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub unused_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub change_address: Option<String>,
    /// Simulates a user rejecting the connection prompt
    #[serde(default)]
    pub decline: bool,
}

pub const DEFAULT_PLACEHOLDER_ADDRESS: &str = "addr_test1qpw0djgj0x59ngrjvqthn7enhvruxnsavsw5th63la3mjel3tkc974sr23jmlzgq5zda4gtv8k9cy38756r9y3qgmkqqjz6aa7";

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("indexer.base_url", "https://cardano-preview.blockfrost.io/api/v0")?
            .set_default("indexer.project_id", "")?
            .set_default("indexer.page_size", 50)?
            .set_default("indexer.detail_limit", 20)?
            .set_default("indexer.request_delay_ms", 200)?
            .set_default("indexer.timeout_seconds", 30)?
            .set_default("backend.base_url", "http://localhost:5000")?
            .set_default("backend.agent_url", "http://localhost:5000/agent")?
            .set_default("backend.timeout_seconds", 120)?
            .set_default("payment.base_url", "http://localhost:3001")?
            .set_default("payment.api_key", "")?
            .set_default("payment.network", "Preprod")?
            .set_default("payment.agent_identifier", "folioflow-portfolio-analyzer")?
            .set_default("payment.price_lovelace", PREMIUM_ANALYSIS_PRICE as i64)?
            .set_default("payment.pay_by_seconds", 3_600)?
            .set_default("payment.submit_result_seconds", 7_200)?
            .set_default("payment.unlock_seconds", 10_800)?
            .set_default("payment.dispute_unlock_seconds", 86_400)?
            .set_default("payment.timeout_seconds", 30)?
            .set_default("wallet.placeholder_address", DEFAULT_PLACEHOLDER_ADDRESS)?
            .set_default("wallet.address_prefixes", vec!["addr1", "addr_test1"])?
            .set_default("wallet.max_address_length", 100)?
            .set_default("session.state_path", ".folioflow/session.json")?
            .set_default("render.truncate_chars", 150)?
            .set_default("cache.max_capacity", 100)?
            .set_default("cache.ttl_seconds", 300)?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (FOLIOFLOW__INDEXER__PROJECT_ID, etc.)
            .add_source(
                Environment::with_prefix("FOLIOFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Placeholder address, or `None` when substitution is disabled
    pub fn placeholder_address(&self) -> Option<&str> {
        self.wallet
            .placeholder_address
            .as_deref()
            .filter(|addr| !addr.trim().is_empty())
    }
}

/// Mask a secret for logging: first and last four characters only.
pub fn key_preview(key: &str) -> String {
    if key.is_empty() {
        "EMPTY".to_string()
    } else if key.len() > 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***".to_string()
    }
}
