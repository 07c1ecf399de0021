//! In-memory fakes for the collaborator traits

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use folioflow_core::{
    AnalysisRequest, AnalysisResult, BackendError, BackendResult, Capabilities, ConnectionError,
    ConnectionResult, FetchError, FetchResult, Insights, OnChainState, OutputAmount,
    PatternCategory, PaymentDeadlines, PaymentError, PaymentRequest, PaymentResult,
    PortfolioSummary, PremiumAnalysis, PremiumRequest, TransactionRecord, TransactionRef,
    WalletSession,
};

use crate::backend::AnalysisBackend;
use crate::config::PaymentConfig;
use crate::indexer::{IndexerApi, UsageMetric};
use crate::payment::{CreatedPayment, PaymentService};
use crate::prompt::{Decision, PaymentAction, Prompt};
use crate::wallet::{WalletApi, WalletProvider};

// ============================================================================
// Wallets
// ============================================================================

pub struct FakeWalletApi {
    used: Vec<String>,
    unused: Vec<String>,
    change: Option<String>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeWalletApi {
    pub fn new(used: Vec<String>, unused: Vec<String>, change: Option<String>) -> Self {
        Self {
            used,
            unused,
            change,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WalletApi for FakeWalletApi {
    async fn used_addresses(&self) -> ConnectionResult<Vec<String>> {
        self.record("used");
        Ok(self.used.clone())
    }

    async fn unused_addresses(&self) -> ConnectionResult<Vec<String>> {
        self.record("unused");
        Ok(self.unused.clone())
    }

    async fn change_address(&self) -> ConnectionResult<Option<String>> {
        self.record("change");
        Ok(self.change.clone())
    }
}

pub struct FakeWallet {
    name: String,
    capabilities: Capabilities,
    change: Option<String>,
    decline: bool,
}

impl FakeWallet {
    /// Exposes only the change-address method
    pub fn change_only(name: &str, change: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities {
                used_addresses: false,
                unused_addresses: false,
                change_address: true,
            },
            change: Some(change.to_string()),
            decline: false,
        }
    }

    pub fn declining(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: Capabilities::all(),
            change: None,
            decline: true,
        }
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn enable(&self) -> ConnectionResult<Arc<dyn WalletApi>> {
        if self.decline {
            return Err(ConnectionError::UserDeclined(self.name.clone()));
        }
        Ok(Arc::new(FakeWalletApi::new(
            Vec::new(),
            Vec::new(),
            self.change.clone(),
        )))
    }
}

pub fn session(address: &str) -> WalletSession {
    WalletSession {
        provider_key: "lace".to_string(),
        display_name: "Lace".to_string(),
        address: address.to_string(),
        session_handle: "session-1".to_string(),
        connected_at: Utc::now(),
        degradation: None,
    }
}

// ============================================================================
// Indexer
// ============================================================================

pub fn record(i: usize) -> TransactionRecord {
    TransactionRecord {
        hash: format!("tx{}", i),
        block: format!("block{}", i),
        block_time: 1_700_000_000 - (i as i64) * 3_600,
        fees: "200000".to_string(),
        size: 300,
        output_amount: vec![OutputAmount {
            unit: "lovelace".to_string(),
            quantity: "1500000".to_string(),
        }],
        slot: 50_000_000 - i as u64,
        index: 0,
    }
}

/// Indexer with `n` transactions, newest first (`tx0` is the newest).
pub struct FakeIndexer {
    count: usize,
    list_error: Option<FetchError>,
    rate_limit_at: Option<usize>,
    failing: HashSet<String>,
    detail_latency: Option<Duration>,
    detail_calls: AtomicUsize,
    listed_count: Mutex<Option<u32>>,
}

impl FakeIndexer {
    pub fn with_transactions(count: usize) -> Self {
        Self {
            count,
            list_error: None,
            rate_limit_at: None,
            failing: HashSet::new(),
            detail_latency: None,
            detail_calls: AtomicUsize::new(0),
            listed_count: Mutex::new(None),
        }
    }

    /// The `n`th detail call (1-based, over the fake's lifetime) returns 429.
    pub fn rate_limit_at(mut self, n: usize) -> Self {
        self.rate_limit_at = Some(n);
        self
    }

    pub fn fail_detail(mut self, hash: &str) -> Self {
        self.failing.insert(hash.to_string());
        self
    }

    /// Each detail request takes this long to answer.
    pub fn detail_latency(mut self, latency: Duration) -> Self {
        self.detail_latency = Some(latency);
        self
    }

    pub fn list_error(mut self, err: FetchError) -> Self {
        self.list_error = Some(err);
        self
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn listed_count(&self) -> Option<u32> {
        *self.listed_count.lock().unwrap()
    }
}

#[async_trait]
impl IndexerApi for FakeIndexer {
    async fn list_transactions(&self, _address: &str, count: u32) -> FetchResult<Vec<TransactionRef>> {
        *self.listed_count.lock().unwrap() = Some(count);
        if let Some(err) = &self.list_error {
            return Err(err.clone());
        }
        Ok((0..self.count.min(count as usize))
            .map(|i| TransactionRef {
                tx_hash: format!("tx{}", i),
                tx_index: Some(0),
                block_height: Some(1_000_000 - i as u64),
                block_time: Some(1_700_000_000 - (i as i64) * 3_600),
            })
            .collect())
    }

    async fn transaction_detail(&self, tx_hash: &str) -> FetchResult<TransactionRecord> {
        let call = self.detail_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(latency) = self.detail_latency {
            tokio::time::sleep(latency).await;
        }
        if self.rate_limit_at == Some(call) {
            return Err(FetchError::RateLimited);
        }
        if self.failing.contains(tx_hash) {
            return Err(FetchError::Transport("connection reset".to_string()));
        }
        let index: usize = tx_hash
            .trim_start_matches("tx")
            .parse()
            .map_err(|_| FetchError::NotFound)?;
        Ok(record(index))
    }

    async fn usage_metrics(&self) -> FetchResult<Vec<UsageMetric>> {
        Ok(vec![UsageMetric {
            time: 1_700_000_000,
            calls: 120,
        }])
    }
}

// ============================================================================
// Backend
// ============================================================================

pub fn analysis_result() -> AnalysisResult {
    AnalysisResult {
        analysis: Some(
            "# Overview\nMostly small transfers between two wallets.\n# Outlook\nStable.".to_string(),
        ),
        insights: Insights {
            spending_patterns: Some(
                "Regular small transfers with occasional larger deposits from an exchange."
                    .to_string(),
            ),
            risk_assessment: Some("Low risk profile".to_string()),
            ..Default::default()
        },
        portfolio_summary: PortfolioSummary {
            total_transactions: Some("3".to_string()),
            transaction_frequency: Some("Frequent daily activity".to_string()),
            ..Default::default()
        },
        transaction_analysis: vec![PatternCategory {
            category: Some("Small transfers".to_string()),
            count: Some("3".to_string()),
            total_value: Some("4.5 ADA".to_string()),
            description: None,
        }],
        wallet_address: Some("addr_test1change".to_string()),
        transactions_analyzed: Some(3),
        ai_service: Some("Claude".to_string()),
        status: Some("ai_analysis_complete".to_string()),
        timestamp: Some("2025-01-01T00:00:00Z".to_string()),
    }
}

pub struct FakeBackend {
    result: AnalysisResult,
    failure: Mutex<Option<BackendError>>,
    analyze_calls: AtomicUsize,
    premium_calls: AtomicUsize,
    last_address: Mutex<Option<String>>,
    last_premium: Mutex<Option<PremiumRequest>>,
}

impl FakeBackend {
    pub fn new(result: AnalysisResult) -> Self {
        Self {
            result,
            failure: Mutex::new(None),
            analyze_calls: AtomicUsize::new(0),
            premium_calls: AtomicUsize::new(0),
            last_address: Mutex::new(None),
            last_premium: Mutex::new(None),
        }
    }

    pub fn fail_with(&self, err: BackendError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn premium_calls(&self) -> usize {
        self.premium_calls.load(Ordering::SeqCst)
    }

    pub fn last_address(&self) -> Option<String> {
        self.last_address.lock().unwrap().clone()
    }

    pub fn last_premium(&self) -> Option<PremiumRequest> {
        self.last_premium.lock().unwrap().clone()
    }

    fn failure(&self) -> Option<BackendError> {
        self.failure.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> BackendResult<AnalysisResult> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_address.lock().unwrap() = Some(request.wallet_address().to_string());
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(self.result.clone()),
        }
    }

    async fn premium_analyze(&self, request: &PremiumRequest) -> BackendResult<PremiumAnalysis> {
        self.premium_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_premium.lock().unwrap() = Some(request.clone());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(PremiumAnalysis {
            status: "completed".to_string(),
            result_hash: Some("f00d".to_string()),
            analysis: json!({"portfolio_health": {"score": 82}}),
            agent: None,
            processed_at: None,
        })
    }

    async fn capabilities(&self) -> BackendResult<Value> {
        Ok(json!({"name": "fake-agent"}))
    }
}

// ============================================================================
// Payments
// ============================================================================

pub fn payment_config() -> PaymentConfig {
    PaymentConfig {
        base_url: "http://payments.test".to_string(),
        api_key: String::new(),
        network: "Preprod".to_string(),
        agent_identifier: "agent-test".to_string(),
        price_lovelace: 5_000_000,
        pay_by_seconds: 3_600,
        submit_result_seconds: 7_200,
        unlock_seconds: 10_800,
        dispute_unlock_seconds: 86_400,
        timeout_seconds: 5,
    }
}

#[derive(Debug, Clone)]
pub struct CreatedRecord {
    pub input_hash: String,
    pub amount: u64,
}

pub struct FakePaymentService {
    states: Mutex<Vec<PaymentResult<OnChainState>>>,
    fail_creation: bool,
    created: Mutex<Option<CreatedRecord>>,
    resolve_calls: AtomicUsize,
}

impl FakePaymentService {
    /// Verification answers are returned in order; once exhausted the
    /// payment stays pending.
    pub fn with_states(states: Vec<PaymentResult<OnChainState>>) -> Self {
        Self {
            states: Mutex::new(states.into_iter().rev().collect()),
            fail_creation: false,
            created: Mutex::new(None),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_creation() -> Self {
        Self {
            fail_creation: true,
            ..Self::with_states(Vec::new())
        }
    }

    pub fn created(&self) -> Option<CreatedRecord> {
        self.created.lock().unwrap().clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentService for FakePaymentService {
    async fn create_payment(
        &self,
        input_hash: &str,
        amount: u64,
        _deadlines: &PaymentDeadlines,
    ) -> PaymentResult<CreatedPayment> {
        if self.fail_creation {
            return Err(PaymentError::CreationFailed("payment service error 500".to_string()));
        }
        *self.created.lock().unwrap() = Some(CreatedRecord {
            input_hash: input_hash.to_string(),
            amount,
        });
        Ok(CreatedPayment {
            blockchain_identifier: "bc-test-1".to_string(),
            pay_by: None,
        })
    }

    async fn resolve(&self, _blockchain_identifier: &str) -> PaymentResult<OnChainState> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.states
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(OnChainState::Other("PaymentPending".to_string())))
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// Answers prompts from a script. Once the payment script runs out the
/// prompt never answers again.
pub struct ScriptedPrompt {
    decisions: Vec<Decision>,
    actions: Vec<PaymentAction>,
    actions_taken: usize,
    questions: Vec<String>,
    notifications: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(decisions: Vec<Decision>, actions: Vec<PaymentAction>) -> Self {
        Self {
            decisions: decisions.into_iter().rev().collect(),
            actions: actions.into_iter().rev().collect(),
            actions_taken: 0,
            questions: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn payment(actions: Vec<PaymentAction>) -> Self {
        Self::new(Vec::new(), actions)
    }

    /// Confirmation questions asked so far
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    pub fn actions_taken(&self) -> usize {
        self.actions_taken
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn confirm(&mut self, message: &str) -> Decision {
        self.questions.push(message.to_string());
        self.decisions.pop().unwrap_or(Decision::Proceed)
    }

    async fn payment_action(&mut self, _request: &PaymentRequest) -> PaymentAction {
        match self.actions.pop() {
            Some(action) => {
                self.actions_taken += 1;
                action
            }
            None => std::future::pending().await,
        }
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }
}
