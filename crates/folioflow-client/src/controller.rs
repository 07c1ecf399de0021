//! Flow controller
//!
//! Owns the wallet session and the last rendered view, and runs each user
//! step to completion. A failed step leaves both unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use folioflow_core::{
    render_premium, render_with, AnalysisRequest, FlowError, HistoryStats, PremiumView,
    ProviderDescriptor, RenderOptions, ViewModel, WalletSession,
};

use crate::backend::AnalysisBackend;
use crate::error::{AppError, AppResult};
use crate::indexer::HistoryFetcher;
use crate::payment::PaymentGate;
use crate::prompt::{lovelace_to_ada, Decision, Prompt};
use crate::session_store::SessionStore;
use crate::wallet::SessionManager;

/// The view currently on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurrentView {
    Basic(ViewModel),
    Premium(PremiumView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The address has no history; the backend was not called
    NoTransactions,
    Report(ViewModel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PremiumOutcome {
    Premium(PremiumView),
    /// The user chose the free analysis instead
    Basic(AnalysisOutcome),
}

pub struct FlowController {
    wallets: SessionManager,
    fetcher: HistoryFetcher,
    backend: Arc<dyn AnalysisBackend>,
    gate: PaymentGate,
    store: Option<SessionStore>,
    render_options: RenderOptions,
    current_view: Option<CurrentView>,
}

impl FlowController {
    pub fn new(
        wallets: SessionManager,
        fetcher: HistoryFetcher,
        backend: Arc<dyn AnalysisBackend>,
        gate: PaymentGate,
    ) -> Self {
        Self {
            wallets,
            fetcher,
            backend,
            gate,
            store: None,
            render_options: RenderOptions::default(),
            current_view: None,
        }
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn session(&self) -> Option<&WalletSession> {
        self.wallets.current()
    }

    pub fn current_view(&self) -> Option<&CurrentView> {
        self.current_view.as_ref()
    }

    /// Log the wallet remembered from a previous run. Nothing reconnects.
    pub async fn log_previous_session(&self) {
        let Some(store) = &self.store else { return };
        match store.load().await {
            Ok(Some(previous)) => tracing::info!(
                provider = %previous.key,
                name = %previous.name,
                "Previously connected wallet found; connect again to continue"
            ),
            Ok(None) => tracing::debug!("No previous wallet session"),
            Err(e) => tracing::warn!(error = %e, "Could not read previous wallet session"),
        }
    }

    pub fn list_providers(&mut self) -> Vec<ProviderDescriptor> {
        self.wallets.list_available_providers()
    }

    pub async fn connect(&mut self, provider_key: &str) -> AppResult<WalletSession> {
        let session = self
            .wallets
            .connect(provider_key)
            .await
            .map_err(FlowError::from)?
            .clone();

        // The previous view belonged to whichever wallet was connected before
        self.current_view = None;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session).await {
                tracing::warn!(error = %e, "Failed to persist wallet session");
            }
        }
        Ok(session)
    }

    pub async fn disconnect(&mut self) -> Option<WalletSession> {
        let previous = self.wallets.disconnect();
        self.current_view = None;

        if let Some(store) = &self.store {
            if let Err(e) = store.clear().await {
                tracing::warn!(error = %e, "Failed to clear persisted wallet session");
            }
        }
        previous
    }

    /// Fetch history for the connected wallet and run the free analysis.
    pub async fn analyze_basic(&mut self, cancel: &CancellationToken) -> AppResult<AnalysisOutcome> {
        let address = self.wallets.require()?.address.clone();

        let records = self
            .fetcher
            .fetch_history(&address, cancel)
            .await
            .map_err(FlowError::from)?;

        let Some(request) = AnalysisRequest::new(records, address) else {
            tracing::info!("No transactions to analyze, skipping backend");
            return Ok(AnalysisOutcome::NoTransactions);
        };

        let stats = HistoryStats::from_records(request.transactions());
        let result = self
            .backend
            .analyze(&request)
            .await
            .map_err(FlowError::from)?;

        let view = render_with(&result, &self.render_options).with_history(stats);
        self.current_view = Some(CurrentView::Basic(view.clone()));
        Ok(AnalysisOutcome::Report(view))
    }

    /// Offer premium analysis; fall back to the free one when declined.
    pub async fn analyze_premium(
        &mut self,
        prompt: &mut dyn Prompt,
        cancel: &CancellationToken,
    ) -> AppResult<PremiumOutcome> {
        let session = self.wallets.require()?.clone();

        let question = format!(
            "Premium analysis costs {} ADA. Proceed with premium?",
            lovelace_to_ada(self.gate.price())
        );
        if prompt.confirm(&question).await == Decision::Cancel {
            tracing::info!("Premium declined, running basic analysis");
            return Ok(PremiumOutcome::Basic(self.analyze_basic(cancel).await?));
        }

        let confirmed = self
            .gate
            .run(&session, prompt, cancel)
            .await
            .map_err(FlowError::from)?;
        tracing::debug!(states = ?confirmed.history, "Payment gate passed");

        let result = self
            .backend
            .premium_analyze(&confirmed.premium_request(&session.address))
            .await
            .map_err(FlowError::from)?;

        let view = render_premium(&result);
        self.current_view = Some(CurrentView::Premium(view.clone()));
        Ok(PremiumOutcome::Premium(view))
    }

    pub async fn agent_capabilities(&self) -> AppResult<Value> {
        Ok(self
            .backend
            .capabilities()
            .await
            .map_err(FlowError::from)?)
    }

    /// Write the current view as pretty JSON.
    pub async fn export(&self, path: &Path) -> AppResult<PathBuf> {
        let view = self.current_view.as_ref().ok_or(AppError::NothingToExport)?;
        let json =
            serde_json::to_vec_pretty(view).map_err(|e| AppError::Export(e.to_string()))?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| AppError::Export(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), "Exported analysis");
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexerConfig, PaymentConfig};
    use crate::payment::UnsupportedPaymentExecutor;
    use crate::prompt::PaymentAction;
    use crate::testing::{
        analysis_result, payment_config, FakeBackend, FakeIndexer, FakePaymentService, FakeWallet,
        ScriptedPrompt,
    };
    use crate::wallet::{AddressPolicy, ProviderRegistry};
    use folioflow_core::{BackendError, FetchError, OnChainState, PaymentError};

    struct Harness {
        controller: FlowController,
        indexer: Arc<FakeIndexer>,
        backend: Arc<FakeBackend>,
        payments: Arc<FakePaymentService>,
    }

    fn harness(indexer: FakeIndexer, payments: FakePaymentService) -> Harness {
        harness_with(indexer, payments, payment_config())
    }

    fn harness_with(
        indexer: FakeIndexer,
        payments: FakePaymentService,
        payment: PaymentConfig,
    ) -> Harness {
        let mut registry = ProviderRegistry::new();
        registry.register("flint", Arc::new(FakeWallet::change_only("Flint", "addr_test1change")));
        registry.register("nami", Arc::new(FakeWallet::declining("Nami")));
        let wallets = SessionManager::new(
            registry,
            AddressPolicy {
                prefixes: vec!["addr1".into(), "addr_test1".into()],
                max_length: 100,
                placeholder: None,
            },
        );

        let indexer = Arc::new(indexer);
        let backend = Arc::new(FakeBackend::new(analysis_result()));
        let payments = Arc::new(payments);

        let fetcher = HistoryFetcher::new(
            indexer.clone(),
            &IndexerConfig {
                base_url: String::new(),
                project_id: String::new(),
                page_size: 50,
                detail_limit: 20,
                request_delay_ms: 200,
                timeout_seconds: 5,
            },
        );
        let gate = PaymentGate::new(
            payments.clone(),
            Arc::new(UnsupportedPaymentExecutor),
            &payment,
        );

        Harness {
            controller: FlowController::new(wallets, fetcher, backend.clone(), gate),
            indexer,
            backend,
            payments,
        }
    }

    #[tokio::test]
    async fn test_analysis_requires_session() {
        let mut h = harness(FakeIndexer::with_transactions(3), FakePaymentService::with_states(vec![]));
        let err = h.controller.analyze_basic(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Flow(FlowError::NoActiveSession)));
        assert_eq!(h.indexer.detail_calls(), 0);
        assert_eq!(h.backend.analyze_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_address_only_wallet_end_to_end() {
        let mut h = harness(FakeIndexer::with_transactions(3), FakePaymentService::with_states(vec![]));

        let session = h.controller.connect("flint").await.unwrap();
        assert_eq!(session.address, "addr_test1change");

        let outcome = h.controller.analyze_basic(&CancellationToken::new()).await.unwrap();
        let AnalysisOutcome::Report(view) = outcome else {
            panic!("expected a report");
        };
        assert_eq!(view.history.as_ref().map(|s| s.transaction_count), Some(3));
        assert_eq!(h.backend.analyze_calls(), 1);
        assert_eq!(h.backend.last_address().as_deref(), Some("addr_test1change"));
        assert!(matches!(h.controller.current_view(), Some(CurrentView::Basic(_))));
    }

    #[tokio::test]
    async fn test_empty_history_skips_backend() {
        let mut h = harness(FakeIndexer::with_transactions(0), FakePaymentService::with_states(vec![]));
        h.controller.connect("flint").await.unwrap();

        let outcome = h.controller.analyze_basic(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::NoTransactions);
        assert_eq!(h.backend.analyze_calls(), 0);
        assert!(h.controller.current_view().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_keeps_previous_view() {
        let mut h = harness(FakeIndexer::with_transactions(2), FakePaymentService::with_states(vec![]));
        h.controller.connect("flint").await.unwrap();
        h.controller.analyze_basic(&CancellationToken::new()).await.unwrap();
        let before = h.controller.current_view().cloned();

        h.backend.fail_with(BackendError::Rejected("No transactions provided".into()));
        let err = h.controller.analyze_basic(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.report(), "Analysis failed: No transactions provided");
        assert_eq!(h.controller.current_view().cloned(), before);
        assert!(h.controller.session().is_some());
    }

    #[tokio::test]
    async fn test_fetch_error_surfaces() {
        let mut h = harness(
            FakeIndexer::with_transactions(2).list_error(FetchError::Auth),
            FakePaymentService::with_states(vec![]),
        );
        h.controller.connect("flint").await.unwrap();
        let err = h.controller.analyze_basic(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Flow(FlowError::Fetch(FetchError::Auth))));
    }

    #[tokio::test]
    async fn test_declined_connection() {
        let mut h = harness(FakeIndexer::with_transactions(2), FakePaymentService::with_states(vec![]));
        let err = h.controller.connect("nami").await.unwrap_err();
        assert!(err.report().contains("approve the connection in your Nami wallet"));
        assert!(h.controller.session().is_none());
    }

    #[tokio::test]
    async fn test_premium_after_confirmation_calls_agent_once() {
        let mut h = harness(
            FakeIndexer::with_transactions(2),
            FakePaymentService::with_states(vec![
                Ok(OnChainState::Other("PaymentPending".into())),
                Ok(OnChainState::FundsLocked),
            ]),
        );
        h.controller.connect("flint").await.unwrap();

        let mut prompt = ScriptedPrompt::new(
            vec![Decision::Proceed],
            vec![PaymentAction::CheckStatus, PaymentAction::CheckStatus],
        );
        let outcome = h
            .controller
            .analyze_premium(&mut prompt, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, PremiumOutcome::Premium(_)));
        assert_eq!(h.backend.premium_calls(), 1);
        assert_eq!(h.backend.analyze_calls(), 0);
        assert_eq!(h.payments.resolve_calls(), 2);

        let sent = h.backend.last_premium().unwrap();
        assert_eq!(sent.blockchain_identifier, "bc-test-1");
        assert_eq!(Some(sent.input_hash), h.payments.created().map(|c| c.input_hash));
        assert!(matches!(h.controller.current_view(), Some(CurrentView::Premium(_))));
    }

    #[tokio::test]
    async fn test_premium_quotes_configured_price() {
        let mut h = harness_with(
            FakeIndexer::with_transactions(2),
            FakePaymentService::with_states(vec![Ok(OnChainState::FundsLocked)]),
            PaymentConfig {
                price_lovelace: 12_500_000,
                ..payment_config()
            },
        );
        h.controller.connect("flint").await.unwrap();

        let mut prompt = ScriptedPrompt::new(vec![Decision::Proceed], vec![PaymentAction::CheckStatus]);
        h.controller
            .analyze_premium(&mut prompt, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            prompt.questions(),
            ["Premium analysis costs 12.5 ADA. Proceed with premium?"]
        );
        assert_eq!(h.payments.created().unwrap().amount, 12_500_000);
    }

    #[tokio::test]
    async fn test_premium_cancelled_payment_never_calls_agent() {
        let mut h = harness(FakeIndexer::with_transactions(2), FakePaymentService::with_states(vec![]));
        h.controller.connect("flint").await.unwrap();

        let mut prompt = ScriptedPrompt::new(vec![Decision::Proceed], vec![PaymentAction::Cancel]);
        let err = h
            .controller
            .analyze_premium(&mut prompt, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Flow(FlowError::Payment(PaymentError::Cancelled))));
        assert_eq!(h.backend.premium_calls(), 0);
        assert_eq!(h.backend.analyze_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_declined_runs_basic() {
        let mut h = harness(FakeIndexer::with_transactions(2), FakePaymentService::with_states(vec![]));
        h.controller.connect("flint").await.unwrap();

        let mut prompt = ScriptedPrompt::new(vec![Decision::Cancel], vec![]);
        let outcome = h
            .controller
            .analyze_premium(&mut prompt, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, PremiumOutcome::Basic(AnalysisOutcome::Report(_))));
        assert!(h.payments.created().is_none());
        assert_eq!(h.backend.premium_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_and_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(FakeIndexer::with_transactions(2), FakePaymentService::with_states(vec![]));
        let store = SessionStore::new(dir.path().join("session.json"));
        let mut controller = h.controller.with_store(store.clone());

        let path = dir.path().join("report.json");
        assert!(matches!(
            controller.export(&path).await.unwrap_err(),
            AppError::NothingToExport
        ));

        controller.connect("flint").await.unwrap();
        assert!(store.load().await.unwrap().is_some());

        controller.analyze_basic(&CancellationToken::new()).await.unwrap();
        controller.export(&path).await.unwrap();
        let exported: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(exported["kind"], "basic");
        assert!(exported["health_score"].is_u64());

        assert!(controller.disconnect().await.is_some());
        assert!(controller.disconnect().await.is_none());
        assert!(store.load().await.unwrap().is_none());
        assert!(controller.current_view().is_none());
    }
}
