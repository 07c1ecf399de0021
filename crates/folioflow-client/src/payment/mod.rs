//! Payment-gated premium flow
//!
//! Drives [`PaymentMachine`] through one payment attempt. Premium analysis is
//! requested by the caller only after [`PaymentGate::run`] returns a
//! confirmed payment.

pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use folioflow_core::{
    content_hash, DeadlineSchedule, OnChainState, PaymentDeadlines, PaymentError, PaymentEvent,
    PaymentMachine, PaymentRequest, PaymentResult, PaymentState, PremiumRequest, WalletSession,
};

use crate::config::PaymentConfig;
use crate::prompt::{PaymentAction, Prompt};

/// What the payment service returns for a newly created request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    pub blockchain_identifier: String,
    /// Pay-by time as acknowledged by the service, when it reports one
    pub pay_by: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_payment(
        &self,
        input_hash: &str,
        amount: u64,
        deadlines: &PaymentDeadlines,
    ) -> PaymentResult<CreatedPayment>;

    /// On-chain state for a payment. Transport failures are
    /// [`PaymentError::VerificationInconclusive`].
    async fn resolve(&self, blockchain_identifier: &str) -> PaymentResult<OnChainState>;
}

/// Submits the user's payment for a request
#[async_trait]
pub trait PaymentExecutor: Send + Sync {
    async fn execute(&self, request: &PaymentRequest, session: &WalletSession) -> PaymentResult<()>;
}

/// Executor for hosts that cannot build and sign transactions.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPaymentExecutor;

#[async_trait]
impl PaymentExecutor for UnsupportedPaymentExecutor {
    async fn execute(&self, request: &PaymentRequest, session: &WalletSession) -> PaymentResult<()> {
        tracing::warn!(
            provider = %session.provider_key,
            blockchain_identifier = %request.blockchain_identifier,
            "Payment execution requested but transaction building is unavailable"
        );
        Err(PaymentError::ExecutionUnsupported(
            "this client cannot build payment transactions; pay from your wallet, then check status"
                .to_string(),
        ))
    }
}

/// A payment the service reported as funds-locked
#[derive(Debug, Clone)]
pub struct ConfirmedPayment {
    pub request: PaymentRequest,
    pub history: Vec<PaymentState>,
}

impl ConfirmedPayment {
    /// Premium request carrying the original content hash
    pub fn premium_request(&self, wallet_address: &str) -> PremiumRequest {
        PremiumRequest {
            blockchain_identifier: self.request.blockchain_identifier.clone(),
            wallet_address: wallet_address.to_string(),
            input_hash: self.request.input_hash.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PaymentGate {
    service: Arc<dyn PaymentService>,
    executor: Arc<dyn PaymentExecutor>,
    schedule: DeadlineSchedule,
    price: u64,
}

/// What ended the wait for a user action
enum UserWake {
    Cancelled,
    DeadlinePassed,
    Action(PaymentAction),
}

/// What ended the wait for a status check
enum CheckWake {
    Cancelled,
    DeadlinePassed,
    Resolved(PaymentResult<OnChainState>),
}

impl PaymentGate {
    pub fn new(
        service: Arc<dyn PaymentService>,
        executor: Arc<dyn PaymentExecutor>,
        config: &PaymentConfig,
    ) -> Self {
        Self {
            service,
            executor,
            schedule: DeadlineSchedule::from_secs(
                config.pay_by_seconds,
                config.submit_result_seconds,
                config.unlock_seconds,
                config.dispute_unlock_seconds,
            ),
            price: config.price_lovelace,
        }
    }

    /// Amount in lovelace each payment request asks for
    pub fn price(&self) -> u64 {
        self.price
    }

    /// Run one payment attempt to a terminal state.
    ///
    /// Returns the confirmed payment, or the reason the attempt ended.
    pub async fn run(
        &self,
        session: &WalletSession,
        prompt: &mut dyn Prompt,
        cancel: &CancellationToken,
    ) -> PaymentResult<ConfirmedPayment> {
        let mut machine = PaymentMachine::new();
        let result = self.drive(&mut machine, session, prompt, cancel).await;

        tracing::info!(
            final_state = %machine.state(),
            transitions = %(machine.history().len() - 1),
            "Payment attempt finished"
        );

        result.map(|request| ConfirmedPayment {
            request,
            history: machine.history().to_vec(),
        })
    }

    async fn drive(
        &self,
        machine: &mut PaymentMachine,
        session: &WalletSession,
        prompt: &mut dyn Prompt,
        cancel: &CancellationToken,
    ) -> PaymentResult<PaymentRequest> {
        let created_at = Utc::now();
        let input_hash = content_hash(&session.address, created_at);
        let mut deadlines = self.schedule.deadlines_from(created_at);

        if cancel.is_cancelled() {
            return Err(PaymentError::Cancelled);
        }
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PaymentError::Cancelled),
            created = self.service.create_payment(&input_hash, self.price, &deadlines) => created?,
        };
        if let Some(pay_by) = created.pay_by {
            deadlines.pay_by = pay_by;
        }

        let request = PaymentRequest {
            blockchain_identifier: created.blockchain_identifier,
            input_hash,
            amount: self.price,
            deadlines,
            created_at,
        };
        machine.fire(PaymentEvent::Created)?;
        tracing::info!(
            blockchain_identifier = %request.blockchain_identifier,
            amount = %request.amount,
            pay_by = %request.deadline(),
            "Payment request created"
        );

        machine.fire(PaymentEvent::Presented)?;

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => UserWake::Cancelled,
                _ = sleep_until(request.deadline()) => UserWake::DeadlinePassed,
                action = prompt.payment_action(&request) => UserWake::Action(action),
            };

            match wake {
                UserWake::Cancelled | UserWake::Action(PaymentAction::Cancel) => {
                    machine.fire(PaymentEvent::Cancel)?;
                    return Err(PaymentError::Cancelled);
                }
                UserWake::DeadlinePassed => {
                    machine.fire(PaymentEvent::DeadlinePassed)?;
                    return Err(PaymentError::TimedOut);
                }
                UserWake::Action(PaymentAction::Pay) => {
                    match self.executor.execute(&request, session).await {
                        Ok(()) => prompt.notify("Payment submitted. Check status once it settles."),
                        Err(e) => prompt.notify(&e.to_string()),
                    }
                }
                UserWake::Action(PaymentAction::CheckStatus) => {
                    machine.fire(PaymentEvent::CheckRequested)?;

                    let wake = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => CheckWake::Cancelled,
                        _ = sleep_until(request.deadline()) => CheckWake::DeadlinePassed,
                        state = self.service.resolve(&request.blockchain_identifier) => CheckWake::Resolved(state),
                    };

                    match wake {
                        CheckWake::Resolved(Ok(OnChainState::FundsLocked)) => {
                            machine.fire(PaymentEvent::FundsLocked)?;
                            tracing::info!(
                                blockchain_identifier = %request.blockchain_identifier,
                                "Payment confirmed"
                            );
                            return Ok(request);
                        }
                        CheckWake::Resolved(Ok(state)) => {
                            machine.fire(PaymentEvent::NotConfirmed)?;
                            tracing::info!(state = ?state, "Payment not confirmed yet");
                            prompt.notify("Payment not confirmed yet. Please complete the payment and check again.");
                        }
                        CheckWake::Resolved(Err(e)) => {
                            machine.fire(PaymentEvent::NotConfirmed)?;
                            tracing::warn!(error = %e, "Payment verification inconclusive");
                            prompt.notify(&format!("{}. Treating the payment as not confirmed.", e));
                        }
                        CheckWake::Cancelled => {
                            machine.fire(PaymentEvent::Cancel)?;
                            return Err(PaymentError::Cancelled);
                        }
                        CheckWake::DeadlinePassed => {
                            machine.fire(PaymentEvent::DeadlinePassed)?;
                            return Err(PaymentError::TimedOut);
                        }
                    }
                }
            }
        }
    }
}

/// Sleep until a wall-clock deadline; returns at once when it has passed.
async fn sleep_until(deadline: DateTime<Utc>) {
    let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(remaining).await;
}
