//! Payment-gate state machine
//!
//! Pure pieces of the premium flow: the state/event transition table, the
//! content hash that correlates a payment with its analysis request, and the
//! deadline schedule sent to the payment service.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{PaymentError, PaymentResult};
use crate::models::PaymentDeadlines;

/// Service name embedded in the hashed payload
pub const ANALYSIS_SERVICE_NAME: &str = "portfolio_analysis";

/// Premium analysis price in lovelace (5 ADA)
pub const PREMIUM_ANALYSIS_PRICE: u64 = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentState {
    Idle,
    RequestCreated,
    AwaitingUserPayment,
    Verifying,
    Confirmed,
    Cancelled,
    TimedOut,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Confirmed | PaymentState::Cancelled | PaymentState::TimedOut
        )
    }

    /// Apply an event, rejecting transitions the flow does not allow.
    pub fn apply(self, event: PaymentEvent) -> PaymentResult<PaymentState> {
        use PaymentEvent as E;
        use PaymentState as S;

        let next = match (self, event) {
            (S::Idle, E::Created) => S::RequestCreated,
            (S::RequestCreated, E::Presented) => S::AwaitingUserPayment,
            (S::AwaitingUserPayment, E::CheckRequested) => S::Verifying,
            (S::Verifying, E::FundsLocked) => S::Confirmed,
            (S::Verifying, E::NotConfirmed) => S::AwaitingUserPayment,
            (S::AwaitingUserPayment | S::Verifying, E::DeadlinePassed) => S::TimedOut,
            (state, E::Cancel) if !state.is_terminal() => S::Cancelled,
            (from, event) => {
                return Err(PaymentError::InvalidTransition {
                    from: from.to_string(),
                    event: event.to_string(),
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentState::Idle => "Idle",
            PaymentState::RequestCreated => "RequestCreated",
            PaymentState::AwaitingUserPayment => "AwaitingUserPayment",
            PaymentState::Verifying => "Verifying",
            PaymentState::Confirmed => "Confirmed",
            PaymentState::Cancelled => "Cancelled",
            PaymentState::TimedOut => "TimedOut",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    Created,
    Presented,
    CheckRequested,
    FundsLocked,
    NotConfirmed,
    DeadlinePassed,
    Cancel,
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Tracks the current state and every state visited.
#[derive(Debug, Clone)]
pub struct PaymentMachine {
    state: PaymentState,
    history: Vec<PaymentState>,
}

impl Default for PaymentMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentMachine {
    pub fn new() -> Self {
        Self {
            state: PaymentState::Idle,
            history: vec![PaymentState::Idle],
        }
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn history(&self) -> &[PaymentState] {
        &self.history
    }

    pub fn fire(&mut self, event: PaymentEvent) -> PaymentResult<PaymentState> {
        let next = self.state.apply(event)?;
        self.state = next;
        self.history.push(next);
        Ok(next)
    }
}

/// Canonical payload hashed into the payment's `inputHash`.
///
/// Field order is fixed by the struct, so serialization is deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct HashedPayload<'a> {
    pub wallet_address: &'a str,
    pub service: &'a str,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// SHA-256 hex digest of the canonical JSON payload
pub fn content_hash(wallet_address: &str, requested_at: DateTime<Utc>) -> String {
    let payload = HashedPayload {
        wallet_address,
        service: ANALYSIS_SERVICE_NAME,
        timestamp: requested_at.timestamp_millis(),
    };
    // Serializing a struct of strings and an integer cannot fail
    let canonical = serde_json::to_string(&payload).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Offsets applied to the creation time for each deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineSchedule {
    pub pay_by: Duration,
    pub submit_result: Duration,
    pub unlock: Duration,
    pub dispute_unlock: Duration,
}

impl Default for DeadlineSchedule {
    fn default() -> Self {
        Self {
            pay_by: Duration::hours(1),
            submit_result: Duration::hours(2),
            unlock: Duration::hours(3),
            dispute_unlock: Duration::hours(24),
        }
    }
}

impl DeadlineSchedule {
    pub fn from_secs(pay_by: i64, submit_result: i64, unlock: i64, dispute_unlock: i64) -> Self {
        Self {
            pay_by: Duration::seconds(pay_by),
            submit_result: Duration::seconds(submit_result),
            unlock: Duration::seconds(unlock),
            dispute_unlock: Duration::seconds(dispute_unlock),
        }
    }

    pub fn deadlines_from(&self, created_at: DateTime<Utc>) -> PaymentDeadlines {
        PaymentDeadlines {
            pay_by: created_at + self.pay_by,
            submit_result_by: created_at + self.submit_result,
            unlock: created_at + self.unlock,
            dispute_unlock: created_at + self.dispute_unlock,
        }
    }
}
