//! Error taxonomy for the analysis flow
//!
//! One enum per flow step, wrapped by [`FlowError`] at the controller boundary.
//! Every variant maps to a message that can be shown to the user as-is.

use thiserror::Error;

/// Wallet discovery and connection failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Wallet provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("User declined the connection request for {0}")]
    UserDeclined(String),

    #[error("No addresses found in wallet")]
    NoAddressFound,

    #[error("Unable to retrieve wallet addresses: {0}")]
    AddressLookup(String),

    #[error("Wallet address is not usable on this network: {0}")]
    UnsupportedAddress(String),
}

/// Indexer failures while retrieving history
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Address or transaction not found")]
    NotFound,

    #[error("Invalid indexer API key or daily limit exceeded")]
    Auth,

    #[error("Indexer rate limit exceeded")]
    RateLimited,

    #[error("Invalid address format or bad request: {0}")]
    BadRequest(String),

    #[error("Indexer request failed: {0}")]
    Transport(String),

    #[error("History fetch cancelled")]
    Cancelled,
}

/// Backend analysis failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Analysis backend unreachable: {0}")]
    Unreachable(String),

    #[error("Analysis backend rejected the request: {0}")]
    Rejected(String),

    #[error("Payment not verified by the analysis agent")]
    PaymentRequired,

    #[error("Invalid response from analysis backend: {0}")]
    InvalidResponse(String),
}

/// Payment-gate failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Failed to create payment request: {0}")]
    CreationFailed(String),

    #[error("Payment verification inconclusive: {0}")]
    VerificationInconclusive(String),

    #[error("Payment execution is not supported: {0}")]
    ExecutionUnsupported(String),

    #[error("Invalid payment transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Payment cancelled by user")]
    Cancelled,

    #[error("Payment deadline passed before confirmation")]
    TimedOut,
}

/// Error surfaced at the controller step boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Please connect your wallet first")]
    NoActiveSession,

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl FlowError {
    /// Message shown to the user when a step fails.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Connection(ConnectionError::UserDeclined(name)) => format!(
                "Connection cancelled. Please try again and approve the connection in your {} wallet.",
                name
            ),
            FlowError::Connection(ConnectionError::ProviderUnavailable(name)) => format!(
                "{} wallet not detected. Please ensure it's installed and enabled.",
                name
            ),
            FlowError::Fetch(FetchError::Auth) => {
                "Invalid indexer API key or daily limit exceeded. Please check your configuration."
                    .to_string()
            }
            FlowError::Fetch(FetchError::NotFound) => {
                "Address not found or has no transactions.".to_string()
            }
            FlowError::Fetch(FetchError::RateLimited) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            FlowError::Backend(BackendError::Unreachable(_)) => {
                "Analysis backend is not reachable. Please make sure the backend server is running."
                    .to_string()
            }
            FlowError::Backend(BackendError::Rejected(reason)) => {
                format!("Analysis failed: {}", reason)
            }
            other => other.to_string(),
        }
    }

    /// Cancellation is a user choice, not a failure worth an error banner.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            FlowError::Cancelled
                | FlowError::Fetch(FetchError::Cancelled)
                | FlowError::Payment(PaymentError::Cancelled)
        )
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;
pub type FetchResult<T> = Result<T, FetchError>;
pub type BackendResult<T> = Result<T, BackendError>;
pub type PaymentResult<T> = Result<T, PaymentError>;
pub type FlowResult<T> = Result<T, FlowError>;
