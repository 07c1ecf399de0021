use folioflow_core::FlowError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Nothing to export: run an analysis first")]
    NothingToExport,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AppError {
    /// Stable code used in structured logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Flow(FlowError::NoActiveSession) => "NO_ACTIVE_SESSION",
            AppError::Flow(FlowError::Cancelled) => "CANCELLED",
            AppError::Flow(FlowError::Connection(_)) => "CONNECTION_ERROR",
            AppError::Flow(FlowError::Fetch(_)) => "FETCH_ERROR",
            AppError::Flow(FlowError::Backend(_)) => "BACKEND_ERROR",
            AppError::Flow(FlowError::Payment(_)) => "PAYMENT_ERROR",
            AppError::SessionState(_) => "SESSION_STATE_ERROR",
            AppError::Export(_) | AppError::NothingToExport => "EXPORT_ERROR",
            AppError::UnknownCommand(_) | AppError::InvalidArgument(_) => "INVALID_COMMAND",
        }
    }

    /// Message printed to the user; logs the failure at a level matching its cause.
    pub fn report(&self) -> String {
        match self {
            AppError::Flow(e) if e.is_cancellation() => {
                tracing::info!(error_code = self.code(), "Step cancelled by user");
            }
            AppError::Flow(FlowError::NoActiveSession)
            | AppError::UnknownCommand(_)
            | AppError::InvalidArgument(_)
            | AppError::NothingToExport => {
                tracing::warn!(error_code = self.code(), error = %self, "Rejected command");
            }
            _ => {
                tracing::error!(error_code = self.code(), error = %self, "Step failed");
            }
        }

        match self {
            AppError::Flow(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
