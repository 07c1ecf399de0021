use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

use folioflow_core::WalletSession;

use crate::error::{AppError, AppResult};

/// Last connected wallet, as persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWallet {
    pub name: String,
    pub key: String,
}

impl From<&WalletSession> for StoredWallet {
    fn from(session: &WalletSession) -> Self {
        Self {
            name: session.display_name.clone(),
            key: session.provider_key.clone(),
        }
    }
}

/// Single-record JSON file. Read at startup for logging only; never used to
/// reconnect.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn save(&self, session: &WalletSession) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::SessionState(e.to_string()))?;
        }

        let json = serde_json::to_vec(&StoredWallet::from(session))
            .map_err(|e| AppError::SessionState(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AppError::SessionState(e.to_string()))?;

        tracing::debug!(path = %self.path.display(), "Saved wallet session");
        Ok(())
    }

    pub async fn load(&self) -> AppResult<Option<StoredWallet>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::SessionState(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::SessionState(e.to_string())),
        }
    }

    /// Remove the record; a missing file is not an error.
    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::SessionState(e.to_string())),
        }
    }
}
