use std::sync::Arc;

use async_trait::async_trait;
use folioflow_core::{Capabilities, ConnectionError, ConnectionResult};

use super::{known_provider_name, WalletApi, WalletProvider};
use crate::config::WalletAdapterConfig;

/// Watch-only wallet whose addresses come from configuration.
///
/// An address list left unset means the wallet does not expose that method.
pub struct ConfiguredWallet {
    name: String,
    used: Option<Vec<String>>,
    unused: Option<Vec<String>>,
    change: Option<String>,
    decline: bool,
}

impl ConfiguredWallet {
    pub fn new(config: &WalletAdapterConfig) -> Self {
        let name = config
            .name
            .clone()
            .or_else(|| known_provider_name(&config.key).map(String::from))
            .unwrap_or_else(|| config.key.clone());

        Self {
            name,
            used: config.used_addresses.clone(),
            unused: config.unused_addresses.clone(),
            change: config.change_address.clone(),
            decline: config.decline,
        }
    }
}

#[async_trait]
impl WalletProvider for ConfiguredWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            used_addresses: self.used.is_some(),
            unused_addresses: self.unused.is_some(),
            change_address: self.change.is_some(),
        }
    }

    async fn enable(&self) -> ConnectionResult<Arc<dyn WalletApi>> {
        if self.decline {
            return Err(ConnectionError::UserDeclined(self.name.clone()));
        }
        Ok(Arc::new(ConfiguredWalletApi {
            used: self.used.clone().unwrap_or_default(),
            unused: self.unused.clone().unwrap_or_default(),
            change: self.change.clone(),
        }))
    }
}

struct ConfiguredWalletApi {
    used: Vec<String>,
    unused: Vec<String>,
    change: Option<String>,
}

#[async_trait]
impl WalletApi for ConfiguredWalletApi {
    async fn used_addresses(&self) -> ConnectionResult<Vec<String>> {
        Ok(self.used.clone())
    }

    async fn unused_addresses(&self) -> ConnectionResult<Vec<String>> {
        Ok(self.unused.clone())
    }

    async fn change_address(&self) -> ConnectionResult<Option<String>> {
        Ok(self.change.clone())
    }
}
