//! Wallet Session Manager
//!
//! Discovers wallet providers in the host registry, connects to one, and
//! resolves the address every later step analyzes.

pub mod configured;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use folioflow_core::{
    AddressDegradation, Capabilities, ConnectionError, ConnectionResult, FlowError, FlowResult,
    ProviderDescriptor, WalletSession,
};
use uuid::Uuid;

use crate::config::AppConfig;

/// Provider keys the client knows by name, in display order
pub const KNOWN_PROVIDERS: &[(&str, &str)] = &[
    ("lace", "Lace"),
    ("nami", "Nami"),
    ("eternl", "Eternl"),
    ("flint", "Flint"),
    ("typhoncip30", "Typhon"),
    ("gerowallet", "GeroWallet"),
    ("ccvault", "CCVault"),
];

pub fn known_provider_name(key: &str) -> Option<&'static str> {
    KNOWN_PROVIDERS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
}

/// A wallet provider registered with the host, before connection.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Which address methods the enabled wallet will expose
    fn capabilities(&self) -> Capabilities;

    /// Ask the user to approve the connection.
    async fn enable(&self) -> ConnectionResult<Arc<dyn WalletApi>>;
}

/// An enabled wallet. Methods a provider lacks keep their empty defaults and
/// are never called, because [`Capabilities`] gates them.
#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn used_addresses(&self) -> ConnectionResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn unused_addresses(&self) -> ConnectionResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn change_address(&self) -> ConnectionResult<Option<String>> {
        Ok(None)
    }
}

/// Host registry of wallet providers keyed by string id
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn WalletProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for adapter in &config.wallets {
            registry.register(
                adapter.key.clone(),
                Arc::new(configured::ConfiguredWallet::new(adapter)),
            );
        }
        registry
    }

    pub fn register(&mut self, key: impl Into<String>, provider: Arc<dyn WalletProvider>) {
        self.providers.insert(key.into(), provider);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn WalletProvider>> {
        self.providers.get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Known providers first in their fixed order, then any others by key.
    fn ordered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = KNOWN_PROVIDERS
            .iter()
            .map(|(k, _)| k.to_string())
            .filter(|k| self.providers.contains_key(k))
            .collect();

        let mut extra: Vec<String> = self
            .providers
            .keys()
            .filter(|k| known_provider_name(k).is_none())
            .cloned()
            .collect();
        extra.sort();
        keys.extend(extra);
        keys
    }
}

/// How a resolved address is checked before use
#[derive(Debug, Clone)]
pub struct AddressPolicy {
    pub prefixes: Vec<String>,
    pub max_length: usize,
    pub placeholder: Option<String>,
}

impl AddressPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            prefixes: config.wallet.address_prefixes.clone(),
            max_length: config.wallet.max_address_length,
            placeholder: config.placeholder_address().map(String::from),
        }
    }

    /// Accept `raw`, or substitute the placeholder and record why.
    pub fn apply(&self, raw: String) -> ConnectionResult<(String, Option<AddressDegradation>)> {
        let degradation = if raw.len() > self.max_length {
            Some(AddressDegradation::EncodedAddress { length: raw.len() })
        } else if !self.prefixes.iter().any(|p| raw.starts_with(p.as_str())) {
            Some(AddressDegradation::UnrecognizedPrefix { raw: raw.clone() })
        } else {
            None
        };

        let Some(degradation) = degradation else {
            return Ok((raw, None));
        };

        match &self.placeholder {
            Some(placeholder) => {
                tracing::warn!(
                    reason = ?degradation,
                    placeholder = %placeholder,
                    "Wallet address not usable, analyzing placeholder address instead"
                );
                Ok((placeholder.clone(), Some(degradation)))
            }
            None => {
                tracing::warn!(reason = ?degradation, "Wallet address not usable and no placeholder configured");
                Err(ConnectionError::UnsupportedAddress(preview(&raw)))
            }
        }
    }
}

fn preview(address: &str) -> String {
    folioflow_core::truncate_text(address, 20).into_owned()
}

fn first_non_empty(addresses: Vec<String>) -> Option<String> {
    addresses.into_iter().find(|a| !a.trim().is_empty())
}

/// Try used, then unused, then change address; first non-empty wins.
pub async fn resolve_address(
    api: &dyn WalletApi,
    capabilities: Capabilities,
) -> ConnectionResult<String> {
    if capabilities.used_addresses {
        if let Some(addr) = first_non_empty(api.used_addresses().await?) {
            return Ok(addr);
        }
        tracing::debug!("No used addresses found, trying unused addresses");
    } else {
        tracing::debug!("Wallet does not expose used addresses");
    }

    if capabilities.unused_addresses {
        if let Some(addr) = first_non_empty(api.unused_addresses().await?) {
            return Ok(addr);
        }
        tracing::debug!("No unused addresses found, trying change address");
    } else {
        tracing::debug!("Wallet does not expose unused addresses");
    }

    if capabilities.change_address {
        if let Some(addr) = api.change_address().await?.filter(|a| !a.trim().is_empty()) {
            return Ok(addr);
        }
    } else {
        tracing::debug!("Wallet does not expose a change address");
    }

    Err(ConnectionError::NoAddressFound)
}

/// Owns the single active wallet session.
pub struct SessionManager {
    registry: ProviderRegistry,
    policy: AddressPolicy,
    discovered: HashMap<String, ProviderDescriptor>,
    session: Option<WalletSession>,
}

impl SessionManager {
    pub fn new(registry: ProviderRegistry, policy: AddressPolicy) -> Self {
        Self {
            registry,
            policy,
            discovered: HashMap::new(),
            session: None,
        }
    }

    /// Scan the registry; capabilities are probed here, once per provider.
    pub fn list_available_providers(&mut self) -> Vec<ProviderDescriptor> {
        let descriptors: Vec<ProviderDescriptor> = self
            .registry
            .ordered_keys()
            .into_iter()
            .filter_map(|key| {
                let provider = self.registry.get(&key)?;
                Some(ProviderDescriptor {
                    name: provider.name().to_string(),
                    capabilities: provider.capabilities(),
                    key,
                })
            })
            .collect();

        tracing::info!(count = %descriptors.len(), "Discovered wallet providers");
        for d in &descriptors {
            self.discovered.insert(d.key.clone(), d.clone());
        }
        descriptors
    }

    pub async fn connect(&mut self, provider_key: &str) -> ConnectionResult<&WalletSession> {
        let provider = self
            .registry
            .get(provider_key)
            .ok_or_else(|| ConnectionError::ProviderUnavailable(provider_key.to_string()))?;

        let descriptor = match self.discovered.get(provider_key) {
            Some(d) => d.clone(),
            None => ProviderDescriptor {
                key: provider_key.to_string(),
                name: provider.name().to_string(),
                capabilities: provider.capabilities(),
            },
        };

        tracing::info!(provider = %descriptor.key, "Enabling wallet");
        let api = provider.enable().await?;

        let raw = resolve_address(api.as_ref(), descriptor.capabilities).await?;
        let (address, degradation) = self.policy.apply(raw)?;

        let session = WalletSession {
            provider_key: descriptor.key.clone(),
            display_name: descriptor.name.clone(),
            address,
            session_handle: Uuid::new_v4().to_string(),
            connected_at: Utc::now(),
            degradation,
        };

        if let Some(previous) = &self.session {
            tracing::info!(provider = %previous.provider_key, "Replacing active wallet session");
        }

        tracing::info!(
            provider = %session.provider_key,
            address = %preview(&session.address),
            degraded = %session.is_degraded(),
            "Wallet connected"
        );

        Ok(self.session.insert(session))
    }

    /// Clear the session. Safe to call when nothing is connected.
    pub fn disconnect(&mut self) -> Option<WalletSession> {
        let previous = self.session.take();
        if let Some(s) = &previous {
            tracing::info!(provider = %s.provider_key, "Wallet disconnected");
        }
        previous
    }

    pub fn current(&self) -> Option<&WalletSession> {
        self.session.as_ref()
    }

    /// The active session, or a fail-fast error when none exists.
    pub fn require(&self) -> FlowResult<&WalletSession> {
        self.session.as_ref().ok_or(FlowError::NoActiveSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWallet, FakeWalletApi};

    const USED: &str = "addr_test1used";
    const UNUSED: &str = "addr_test1unused";
    const CHANGE: &str = "addr_test1change";

    fn policy() -> AddressPolicy {
        AddressPolicy {
            prefixes: vec!["addr1".to_string(), "addr_test1".to_string()],
            max_length: 100,
            placeholder: Some("addr_test1placeholder".to_string()),
        }
    }

    #[tokio::test]
    async fn test_resolution_order_over_all_empty_combinations() {
        for mask in 0u8..8 {
            let used = mask & 1 != 0;
            let unused = mask & 2 != 0;
            let change = mask & 4 != 0;

            let api = FakeWalletApi::new(
                if used { vec![USED.into()] } else { vec![] },
                if unused { vec![UNUSED.into()] } else { vec![] },
                if change { Some(CHANGE.into()) } else { None },
            );

            let result = resolve_address(&api, Capabilities::all()).await;
            let expected = if used {
                Ok(USED.to_string())
            } else if unused {
                Ok(UNUSED.to_string())
            } else if change {
                Ok(CHANGE.to_string())
            } else {
                Err(ConnectionError::NoAddressFound)
            };
            assert_eq!(result, expected, "mask {:03b}", mask);

            // Sources are consulted strictly in order and stop at the first hit
            let calls = api.calls();
            let expected_calls: &[&str] = if used {
                &["used"]
            } else if unused {
                &["used", "unused"]
            } else {
                &["used", "unused", "change"]
            };
            assert_eq!(calls, expected_calls, "mask {:03b}", mask);
        }
    }

    #[tokio::test]
    async fn test_missing_capabilities_are_skipped() {
        let api = FakeWalletApi::new(vec![USED.into()], vec![], Some(CHANGE.into()));
        let caps = Capabilities {
            used_addresses: false,
            unused_addresses: false,
            change_address: true,
        };
        assert_eq!(resolve_address(&api, caps).await.unwrap(), CHANGE);
        assert_eq!(api.calls(), vec!["change"]);
    }

    #[test]
    fn test_policy_accepts_known_prefix() {
        let (addr, degradation) = policy().apply("addr1qxyz".to_string()).unwrap();
        assert_eq!(addr, "addr1qxyz");
        assert!(degradation.is_none());
    }

    #[test]
    fn test_policy_substitutes_encoded_address() {
        let hex = "01".repeat(57);
        let (addr, degradation) = policy().apply(hex).unwrap();
        assert_eq!(addr, "addr_test1placeholder");
        assert_eq!(degradation, Some(AddressDegradation::EncodedAddress { length: 114 }));
    }

    #[test]
    fn test_policy_substitutes_unknown_prefix() {
        let (addr, degradation) = policy().apply("stake1uxyz".to_string()).unwrap();
        assert_eq!(addr, "addr_test1placeholder");
        assert!(matches!(degradation, Some(AddressDegradation::UnrecognizedPrefix { .. })));
    }

    #[test]
    fn test_policy_without_placeholder_fails() {
        let strict = AddressPolicy {
            placeholder: None,
            ..policy()
        };
        let err = strict.apply("stake1uxyz".to_string()).unwrap_err();
        assert!(matches!(err, ConnectionError::UnsupportedAddress(_)));
    }

    fn manager_with(key: &str, wallet: FakeWallet) -> SessionManager {
        let mut registry = ProviderRegistry::new();
        registry.register(key, Arc::new(wallet));
        SessionManager::new(registry, policy())
    }

    #[tokio::test]
    async fn test_change_address_only_provider() {
        let wallet = FakeWallet::change_only("Flint", CHANGE);
        let mut manager = manager_with("flint", wallet);

        let providers = manager.list_available_providers();
        assert_eq!(providers.len(), 1);
        assert!(!providers[0].capabilities.used_addresses);

        let session = manager.connect("flint").await.unwrap();
        assert_eq!(session.address, CHANGE);
        assert_eq!(session.display_name, "Flint");
        assert!(!session.is_degraded());
    }

    #[tokio::test]
    async fn test_connect_unknown_provider() {
        let mut manager = SessionManager::new(ProviderRegistry::new(), policy());
        let err = manager.connect("nami").await.unwrap_err();
        assert_eq!(err, ConnectionError::ProviderUnavailable("nami".to_string()));
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_declined_connection_leaves_no_session() {
        let mut manager = manager_with("lace", FakeWallet::declining("Lace"));
        let err = manager.connect("lace").await.unwrap_err();
        assert!(matches!(err, ConnectionError::UserDeclined(_)));
        assert_eq!(manager.require().unwrap_err(), FlowError::NoActiveSession);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session_and_disconnect_is_idempotent() {
        let mut manager = manager_with("flint", FakeWallet::change_only("Flint", CHANGE));
        let first = manager.connect("flint").await.unwrap().session_handle.clone();
        let second = manager.connect("flint").await.unwrap().session_handle.clone();
        assert_ne!(first, second);

        assert!(manager.disconnect().is_some());
        assert!(manager.disconnect().is_none());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_discovery_order() {
        let mut registry = ProviderRegistry::new();
        registry.register("zeta", Arc::new(FakeWallet::change_only("Zeta", CHANGE)));
        registry.register("eternl", Arc::new(FakeWallet::change_only("Eternl", CHANGE)));
        registry.register("lace", Arc::new(FakeWallet::change_only("Lace", CHANGE)));
        registry.register("alpha", Arc::new(FakeWallet::change_only("Alpha", CHANGE)));

        let mut manager = SessionManager::new(registry, policy());
        let keys: Vec<String> = manager
            .list_available_providers()
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["lace", "eternl", "alpha", "zeta"]);
    }
}
