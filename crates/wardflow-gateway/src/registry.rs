//! Capability registry populated by discovery.
//!
//! External tool servers are collaborators behind the `CapabilityProvider`
//! trait. The registry never hard-codes capability names: it is populated
//! by an explicit discovery call against each provider, and new
//! capabilities may appear mid-workflow via re-discovery. The gateway
//! depends only on the registry's read interface.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wardflow_core::{Actor, AuditKind, AuditLog, CapabilityName};

use crate::error::ProviderError;

/// A capability advertised by an external tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: CapabilityName,
    /// JSON schema describing the capability's arguments.
    pub schema: serde_json::Value,
}

/// External tool server collaborator. Treated as untrusted input: every
/// response passes through the guardrail before reaching an agent.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Advertise the capabilities this server currently offers.
    async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>, ProviderError>;

    /// Invoke one capability.
    async fn call(
        &self,
        name: &CapabilityName,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Registry mapping capability names to the provider that advertised them.
pub struct CapabilityRegistry {
    entries: DashMap<CapabilityName, Arc<dyn CapabilityProvider>>,
    audit: Arc<AuditLog>,
}

impl CapabilityRegistry {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            entries: DashMap::new(),
            audit,
        }
    }

    /// Discover a provider's capabilities and register them.
    ///
    /// Re-discovery merges: a capability advertised by two providers
    /// resolves to the most recently discovered one. Returns the names
    /// registered by this call.
    pub async fn discover(
        &self,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Result<Vec<CapabilityName>, ProviderError> {
        let descriptors = provider.list_capabilities().await?;
        let mut registered = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            self.audit.record(
                Actor::System,
                AuditKind::CapabilityDiscovered,
                None,
                format!("capability={}", descriptor.name),
            );
            tracing::info!(capability = %descriptor.name, "capability discovered");
            self.entries
                .insert(descriptor.name.clone(), provider.clone());
            registered.push(descriptor.name);
        }
        Ok(registered)
    }

    /// Resolve a capability to its provider.
    pub fn resolve(&self, name: &CapabilityName) -> Option<Arc<dyn CapabilityProvider>> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    /// Names currently registered.
    pub fn capability_names(&self) -> Vec<CapabilityName> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wardflow_core::AuditConfig;

    struct StaticProvider {
        names: Vec<&'static str>,
    }

    #[async_trait]
    impl CapabilityProvider for StaticProvider {
        async fn list_capabilities(&self) -> Result<Vec<CapabilityDescriptor>, ProviderError> {
            Ok(self
                .names
                .iter()
                .map(|n| CapabilityDescriptor {
                    name: CapabilityName::from(*n),
                    schema: json!({"type": "object"}),
                })
                .collect())
        }

        async fn call(
            &self,
            name: &CapabilityName,
            _arguments: &serde_json::Value,
        ) -> Result<serde_json::Value, ProviderError> {
            Ok(json!({"echo": name.as_str()}))
        }
    }

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new(Arc::new(AuditLog::new(AuditConfig::default())))
    }

    #[tokio::test]
    async fn discovery_registers_advertised_capabilities() {
        let registry = registry();
        let provider = Arc::new(StaticProvider {
            names: vec!["search", "fetch"],
        });

        let registered = registry.discover(provider).await.unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve(&CapabilityName::from("search")).is_some());
        assert!(registry.resolve(&CapabilityName::from("deploy")).is_none());
    }

    #[tokio::test]
    async fn rediscovery_merges_new_capabilities() {
        let registry = registry();
        registry
            .discover(Arc::new(StaticProvider {
                names: vec!["search"],
            }))
            .await
            .unwrap();

        // A second server appears mid-workflow with a new capability.
        registry
            .discover(Arc::new(StaticProvider {
                names: vec!["deploy"],
            }))
            .await
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve(&CapabilityName::from("deploy")).is_some());
    }

    #[tokio::test]
    async fn discovery_is_audited() {
        let audit = Arc::new(AuditLog::new(AuditConfig::default()));
        let registry = CapabilityRegistry::new(audit.clone());
        registry
            .discover(Arc::new(StaticProvider {
                names: vec!["search"],
            }))
            .await
            .unwrap();
        assert_eq!(audit.count_kind(AuditKind::CapabilityDiscovered), 1);
    }
}
