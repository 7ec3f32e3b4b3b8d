//! Helpers for tests that provision real infrastructure
//!
//! Live tests read their settings from `ARM_*` variables and are marked
//! `#[ignore]`; run them with `cargo test -- --ignored`.

use armada_core::provider::{Provider, ProviderError, ProviderResult};
use armada_core::resource::{ResourceAddress, State};
use log::debug;
use uuid::Uuid;

use crate::config::ConfigError;

/// Locations resources are created in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    pub primary: String,
    pub secondary: String,
    pub ternary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriptions {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Credentials for cross-tenant scenarios
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clients {
    pub tenant_id: Option<String>,
    pub tenant_id_alt: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_id_alt: Option<String>,
    pub client_secret_alt: Option<String>,
    pub principal_id_alt_tenant: Option<String>,
}

/// Per-test settings and random values for unique names
#[derive(Debug, Clone)]
pub struct TestData {
    pub locations: Regions,
    pub subscriptions: Subscriptions,
    pub clients: Clients,
    pub random_integer: i64,
    /// Five lowercase characters, safe for storage-style names
    pub random_string: String,
    pub resource_type: String,
    pub resource_label: String,
}

impl TestData {
    /// Settings from the process environment
    pub fn build(resource_type: &str, label: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(resource_type, label, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        resource_type: &str,
        label: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let random = Uuid::new_v4();
        let data = Self {
            locations: Regions {
                primary: required("ARM_TEST_LOCATION")?,
                secondary: required("ARM_TEST_LOCATION_ALT")?,
                ternary: optional("ARM_TEST_LOCATION_ALT2"),
            },
            subscriptions: Subscriptions {
                primary: required("ARM_SUBSCRIPTION_ID")?,
                secondary: optional("ARM_SUBSCRIPTION_ID_ALT"),
            },
            clients: Clients {
                tenant_id: optional("ARM_TENANT_ID"),
                tenant_id_alt: optional("ARM_TENANT_ID_ALT"),
                client_id: optional("ARM_CLIENT_ID"),
                client_secret: optional("ARM_CLIENT_SECRET"),
                client_id_alt: optional("ARM_CLIENT_ID_ALT"),
                client_secret_alt: optional("ARM_CLIENT_SECRET_ALT"),
                principal_id_alt_tenant: optional("ARM_PRINCIPAL_ID_ALT_TENANT"),
            },
            random_integer: (random.as_u128() % 1_000_000_000_000) as i64,
            random_string: random.simple().to_string().chars().take(5).collect(),
            resource_type: resource_type.to_string(),
            resource_label: label.to_string(),
        };
        debug!(
            "acceptance data for {} (random {})",
            data.resource_name(),
            data.random_integer
        );
        Ok(data)
    }

    /// `type.label`, the address used in state
    pub fn resource_name(&self) -> String {
        format!("{}.{}", self.resource_type, self.resource_label)
    }

    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.resource_type, &self.resource_label)
    }

    /// Name prefixed with `acctest` and made unique by the random integer
    pub fn name(&self, prefix: &str) -> String {
        format!("acctest{}-{}", prefix, self.random_integer)
    }
}

/// Whether the resource behind `id` currently exists
pub async fn exists_in_azure(
    provider: &dyn Provider,
    address: &ResourceAddress,
    id: &str,
) -> ProviderResult<bool> {
    Ok(provider.read(address, id).await?.exists)
}

/// Fail if any of `states` still exists remotely
pub async fn check_destroyed(provider: &dyn Provider, states: &[State]) -> ProviderResult<()> {
    for state in states {
        let Some(id) = state.id.as_deref() else {
            continue;
        };
        if exists_in_azure(provider, &state.address, id).await? {
            return Err(ProviderError::new(format!("{} still exists in Azure", id))
                .for_resource(state.address.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use armada_core::resource::Resource;
    use tokio_util::sync::CancellationToken;

    use crate::config::ProviderConfig;
    use crate::testing::{FakeArm, provider};

    use super::*;

    fn env() -> HashMap<&'static str, &'static str> {
        [
            ("ARM_TEST_LOCATION", "westeurope"),
            ("ARM_TEST_LOCATION_ALT", "northeurope"),
            ("ARM_SUBSCRIPTION_ID", "00000000-0000-0000-0000-000000000000"),
            ("ARM_CLIENT_ID_ALT", ""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_data_reads_settings() {
        let env = env();
        let data = TestData::from_lookup("azurerm_resource_group", "test", |name| {
            env.get(name).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(data.locations.primary, "westeurope");
        assert_eq!(data.locations.ternary, None);
        assert_eq!(data.clients.client_id_alt, None);
        assert_eq!(data.random_string.len(), 5);
        assert!(data.random_integer >= 0);
        assert_eq!(data.resource_name(), "azurerm_resource_group.test");
        assert!(data.name("RG").starts_with("acctestRG-"));
    }

    #[test]
    fn missing_locations_are_reported() {
        let err = TestData::from_lookup("azurerm_resource_group", "test", |_| None).unwrap_err();
        assert_eq!(err.to_string(), "ARM_TEST_LOCATION must be set");
    }

    #[tokio::test]
    async fn destroyed_resources_are_checked() {
        let provider = provider(Arc::new(FakeArm::new()));
        let group = Resource::new("azurerm_resource_group", "test")
            .with_attribute("name", "acctestRG-1")
            .with_attribute("location", "westeurope");
        let state = provider.create(&group).await.unwrap();

        let err = check_destroyed(&provider, std::slice::from_ref(&state)).await.unwrap_err();
        assert!(err.to_string().contains("still exists"));

        provider.delete(&state.address, state.id.as_deref().unwrap()).await.unwrap();
        check_destroyed(&provider, &[state]).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "provisions a resource group in live Azure"]
    async fn resource_group_lifecycle_against_azure() {
        let data = TestData::build("azurerm_resource_group", "test").unwrap();
        let config = ProviderConfig::from_env().unwrap();
        let provider = crate::from_config(&config, CancellationToken::new()).unwrap();

        let group = Resource::new(&data.resource_type, &data.resource_label)
            .with_attribute("name", data.name("RG"))
            .with_attribute("location", data.locations.primary.clone());
        let state = provider.create(&group).await.unwrap();
        let id = state.id.clone().unwrap();
        assert!(exists_in_azure(&provider, &data.address(), &id).await.unwrap());

        provider.delete(&state.address, &id).await.unwrap();
        check_destroyed(&provider, &[state]).await.unwrap();
    }
}
