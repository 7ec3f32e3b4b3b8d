use async_trait::async_trait;

use armada_core::provider::{DataSourceHandler, ProviderError, ProviderResult};
use armada_core::resource::{Resource, State};
use armada_core::resource_id::ResourceIdentifier;
use armada_core::schema::{AttributeSchema, ResourceSchema, Timeouts, types};

use super::resource_group_resource::flatten;
use crate::context::ProviderContext;
use crate::ids::ResourceGroupId;
use crate::services::arm_error;

/// Look up an existing resource group by name
pub struct ResourceGroupDataSource;

#[async_trait]
impl DataSourceHandler<ProviderContext> for ResourceGroupDataSource {
    fn resource_type(&self) -> &'static str {
        "azurerm_resource_group"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .attribute(AttributeSchema::new("name", types::resource_group_name()).required())
            .attribute(AttributeSchema::new("location", types::location()).read_only())
            .attribute(AttributeSchema::new("tags", types::tags()).read_only())
            .with_timeouts(Timeouts::minutes(0, 5, 0, 0))
    }

    async fn read(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let name = resource.get_str("name").unwrap_or_default();
        let id = ResourceGroupId::new(&ctx.subscription_id, name);

        let group = ctx
            .clients
            .resources
            .resource_groups
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?
            .ok_or_else(|| ProviderError::not_found(format!("{} was not found", id)))?;

        Ok(State::existing(resource.address.clone(), flatten(&group, &id)).with_id(id.id()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use armada_core::provider::{ErrorKind, Provider};
    use armada_core::resource::Value;
    use serde_json::json;

    use crate::testing::{FakeArm, provider};

    use super::*;

    #[tokio::test]
    async fn reads_existing_group() {
        let fake = Arc::new(FakeArm::new().with_resource(
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/shared",
            json!({"location": "East US", "tags": {"team": "data"}}),
        ));
        let provider = provider(fake);

        let lookup = Resource::new("azurerm_resource_group", "shared")
            .with_attribute("name", "shared")
            .with_read_only(true);
        let state = provider.read_data_source(&lookup).await.unwrap();
        assert_eq!(state.get("location"), Some(&Value::from("eastus")));
        assert_eq!(
            state.get("tags").and_then(Value::as_map).unwrap()["team"],
            Value::from("data")
        );
    }

    #[tokio::test]
    async fn missing_group_is_an_error() {
        let provider = provider(Arc::new(FakeArm::new()));
        let lookup = Resource::new("azurerm_resource_group", "missing")
            .with_attribute("name", "missing")
            .with_read_only(true);
        let err = provider.read_data_source(&lookup).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains(r#"Resource Group "missing" was not found"#));
    }
}
