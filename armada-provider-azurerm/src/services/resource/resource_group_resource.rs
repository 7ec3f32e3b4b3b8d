use async_trait::async_trait;
use log::info;

use armada_core::provider::{ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{
    AttributeSchema, ResourceSchema, Timeouts, normalize_location_value, types,
};

use super::models::ResourceGroup;
use crate::context::ProviderContext;
use crate::ids::ResourceGroupId;
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{expand_tags, flatten_location, flatten_tags};

pub struct ResourceGroupResource;

impl ResourceGroupResource {
    fn expand(resource: &Resource) -> ResourceGroup {
        ResourceGroup {
            location: resource.get_str("location").unwrap_or_default().to_string(),
            tags: expand_tags(resource.get("tags")),
            ..ResourceGroup::default()
        }
    }
}

pub(super) fn flatten(group: &ResourceGroup, id: &ResourceGroupId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        "name".to_string(),
        Value::String(id.resource_group_name.clone()),
    );
    attributes.insert("location".to_string(), flatten_location(Some(&group.location)));
    attributes.insert("tags".to_string(), flatten_tags(group.tags.as_ref()));
    attributes
}

#[async_trait]
impl ResourceHandler<ProviderContext> for ResourceGroupResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_resource_group"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("A container that holds related Azure resources")
            .attribute(
                AttributeSchema::new("name", types::resource_group_name())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("location", types::location())
                    .required()
                    .force_new()
                    .with_normalizer(normalize_location_value),
            )
            .attribute(AttributeSchema::new("tags", types::tags()))
            .with_timeouts(Timeouts::minutes(90, 5, 90, 90))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        ResourceGroupId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let name = resource.get_str("name").unwrap_or_default();
        let id = ResourceGroupId::new(&ctx.subscription_id, name);
        let client = &ctx.clients.resources.resource_groups;

        check_requires_import(ctx, client, &id, self.resource_type()).await?;

        let group = client
            .create_or_update(&id, &Self::expand(resource))
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&group, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = ResourceGroupId::parse(id)?;
        let group = ctx
            .clients
            .resources
            .resource_groups
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match group {
            Some(group) => State::existing(address.clone(), flatten(&group, &id)).with_id(id.id()),
            None => gone(address, &id),
        })
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _from: &State,
        to: &Resource,
        _changed: &[String],
    ) -> ProviderResult<State> {
        let id = ResourceGroupId::parse(id)?;
        let group = ctx
            .clients
            .resources
            .resource_groups
            .create_or_update(&id, &Self::expand(to))
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&group, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = ResourceGroupId::parse(id)?;
        ctx.clients
            .resources
            .resource_groups
            .delete(&id)
            .await
            .map_err(|e| arm_error("deleting", &id, e))?;
        info!("deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use armada_core::differ::Diff;
    use armada_core::provider::{ErrorKind, Provider};
    use serde_json::json;

    use crate::testing::{FakeArm, provider};

    use super::*;

    const ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/acctestRG-1";

    fn group() -> Resource {
        let mut tags = HashMap::new();
        tags.insert("env".to_string(), Value::from("test"));
        Resource::new("azurerm_resource_group", "test")
            .with_attribute("name", "acctestRG-1")
            .with_attribute("location", "West Europe")
            .with_attribute("tags", Value::Map(tags))
    }

    #[tokio::test]
    async fn create_read_delete() {
        let fake = Arc::new(FakeArm::new().with_async_operations(1));
        let provider = provider(fake.clone());

        let state = provider.create(&group()).await.unwrap();
        assert_eq!(state.id.as_deref(), Some(ID));
        assert_eq!(state.get("location"), Some(&Value::from("westeurope")));
        assert_eq!(fake.resource(ID).unwrap()["tags"]["env"], "test");

        let read = provider.read(&state.address, ID).await.unwrap();
        assert_eq!(read.attributes, state.attributes);

        provider.delete(&state.address, ID).await.unwrap();
        let read = provider.read(&state.address, ID).await.unwrap();
        assert!(!read.exists);
    }

    #[tokio::test]
    async fn plan_after_create_is_no_change() {
        let provider = provider(Arc::new(FakeArm::new()));
        let state = provider.create(&group()).await.unwrap();

        let read = provider.read(&state.address, ID).await.unwrap();
        assert_eq!(provider.plan(&group(), &read).unwrap(), Diff::NoChange);

        let untagged = group().with_attribute("tags", Value::Map(HashMap::new()));
        assert_eq!(
            provider.plan(&untagged, &read).unwrap(),
            Diff::Update {
                changed: vec!["tags".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn existing_group_requires_import() {
        let fake = Arc::new(FakeArm::new().with_resource(ID, json!({"location": "westeurope"})));
        let provider = provider(fake);

        let err = provider.create(&group()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(err.to_string().contains("needs to be imported"));

        let imported = provider
            .import(&ResourceAddress::new("azurerm_resource_group", "test"), ID)
            .await
            .unwrap();
        assert_eq!(imported.get("name"), Some(&Value::from("acctestRG-1")));
    }

    #[tokio::test]
    async fn tags_update_in_place() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());
        let state = provider.create(&group()).await.unwrap();

        let updated = provider
            .update(ID, &state, &group().with_attribute("tags", Value::Map(HashMap::new())))
            .await
            .unwrap();
        assert_eq!(updated.get("tags"), Some(&Value::Map(HashMap::new())));
        assert_eq!(fake.resource(ID).unwrap()["tags"], json!({}));
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected() {
        let provider = provider(Arc::new(FakeArm::new()));
        let address = ResourceAddress::new("azurerm_resource_group", "test");
        let err = provider.read(&address, "/subscriptions/x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedId);
    }
}
