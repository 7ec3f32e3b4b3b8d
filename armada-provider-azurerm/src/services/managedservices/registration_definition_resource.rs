//! Azure Lighthouse registration definitions
//!
//! Definitions live under an arbitrary scope rather than a resource group.
//! The definition ID is a UUID chosen by the caller; when none is configured a
//! random one is generated on create.

use async_trait::async_trait;
use log::info;
use uuid::Uuid;

use armada_core::provider::{ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, Timeouts, types};

use super::models::{Authorization, Plan, RegistrationDefinition, RegistrationDefinitionProperties};
use crate::context::ProviderContext;
use crate::ids::RegistrationDefinitionId;
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{block_str, expand_string_list, flatten_string_list, set, single_block};

pub struct RegistrationDefinitionResource;

fn authorization_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("principal_id", types::uuid()).required())
        .attribute(AttributeSchema::new("role_definition_id", types::uuid()).required())
        .attribute(AttributeSchema::new("principal_display_name", types::non_empty_string()))
        .attribute(AttributeSchema::new(
            "delegated_role_definition_ids",
            AttributeType::List(Box::new(types::uuid())),
        ))
        .min_items(1)
        .into_type()
}

fn plan_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("publisher", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("product", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("version", types::non_empty_string()).required())
        .max_items(1)
        .into_type()
}

fn expand(resource: &Resource) -> RegistrationDefinition {
    let authorizations = resource
        .get_blocks("authorization")
        .into_iter()
        .map(|auth| Authorization {
            principal_id: block_str(auth, "principal_id").unwrap_or_default().to_string(),
            role_definition_id: block_str(auth, "role_definition_id")
                .unwrap_or_default()
                .to_string(),
            principal_id_display_name: block_str(auth, "principal_display_name").map(str::to_string),
            delegated_role_definition_ids: expand_string_list(
                auth.get("delegated_role_definition_ids"),
            ),
        })
        .collect();

    let plan = resource.get_blocks("plan").first().map(|plan| Plan {
        name: block_str(plan, "name").unwrap_or_default().to_string(),
        publisher: block_str(plan, "publisher").unwrap_or_default().to_string(),
        product: block_str(plan, "product").unwrap_or_default().to_string(),
        version: block_str(plan, "version").unwrap_or_default().to_string(),
    });

    RegistrationDefinition {
        properties: Some(RegistrationDefinitionProperties {
            description: resource.get_str("description").map(str::to_string),
            authorizations,
            registration_definition_name: resource.get_str("name").map(str::to_string),
            managed_by_tenant_id: resource
                .get_str("managing_tenant_id")
                .unwrap_or_default()
                .to_string(),
            ..RegistrationDefinitionProperties::default()
        }),
        plan,
        ..RegistrationDefinition::default()
    }
}

fn flatten(definition: &RegistrationDefinition, id: &RegistrationDefinitionId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        "registration_definition_id".to_string(),
        Value::String(id.registration_definition_id.clone()),
    );
    attributes.insert("scope".to_string(), Value::String(id.scope.clone()));

    if let Some(props) = &definition.properties {
        set(&mut attributes, "name", props.registration_definition_name.clone());
        set(&mut attributes, "description", props.description.clone());
        attributes.insert(
            "managing_tenant_id".to_string(),
            Value::String(props.managed_by_tenant_id.clone()),
        );
        let authorizations = props
            .authorizations
            .iter()
            .map(|auth| {
                let mut block = Attributes::new();
                block.insert("principal_id".to_string(), Value::String(auth.principal_id.clone()));
                block.insert(
                    "role_definition_id".to_string(),
                    Value::String(auth.role_definition_id.clone()),
                );
                set(&mut block, "principal_display_name", auth.principal_id_display_name.clone());
                if !auth.delegated_role_definition_ids.is_empty() {
                    block.insert(
                        "delegated_role_definition_ids".to_string(),
                        flatten_string_list(&auth.delegated_role_definition_ids),
                    );
                }
                Value::Map(block)
            })
            .collect();
        attributes.insert("authorization".to_string(), Value::List(authorizations));
    }

    if let Some(plan) = &definition.plan {
        let mut block = Attributes::new();
        block.insert("name".to_string(), Value::String(plan.name.clone()));
        block.insert("publisher".to_string(), Value::String(plan.publisher.clone()));
        block.insert("product".to_string(), Value::String(plan.product.clone()));
        block.insert("version".to_string(), Value::String(plan.version.clone()));
        attributes.insert("plan".to_string(), single_block(block));
    }
    attributes
}

#[async_trait]
impl ResourceHandler<ProviderContext> for RegistrationDefinitionResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_registration_definition"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Delegated access for a managing tenant through Azure Lighthouse")
            .attribute(
                AttributeSchema::new("registration_definition_id", types::uuid())
                    .computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("scope", types::resource_id())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("managing_tenant_id", types::uuid())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", types::non_empty_string()))
            .attribute(AttributeSchema::new("authorization", authorization_block()).required())
            .attribute(AttributeSchema::new("plan", plan_block()))
            .with_timeouts(Timeouts::minutes(30, 5, 30, 30))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        RegistrationDefinitionId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let definition_id = resource
            .get_str("registration_definition_id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let id = RegistrationDefinitionId::new(
            resource.get_str("scope").unwrap_or_default(),
            definition_id,
        );
        let client = &ctx.clients.managed_services.registration_definitions;
        check_requires_import(ctx, client, &id, self.resource_type()).await?;

        let definition = client
            .create_or_update(&id, &expand(resource))
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&definition, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = RegistrationDefinitionId::parse(id)?;
        let definition = ctx
            .clients
            .managed_services
            .registration_definitions
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match definition {
            Some(definition) => {
                State::existing(address.clone(), flatten(&definition, &id)).with_id(id.id())
            }
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
        let id = RegistrationDefinitionId::parse(id)?;
        let definition = ctx
            .clients
            .managed_services
            .registration_definitions
            .create_or_update(&id, &expand(to))
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&definition, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = RegistrationDefinitionId::parse(id)?;
        ctx.clients
            .managed_services
            .registration_definitions
            .delete(&id)
            .await
            .map_err(|e| arm_error("deleting", &id, e))?;
        info!("deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use armada_core::differ::Diff;
    use armada_core::provider::{ErrorKind, Provider};
    use reqwest::Method;

    use crate::testing::{FakeArm, SUBSCRIPTION_ID, provider};

    use super::*;

    const TENANT: &str = "72f988bf-86f1-41af-91ab-2d7cd011db47";
    const PRINCIPAL: &str = "3a2c1f0e-4a0a-4d3a-9c2e-0f6b7d1f2a11";
    const CONTRIBUTOR: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";
    const DEFINITION: &str = "0c2b7a7c-5a9e-4f52-8b5e-8f3e6d3b4a21";

    fn scope() -> String {
        format!("/subscriptions/{}", SUBSCRIPTION_ID)
    }

    fn definition_id(uuid: &str) -> String {
        format!(
            "{}/providers/Microsoft.ManagedServices/registrationDefinitions/{}",
            scope(),
            uuid
        )
    }

    fn authorization(role: &str) -> Value {
        Value::Map(
            [
                ("principal_id".to_string(), Value::from(PRINCIPAL)),
                ("role_definition_id".to_string(), Value::from(role)),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn definition() -> Resource {
        Resource::new("azurerm_registration_definition", "test")
            .with_attribute("scope", scope())
            .with_attribute("name", "acctest-def")
            .with_attribute("managing_tenant_id", TENANT)
            .with_attribute("authorization", Value::List(vec![authorization(CONTRIBUTOR)]))
    }

    #[tokio::test]
    async fn create_generates_a_definition_id() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());

        let state = provider.create(&definition()).await.unwrap();
        let generated = state
            .get("registration_definition_id")
            .and_then(Value::as_str)
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_eq!(state.id, Some(definition_id(&generated)));

        let stored = fake.resource(&definition_id(&generated)).unwrap();
        assert_eq!(stored["properties"]["managedByTenantId"], TENANT);
        assert_eq!(stored["properties"]["registrationDefinitionName"], "acctest-def");
        assert_eq!(stored["properties"]["authorizations"][0]["principalId"], PRINCIPAL);
        assert!(stored.get("plan").is_none());
    }

    #[tokio::test]
    async fn plan_after_create_is_no_change() {
        let provider = provider(Arc::new(FakeArm::new()));
        let state = provider.create(&definition()).await.unwrap();
        let id = state.id.clone().unwrap();

        let read = provider.read(&state.address, &id).await.unwrap();
        assert_eq!(provider.plan(&definition(), &read).unwrap(), Diff::NoChange);

        let moved = definition().with_attribute("managing_tenant_id", PRINCIPAL);
        assert_eq!(
            provider.plan(&moved, &read).unwrap(),
            Diff::Replace {
                changed: vec!["managing_tenant_id".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn supplied_definition_id_is_used() {
        let provider = provider(Arc::new(FakeArm::new()));
        let state = provider
            .create(&definition().with_attribute("registration_definition_id", DEFINITION))
            .await
            .unwrap();
        assert_eq!(state.id, Some(definition_id(DEFINITION)));
    }

    #[tokio::test]
    async fn authorizations_update_in_place() {
        let fake = Arc::new(FakeArm::new().with_async_operations(1));
        let provider = provider(fake.clone());
        let desired = definition().with_attribute("registration_definition_id", DEFINITION);
        let state = provider.create(&desired).await.unwrap();

        let reader = "acdd72a7-3385-48ef-bd42-f606fba81ae7";
        let changed = desired.with_attribute(
            "authorization",
            Value::List(vec![authorization(CONTRIBUTOR), authorization(reader)]),
        );
        let updated = provider.update(&definition_id(DEFINITION), &state, &changed).await.unwrap();
        assert_eq!(
            updated.get("authorization").and_then(Value::as_list).map(<[Value]>::len),
            Some(2)
        );
        assert!(fake.requests().iter().all(|(method, _)| *method != Method::DELETE));
    }

    #[tokio::test]
    async fn changing_the_managing_tenant_forces_replacement() {
        let provider = provider(Arc::new(FakeArm::new()));
        let desired = definition().with_attribute("registration_definition_id", DEFINITION);
        let state = provider.create(&desired).await.unwrap();

        let moved = desired.with_attribute("managing_tenant_id", PRINCIPAL);
        let err = provider.update(&definition_id(DEFINITION), &state, &moved).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiresReplacement);
    }

    #[tokio::test]
    async fn plan_round_trips() {
        let fake = Arc::new(FakeArm::new());
        let provider = provider(fake.clone());
        let plan = Value::Map(
            [
                ("name", "plan"),
                ("publisher", "contoso"),
                ("product", "managed-ops"),
                ("version", "1.0.0"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect(),
        );
        let state = provider
            .create(
                &definition()
                    .with_attribute("registration_definition_id", DEFINITION)
                    .with_attribute("plan", Value::List(vec![plan.clone()])),
            )
            .await
            .unwrap();

        assert_eq!(
            fake.resource(&definition_id(DEFINITION)).unwrap()["plan"]["publisher"],
            "contoso"
        );
        let read = provider.read(&state.address, &definition_id(DEFINITION)).await.unwrap();
        assert_eq!(read.get("plan"), Some(&Value::List(vec![plan])));
    }

    #[tokio::test]
    async fn principals_must_be_uuids() {
        let provider = provider(Arc::new(FakeArm::new()));
        let bad = Value::Map(
            [
                ("principal_id".to_string(), Value::from("not-a-uuid")),
                ("role_definition_id".to_string(), Value::from(CONTRIBUTOR)),
            ]
            .into_iter()
            .collect(),
        );
        let err = provider
            .create(&definition().with_attribute("authorization", Value::List(vec![bad])))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("not a valid UUID"));
    }

    #[tokio::test]
    async fn delete_then_read_is_gone() {
        let provider = provider(Arc::new(FakeArm::new()));
        let state = provider
            .create(&definition().with_attribute("registration_definition_id", DEFINITION))
            .await
            .unwrap();

        provider.delete(&state.address, &definition_id(DEFINITION)).await.unwrap();
        let read = provider.read(&state.address, &definition_id(DEFINITION)).await.unwrap();
        assert!(!read.exists);
    }
}
