use async_trait::async_trait;
use log::info;

use armada_core::provider::{ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{
    AttributeSchema, AttributeType, ResourceSchema, Timeouts, normalize_location_value, types,
};

use super::models::{Server, ServerProperties};
use crate::context::ProviderContext;
use crate::ids::MssqlServerId;
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{expand_tags, flatten_location, flatten_tags, set};

pub struct ServerResource;

/// `Disabled` in configuration is `None` on the wire
fn expand_tls_version(value: &str) -> String {
    match value {
        "Disabled" => "None".to_string(),
        other => other.to_string(),
    }
}

fn flatten_tls_version(value: &str) -> String {
    match value {
        "None" => "Disabled".to_string(),
        other => other.to_string(),
    }
}

fn expand(resource: &Resource) -> Server {
    let public_network_access = match resource.get_bool("public_network_access_enabled") {
        Some(false) => "Disabled",
        _ => "Enabled",
    };
    Server {
        location: resource.get_str("location").unwrap_or_default().to_string(),
        tags: expand_tags(resource.get("tags")),
        properties: Some(ServerProperties {
            administrator_login: resource.get_str("administrator_login").map(str::to_string),
            administrator_login_password: resource
                .get_str("administrator_login_password")
                .map(str::to_string),
            version: resource.get_str("version").map(str::to_string),
            minimal_tls_version: resource.get_str("minimum_tls_version").map(expand_tls_version),
            public_network_access: Some(public_network_access.to_string()),
            ..ServerProperties::default()
        }),
        ..Server::default()
    }
}

pub(super) fn flatten(server: &Server, id: &MssqlServerId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), Value::String(id.server_name.clone()));
    attributes.insert(
        "resource_group_name".to_string(),
        Value::String(id.resource_group_name.clone()),
    );
    attributes.insert("location".to_string(), flatten_location(Some(&server.location)));
    attributes.insert("tags".to_string(), flatten_tags(server.tags.as_ref()));

    if let Some(props) = &server.properties {
        set(&mut attributes, "version", props.version.clone());
        set(&mut attributes, "administrator_login", props.administrator_login.clone());
        set(
            &mut attributes,
            "minimum_tls_version",
            props.minimal_tls_version.as_deref().map(flatten_tls_version),
        );
        set(
            &mut attributes,
            "fully_qualified_domain_name",
            props.fully_qualified_domain_name.clone(),
        );
        let public_network_access = props.public_network_access.as_deref().unwrap_or("Enabled");
        attributes.insert(
            "public_network_access_enabled".to_string(),
            Value::Bool(!public_network_access.eq_ignore_ascii_case("Disabled")),
        );
    }
    attributes
}

#[async_trait]
impl ResourceHandler<ProviderContext> for ServerResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_mssql_server"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("An Azure SQL logical server")
            .attribute(
                AttributeSchema::new(
                    "name",
                    types::string_matching(
                        r"^[0-9a-z]([-0-9a-z]{0,61}[0-9a-z])?$",
                        "server names may only contain lowercase letters, numbers and hyphens, cannot start or end with a hyphen, and must be 1-63 characters long",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("resource_group_name", types::resource_group_name())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("location", types::location())
                    .required()
                    .force_new()
                    .with_normalizer(normalize_location_value),
            )
            .attribute(AttributeSchema::new("version", types::one_of(&["2.0", "12.0"])).required())
            .attribute(
                AttributeSchema::new("administrator_login", types::non_empty_string())
                    .computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("administrator_login_password", AttributeType::String)
                    .sensitive(),
            )
            .attribute(
                AttributeSchema::new(
                    "minimum_tls_version",
                    types::one_of(&["1.0", "1.1", "1.2", "Disabled"]),
                )
                .with_default("1.2"),
            )
            .attribute(
                AttributeSchema::new("public_network_access_enabled", AttributeType::Bool)
                    .with_default(true),
            )
            .attribute(
                AttributeSchema::new("fully_qualified_domain_name", AttributeType::String)
                    .read_only(),
            )
            .attribute(AttributeSchema::new("tags", types::tags()))
            .with_timeouts(Timeouts::minutes(60, 5, 60, 60))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        MssqlServerId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let id = MssqlServerId::new(
            &ctx.subscription_id,
            resource.get_str("resource_group_name").unwrap_or_default(),
            resource.get_str("name").unwrap_or_default(),
        );
        let client = &ctx.clients.mssql.servers;

        check_requires_import(ctx, client, &id, self.resource_type()).await?;

        let server = client
            .create_or_update(&id, &expand(resource))
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&server, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = MssqlServerId::parse(id)?;
        let server = ctx
            .clients
            .mssql
            .servers
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match server {
            Some(server) => State::existing(address.clone(), flatten(&server, &id)).with_id(id.id()),
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
        let id = MssqlServerId::parse(id)?;
        let server = ctx
            .clients
            .mssql
            .servers
            .create_or_update(&id, &expand(to))
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&server, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = MssqlServerId::parse(id)?;
        ctx.clients
            .mssql
            .servers
            .delete(&id)
            .await
            .map_err(|e| arm_error("deleting", &id, e))?;
        info!("deleted {}", id);
        Ok(())
    }
}
