use async_trait::async_trait;

use armada_core::provider::{DataSourceHandler, ProviderError, ProviderResult};
use armada_core::resource::{Resource, State};
use armada_core::resource_id::ResourceIdentifier;
use armada_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Timeouts, types};

use super::server_resource::flatten;
use crate::context::ProviderContext;
use crate::ids::MssqlServerId;
use crate::services::arm_error;

pub struct ServerDataSource;

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).read_only()
}

#[async_trait]
impl DataSourceHandler<ProviderContext> for ServerDataSource {
    fn resource_type(&self) -> &'static str {
        "azurerm_mssql_server"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("resource_group_name", types::resource_group_name()).required(),
            )
            .attribute(computed("location", types::location()))
            .attribute(computed("version", AttributeType::String))
            .attribute(computed("administrator_login", AttributeType::String))
            .attribute(computed("minimum_tls_version", AttributeType::String))
            .attribute(computed("public_network_access_enabled", AttributeType::Bool))
            .attribute(computed("fully_qualified_domain_name", AttributeType::String))
            .attribute(computed("tags", types::tags()))
            .with_timeouts(Timeouts::minutes(0, 5, 0, 0))
    }

    async fn read(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let id = MssqlServerId::new(
            &ctx.subscription_id,
            resource.get_str("resource_group_name").unwrap_or_default(),
            resource.get_str("name").unwrap_or_default(),
        );

        let server = ctx
            .clients
            .mssql
            .servers
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?
            .ok_or_else(|| ProviderError::not_found(format!("{} was not found", id)))?;

        Ok(State::existing(resource.address.clone(), flatten(&server, &id)).with_id(id.id()))
    }
}
