use async_trait::async_trait;
use log::info;

use armada_core::provider::{ProviderError, ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{
    AttributeSchema, AttributeType, ResourceSchema, Timeouts, Validator, types,
};

use super::models::{Database, DatabaseProperties, DatabaseUpdate, Sku};
use crate::context::ProviderContext;
use crate::ids::{MssqlDatabaseId, MssqlServerId};
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{expand_tags, flatten_tags, set};

const BYTES_PER_GB: i64 = 1_073_741_824;

/// Databases in an elastic pool carry this pseudo SKU in configuration
const ELASTIC_POOL_SKU: &str = "ElasticPool";

pub struct DatabaseResource;

fn auto_pause_delay() -> AttributeType {
    AttributeType::Custom {
        name: "AutoPauseDelay".to_string(),
        base: Box::new(AttributeType::Int),
        validate: Validator::new(|value| match value {
            Value::Int(-1) => Ok(()),
            Value::Int(n) if (60..=10080).contains(n) => Ok(()),
            Value::Int(n) => Err(format!(
                "expected -1 (disabled) or between 60 and 10080 minutes, got {}",
                n
            )),
            _ => Err("Expected integer".to_string()),
        }),
    }
}

/// Serverless SKUs (`GP_S_*`) are billed per vCore second and take no license
fn check_license_type(resource: &Resource) -> ProviderResult<()> {
    let serverless = resource
        .get_str("sku_name")
        .is_some_and(|sku| sku.starts_with("GP_S_"));
    if serverless && resource.get_str("license_type").is_some() {
        return Err(ProviderError::validation(
            "serverless databases do not support license type",
        ));
    }
    Ok(())
}

fn expand_sku(resource: &Resource) -> Option<Sku> {
    resource
        .get_str("sku_name")
        .filter(|name| *name != ELASTIC_POOL_SKU)
        .map(|name| Sku {
            name: name.to_string(),
            ..Sku::default()
        })
}

fn expand_read_scale(resource: &Resource) -> Option<String> {
    resource
        .get_bool("read_scale")
        .map(|enabled| if enabled { "Enabled" } else { "Disabled" }.to_string())
}

fn expand_properties(resource: &Resource) -> DatabaseProperties {
    let string = |key: &str| resource.get_str(key).map(str::to_string);
    DatabaseProperties {
        auto_pause_delay: resource.get_int("auto_pause_delay_in_minutes").map(|v| v as i32),
        collation: string("collation"),
        create_mode: string("create_mode"),
        elastic_pool_id: string("elastic_pool_id"),
        license_type: string("license_type"),
        max_size_bytes: resource.get_int("max_size_gb").map(|gb| gb * BYTES_PER_GB),
        min_capacity: resource.get_float("min_capacity"),
        high_availability_replica_count: resource.get_int("read_replica_count").map(|v| v as i32),
        read_scale: expand_read_scale(resource),
        requested_backup_storage_redundancy: string("storage_account_type"),
        sample_name: string("sample_name"),
        zone_redundant: resource.get_bool("zone_redundant"),
        ..DatabaseProperties::default()
    }
}

/// PATCH body carrying only the attributes in `changed`
fn expand_update(resource: &Resource, changed: &[String]) -> DatabaseUpdate {
    let has = |key: &str| changed.iter().any(|c| c == key);
    let all = expand_properties(resource);

    let properties = DatabaseProperties {
        auto_pause_delay: all.auto_pause_delay.filter(|_| has("auto_pause_delay_in_minutes")),
        elastic_pool_id: all.elastic_pool_id.filter(|_| has("elastic_pool_id")),
        license_type: all.license_type.filter(|_| has("license_type")),
        max_size_bytes: all.max_size_bytes.filter(|_| has("max_size_gb")),
        min_capacity: all.min_capacity.filter(|_| has("min_capacity")),
        high_availability_replica_count: all
            .high_availability_replica_count
            .filter(|_| has("read_replica_count")),
        read_scale: all.read_scale.filter(|_| has("read_scale")),
        requested_backup_storage_redundancy: all
            .requested_backup_storage_redundancy
            .filter(|_| has("storage_account_type")),
        zone_redundant: all.zone_redundant.filter(|_| has("zone_redundant")),
        ..DatabaseProperties::default()
    };

    DatabaseUpdate {
        sku: expand_sku(resource).filter(|_| has("sku_name")),
        properties: (properties != DatabaseProperties::default()).then_some(properties),
        tags: expand_tags(resource.get("tags")).filter(|_| has("tags")),
    }
}

fn flatten(database: &Database, id: &MssqlDatabaseId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), Value::String(id.database_name.clone()));
    attributes.insert("server_id".to_string(), Value::String(id.server_id().id()));
    attributes.insert("tags".to_string(), flatten_tags(database.tags.as_ref()));

    let props = database.properties.clone().unwrap_or_default();
    let sku_name = match (&props.elastic_pool_id, &database.sku) {
        (Some(_), _) => Some(ELASTIC_POOL_SKU.to_string()),
        (None, Some(sku)) => Some(sku.name.clone()),
        (None, None) => None,
    };
    set(&mut attributes, "sku_name", sku_name);
    set(
        &mut attributes,
        "auto_pause_delay_in_minutes",
        props.auto_pause_delay.map(i64::from),
    );
    set(&mut attributes, "collation", props.collation);
    set(
        &mut attributes,
        "create_mode",
        Some(props.create_mode.unwrap_or_else(|| "Default".to_string())),
    );
    set(&mut attributes, "elastic_pool_id", props.elastic_pool_id);
    set(&mut attributes, "license_type", props.license_type);
    set(
        &mut attributes,
        "max_size_gb",
        props.max_size_bytes.map(|bytes| bytes / BYTES_PER_GB),
    );
    set(&mut attributes, "min_capacity", props.min_capacity);
    set(
        &mut attributes,
        "read_replica_count",
        props.high_availability_replica_count.map(i64::from),
    );
    set(
        &mut attributes,
        "read_scale",
        props.read_scale.map(|v| v.eq_ignore_ascii_case("Enabled")),
    );
    set(&mut attributes, "sample_name", props.sample_name);
    set(
        &mut attributes,
        "storage_account_type",
        props
            .requested_backup_storage_redundancy
            .or(props.current_backup_storage_redundancy),
    );
    set(&mut attributes, "zone_redundant", props.zone_redundant);
    attributes
}

#[async_trait]
impl ResourceHandler<ProviderContext> for DatabaseResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_mssql_database"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("A database on an Azure SQL server")
            .attribute(
                AttributeSchema::new(
                    "name",
                    types::string_matching(
                        r"^[^<>*%&:\\/?]{0,127}[^\s.<>*%&:\\/?]$",
                        "database names cannot contain <>*%&:\\/? or end with a period or whitespace, and must be 1-128 characters long",
                    ),
                )
                .required()
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("server_id", types::typed_id::<MssqlServerId>("ServerId"))
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("auto_pause_delay_in_minutes", auto_pause_delay()).computed())
            .attribute(
                AttributeSchema::new(
                    "create_mode",
                    types::one_of(&[
                        "Copy",
                        "Default",
                        "OnlineSecondary",
                        "PointInTimeRestore",
                        "Recovery",
                        "Restore",
                        "RestoreExternalBackup",
                        "RestoreExternalBackupSecondary",
                        "RestoreLongTermRetentionBackup",
                        "Secondary",
                    ]),
                )
                .with_default("Default")
                .force_new(),
            )
            .attribute(
                AttributeSchema::new("collation", types::non_empty_string())
                    .computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("elastic_pool_id", types::resource_id()))
            .attribute(
                AttributeSchema::new("license_type", types::one_of(&["BasePrice", "LicenseIncluded"]))
                    .computed(),
            )
            .attribute(AttributeSchema::new("max_size_gb", types::int_between(1, 4096)).computed())
            .attribute(AttributeSchema::new("min_capacity", AttributeType::Float).computed())
            .attribute(AttributeSchema::new("read_replica_count", types::int_between(0, 4)).computed())
            .attribute(AttributeSchema::new("read_scale", AttributeType::Bool).computed())
            .attribute(AttributeSchema::new("sample_name", types::one_of(&["AdventureWorksLT"])).computed())
            .attribute(AttributeSchema::new("sku_name", types::non_empty_string()).computed())
            .attribute(
                AttributeSchema::new("storage_account_type", types::one_of(&["Geo", "Local", "Zone"]))
                    .with_default("Geo"),
            )
            .attribute(AttributeSchema::new("zone_redundant", AttributeType::Bool).computed())
            .attribute(AttributeSchema::new("tags", types::tags()))
            .with_timeouts(Timeouts::minutes(60, 5, 60, 60))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        MssqlDatabaseId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        check_license_type(resource)?;

        let server_id = MssqlServerId::parse(resource.get_str("server_id").unwrap_or_default())?;
        let id = MssqlDatabaseId::new(
            &server_id.subscription_id,
            &server_id.resource_group_name,
            &server_id.server_name,
            resource.get_str("name").unwrap_or_default(),
        );
        let client = &ctx.clients.mssql.databases;

        check_requires_import(ctx, client, &id, self.resource_type()).await?;

        // databases live in their server's region
        let server = ctx
            .clients
            .mssql
            .servers
            .get(&server_id)
            .await
            .map_err(|e| arm_error("retrieving", &server_id, e))?;
        if server.location.is_empty() {
            return Err(ProviderError::new(format!(
                "reading {}: Location was nil/empty",
                server_id
            )));
        }

        let database = Database {
            location: server.location,
            tags: expand_tags(resource.get("tags")),
            sku: expand_sku(resource),
            properties: Some(expand_properties(resource)),
            ..Database::default()
        };
        let database = client
            .create_or_update(&id, &database)
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&database, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = MssqlDatabaseId::parse(id)?;
        let database = ctx
            .clients
            .mssql
            .databases
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match database {
            Some(database) => {
                State::existing(address.clone(), flatten(&database, &id)).with_id(id.id())
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
        changed: &[String],
    ) -> ProviderResult<State> {
        check_license_type(to)?;

        let id = MssqlDatabaseId::parse(id)?;
        let database = ctx
            .clients
            .mssql
            .databases
            .update(&id, &expand_update(to, changed))
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&database, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = MssqlDatabaseId::parse(id)?;
        ctx.clients
            .mssql
            .databases
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
    use serde_json::json;

    use crate::testing::{FakeArm, SUBSCRIPTION_ID, provider};

    use super::*;

    fn server_id() -> String {
        format!(
            "/subscriptions/{}/resourceGroups/acctestRG-1/providers/Microsoft.Sql/servers/acctestsqlserver1",
            SUBSCRIPTION_ID
        )
    }

    fn database_id() -> String {
        format!("{}/databases/acctest-db-1", server_id())
    }

    fn fake_with_server() -> Arc<FakeArm> {
        Arc::new(FakeArm::new().with_resource(
            &server_id(),
            json!({"location": "westeurope", "properties": {"version": "12.0"}}),
        ))
    }

    fn database() -> Resource {
        Resource::new("azurerm_mssql_database", "test")
            .with_attribute("name", "acctest-db-1")
            .with_attribute("server_id", server_id())
            .with_attribute("collation", "SQL_AltDiction_CP850_CI_AI")
            .with_attribute("license_type", "BasePrice")
            .with_attribute("max_size_gb", 10i64)
            .with_attribute("sku_name", "GP_Gen5_2")
    }

    #[tokio::test]
    async fn create_uses_server_location_and_converts_size() {
        let fake = fake_with_server();
        let provider = provider(fake.clone());

        let state = provider.create(&database()).await.unwrap();
        assert_eq!(state.id, Some(database_id()));
        assert_eq!(state.get("max_size_gb"), Some(&Value::Int(10)));
        assert_eq!(state.get("create_mode"), Some(&Value::from("Default")));
        assert_eq!(state.get("storage_account_type"), Some(&Value::from("Geo")));

        let stored = fake.resource(&database_id()).unwrap();
        assert_eq!(stored["location"], "westeurope");
        assert_eq!(stored["sku"]["name"], "GP_Gen5_2");
        assert_eq!(stored["properties"]["maxSizeBytes"], 10 * BYTES_PER_GB);
    }

    #[tokio::test]
    async fn plan_after_create_is_no_change() {
        let provider = provider(fake_with_server());
        let state = provider.create(&database()).await.unwrap();

        let read = provider.read(&state.address, &database_id()).await.unwrap();
        assert_eq!(provider.plan(&database(), &read).unwrap(), Diff::NoChange);

        let local = database().with_attribute("storage_account_type", "Local");
        assert_eq!(
            provider.plan(&local, &read).unwrap(),
            Diff::Update {
                changed: vec!["storage_account_type".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn serverless_rejects_license_type() {
        let provider = provider(fake_with_server());
        let err = provider
            .create(&database().with_attribute("sku_name", "GP_S_Gen5_2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("serverless databases do not support license type"));
    }

    #[tokio::test]
    async fn missing_server_fails_create() {
        let provider = provider(Arc::new(FakeArm::new()));
        let err = provider.create(&database()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains(r#"retrieving SQL Server "acctestsqlserver1""#));
    }

    #[tokio::test]
    async fn update_patches_only_changed_fields() {
        let fake = fake_with_server();
        let provider = provider(fake.clone());
        let state = provider.create(&database()).await.unwrap();

        let updated = provider
            .update(
                &database_id(),
                &state,
                &database()
                    .with_attribute("max_size_gb", 2i64)
                    .with_attribute("license_type", "LicenseIncluded"),
            )
            .await
            .unwrap();
        assert_eq!(updated.get("max_size_gb"), Some(&Value::Int(2)));
        assert_eq!(updated.get("license_type"), Some(&Value::from("LicenseIncluded")));
        assert_eq!(
            updated.get("collation"),
            Some(&Value::from("SQL_AltDiction_CP850_CI_AI"))
        );

        let last = fake.requests().pop().unwrap();
        assert_eq!(last, (Method::PATCH, database_id()));
    }

    #[test]
    fn update_body_is_minimal() {
        let patch = expand_update(&database(), &["tags".to_string(), "max_size_gb".to_string()]);
        assert_eq!(patch.sku, None);
        assert_eq!(patch.tags, None);
        let props = patch.properties.unwrap();
        assert_eq!(props.max_size_bytes, Some(10 * BYTES_PER_GB));
        assert_eq!(props.license_type, None);
        assert_eq!(props.collation, None);
    }

    #[test]
    fn elastic_pool_databases_send_no_sku() {
        let resource = database().with_attribute("sku_name", ELASTIC_POOL_SKU);
        assert_eq!(expand_sku(&resource), None);
    }

    #[test]
    fn auto_pause_delay_bounds() {
        let t = auto_pause_delay();
        assert!(t.validate(&Value::Int(-1)).is_ok());
        assert!(t.validate(&Value::Int(60)).is_ok());
        assert!(t.validate(&Value::Int(30)).is_err());
        assert!(t.validate(&Value::Int(10081)).is_err());
    }
}
