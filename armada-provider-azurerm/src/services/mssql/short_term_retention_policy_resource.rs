//! Short term backup retention of a single database
//!
//! The policy is a singleton child of the database that always exists, so
//! create never checks for an existing policy and delete restores the service
//! defaults instead of removing anything.

use async_trait::async_trait;
use log::info;

use armada_core::provider::{ProviderError, ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{AttributeSchema, ResourceSchema, Timeouts, types};

use super::models::{BackupShortTermRetentionPolicy, BackupShortTermRetentionPolicyProperties};
use crate::context::ProviderContext;
use crate::ids::{MssqlDatabaseId, ShortTermRetentionPolicyId};
use crate::services::{arm_error, gone};
use crate::utils::set;

const DEFAULT_RETENTION_DAYS: i32 = 7;
const DEFAULT_BACKUP_INTERVAL_IN_HOURS: i32 = 12;

pub struct ShortTermRetentionPolicyResource;

fn policy(retention_days: i32, backup_interval_in_hours: i32) -> BackupShortTermRetentionPolicy {
    BackupShortTermRetentionPolicy {
        properties: Some(BackupShortTermRetentionPolicyProperties {
            retention_days: Some(retention_days),
            diff_backup_interval_in_hours: Some(backup_interval_in_hours),
        }),
        ..BackupShortTermRetentionPolicy::default()
    }
}

fn expand(resource: &Resource) -> BackupShortTermRetentionPolicy {
    policy(
        resource
            .get_int("retention_days")
            .map_or(DEFAULT_RETENTION_DAYS, |v| v as i32),
        resource
            .get_int("backup_interval_in_hours")
            .map_or(DEFAULT_BACKUP_INTERVAL_IN_HOURS, |v| v as i32),
    )
}

fn flatten(policy: &BackupShortTermRetentionPolicy, id: &ShortTermRetentionPolicyId) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        "database_id".to_string(),
        Value::String(id.database_id().id()),
    );
    if let Some(props) = &policy.properties {
        set(&mut attributes, "retention_days", props.retention_days.map(i64::from));
        set(
            &mut attributes,
            "backup_interval_in_hours",
            props.diff_backup_interval_in_hours.map(i64::from),
        );
    }
    attributes
}

#[async_trait]
impl ResourceHandler<ProviderContext> for ShortTermRetentionPolicyResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_mssql_database_short_term_retention_policy"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("Point-in-time restore retention of an Azure SQL database")
            .attribute(
                AttributeSchema::new(
                    "database_id",
                    types::typed_id::<MssqlDatabaseId>("DatabaseId"),
                )
                .required()
                .force_new(),
            )
            .attribute(AttributeSchema::new("retention_days", types::int_between(1, 35)).required())
            .attribute(
                AttributeSchema::new("backup_interval_in_hours", types::int_in(&[12, 24]))
                    .with_default(i64::from(DEFAULT_BACKUP_INTERVAL_IN_HOURS)),
            )
            .with_timeouts(Timeouts::minutes(60, 5, 60, 60))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        ShortTermRetentionPolicyId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let database_id = MssqlDatabaseId::parse(resource.get_str("database_id").unwrap_or_default())?;
        let id = database_id.short_term_retention_policy_id();

        ctx.clients
            .mssql
            .databases
            .get_optional(&database_id)
            .await
            .map_err(|e| arm_error("retrieving", &database_id, e))?
            .ok_or_else(|| ProviderError::not_found(format!("{} was not found", database_id)))?;

        let policy = ctx
            .clients
            .mssql
            .short_term_retention_policies
            .create_or_update(&id, &expand(resource))
            .await
            .map_err(|e| arm_error("creating", &id, e))?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&policy, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = ShortTermRetentionPolicyId::parse(id)?;
        let policy = ctx
            .clients
            .mssql
            .short_term_retention_policies
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match policy {
            Some(policy) => State::existing(address.clone(), flatten(&policy, &id)).with_id(id.id()),
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
        let id = ShortTermRetentionPolicyId::parse(id)?;
        let policy = ctx
            .clients
            .mssql
            .short_term_retention_policies
            .create_or_update(&id, &expand(to))
            .await
            .map_err(|e| arm_error("updating", &id, e))?;

        Ok(State::existing(to.address.clone(), flatten(&policy, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = ShortTermRetentionPolicyId::parse(id)?;
        ctx.clients
            .mssql
            .short_term_retention_policies
            .create_or_update(
                &id,
                &policy(DEFAULT_RETENTION_DAYS, DEFAULT_BACKUP_INTERVAL_IN_HOURS),
            )
            .await
            .map_err(|e| arm_error("resetting", &id, e))?;
        info!("reset {} to {} days", id, DEFAULT_RETENTION_DAYS);
        Ok(())
    }
}
