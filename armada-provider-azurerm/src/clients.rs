//! Client bundle
//!
//! One typed [`ResourceClient`] per resource type, grouped by Azure service.
//! The bundle is built once per provider instance and shared read-only.

use crate::arm::{ArmClient, ResourceClient};
use crate::ids::{
    MetricAlertId, MssqlDatabaseId, MssqlServerId, RegistrationDefinitionId, ResourceGroupId,
    ShortTermRetentionPolicyId, TransformId,
};
use crate::services::managedservices::models::RegistrationDefinition;
use crate::services::media::models::Transform;
use crate::services::monitor::models::MetricAlert;
use crate::services::mssql::models::{BackupShortTermRetentionPolicy, Database, Server};
use crate::services::resource::models::ResourceGroup;

pub mod api_versions {
    pub const RESOURCES: &str = "2020-06-01";
    pub const MSSQL: &str = "2021-11-01";
    pub const MONITOR_METRIC_ALERTS: &str = "2018-03-01";
    pub const MEDIA: &str = "2021-11-01";
    pub const MANAGED_SERVICES: &str = "2019-06-01";
}

pub struct ResourcesClients {
    pub resource_groups: ResourceClient<ResourceGroupId, ResourceGroup>,
}

pub struct MssqlClients {
    pub servers: ResourceClient<MssqlServerId, Server>,
    pub databases: ResourceClient<MssqlDatabaseId, Database>,
    pub short_term_retention_policies:
        ResourceClient<ShortTermRetentionPolicyId, BackupShortTermRetentionPolicy>,
}

pub struct MonitorClients {
    pub metric_alerts: ResourceClient<MetricAlertId, MetricAlert>,
}

pub struct MediaClients {
    pub transforms: ResourceClient<TransformId, Transform>,
}

pub struct ManagedServicesClients {
    pub registration_definitions: ResourceClient<RegistrationDefinitionId, RegistrationDefinition>,
}

/// All service clients of one provider instance
pub struct Clients {
    arm: ArmClient,
    pub resources: ResourcesClients,
    pub mssql: MssqlClients,
    pub monitor: MonitorClients,
    pub media: MediaClients,
    pub managed_services: ManagedServicesClients,
}

impl Clients {
    pub fn new(arm: ArmClient) -> Self {
        use api_versions::*;

        Self {
            resources: ResourcesClients {
                resource_groups: ResourceClient::new(arm.clone(), RESOURCES),
            },
            mssql: MssqlClients {
                servers: ResourceClient::new(arm.clone(), MSSQL),
                databases: ResourceClient::new(arm.clone(), MSSQL),
                short_term_retention_policies: ResourceClient::new(arm.clone(), MSSQL),
            },
            monitor: MonitorClients {
                metric_alerts: ResourceClient::new(arm.clone(), MONITOR_METRIC_ALERTS),
            },
            media: MediaClients {
                transforms: ResourceClient::new(arm.clone(), MEDIA),
            },
            managed_services: ManagedServicesClients {
                registration_definitions: ResourceClient::new(arm.clone(), MANAGED_SERVICES),
            },
            arm,
        }
    }

    /// Shared ARM client (poller settings, cancellation)
    pub fn arm(&self) -> &ArmClient {
        &self.arm
    }

    /// Service groups in this bundle, for diagnostics
    pub fn service_names() -> &'static [&'static str] {
        &["managed_services", "media", "monitor", "mssql", "resources"]
    }
}
