//! Azure SQL: servers, databases and their short term backup retention

mod database_resource;
pub mod models;
mod server_data_source;
mod server_resource;
mod short_term_retention_policy_resource;

pub use database_resource::DatabaseResource;
pub use server_data_source::ServerDataSource;
pub use server_resource::ServerResource;
pub use short_term_retention_policy_resource::ShortTermRetentionPolicyResource;

use armada_core::lifecycle::Lifecycle;

use crate::context::ProviderContext;

pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    lifecycle
        .with_resource(ServerResource)
        .with_resource(DatabaseResource)
        .with_resource(ShortTermRetentionPolicyResource)
        .with_data_source(ServerDataSource)
}
