//! Resource groups

pub mod models;
mod resource_group_data_source;
mod resource_group_resource;

pub use resource_group_data_source::ResourceGroupDataSource;
pub use resource_group_resource::ResourceGroupResource;

use armada_core::lifecycle::Lifecycle;

use crate::context::ProviderContext;

pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    lifecycle
        .with_resource(ResourceGroupResource)
        .with_data_source(ResourceGroupDataSource)
}
