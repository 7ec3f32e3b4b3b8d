//! Media Services: encoding transforms

pub mod models;
mod transform_resource;

pub use transform_resource::TransformResource;

use armada_core::lifecycle::Lifecycle;

use crate::context::ProviderContext;

pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    lifecycle.with_resource(TransformResource)
}
