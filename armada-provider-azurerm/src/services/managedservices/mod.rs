//! Managed Services (Azure Lighthouse): registration definitions

pub mod models;
mod registration_definition_resource;

pub use registration_definition_resource::RegistrationDefinitionResource;

use armada_core::lifecycle::Lifecycle;

use crate::context::ProviderContext;

pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    lifecycle.with_resource(RegistrationDefinitionResource)
}
