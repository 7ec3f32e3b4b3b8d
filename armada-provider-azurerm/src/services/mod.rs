//! Resource handlers and data sources, grouped by Azure service
//!
//! Each service module exposes `register`, which adds its handlers to the
//! provider lifecycle.

pub mod managedservices;
pub mod media;
pub mod monitor;
pub mod mssql;
pub mod resource;

use std::fmt;

use armada_core::lifecycle::Lifecycle;
use armada_core::provider::{ProviderError, ProviderResult};
use armada_core::resource::{ResourceAddress, State};
use armada_core::resource_id::ResourceIdentifier;
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::arm::{ArmError, ResourceClient};
use crate::context::ProviderContext;

/// Register every resource type and data source
pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    let lifecycle = resource::register(lifecycle);
    let lifecycle = mssql::register(lifecycle);
    let lifecycle = monitor::register(lifecycle);
    let lifecycle = media::register(lifecycle);
    managedservices::register(lifecycle)
}

/// Wrap a client error with the action and the resource it was acting on
pub(crate) fn arm_error(action: &str, id: &dyn fmt::Display, e: ArmError) -> ProviderError {
    ProviderError::from(e).context(format!("{} {}", action, id))
}

/// Fail when a resource about to be created already exists outside of state
pub(crate) async fn check_requires_import<I, M>(
    ctx: &ProviderContext,
    client: &ResourceClient<I, M>,
    id: &I,
    resource_type: &str,
) -> ProviderResult<()>
where
    I: ResourceIdentifier + fmt::Display + Sync,
    M: Serialize + DeserializeOwned + Sync,
{
    if ctx.features.import_existing_on_create {
        return Ok(());
    }
    match client.get_optional(id).await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err(ProviderError::requires_import(resource_type, &id.id())),
        Err(e) => Err(arm_error("checking for presence of existing", id, e)),
    }
}

/// State for a resource that disappeared remotely
pub(crate) fn gone(address: &ResourceAddress, id: &dyn fmt::Display) -> State {
    info!("{} was not found - removing from state", id);
    State::not_found(address.clone())
}
