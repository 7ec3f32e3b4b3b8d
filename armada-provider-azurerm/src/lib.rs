//! Armada Azure Resource Manager Provider
//!
//! Lifecycle handlers for AzureRM resource types on top of the ARM REST API.
//!
//! ## Module Structure
//!
//! - `config` - Provider settings read from `ARM_*` variables
//! - `transport` - reqwest transport with bearer auth and retries
//! - `arm` - ARM error classification, LRO following, typed resource clients
//! - `clients` - Client bundle shared by every handler
//! - `ids` - Typed resource IDs
//! - `services` - Resource handlers and data sources per Azure service
//! - `acceptance` - Helpers for tests against live Azure

pub mod acceptance;
pub mod arm;
pub mod clients;
pub mod config;
pub mod context;
pub mod ids;
pub mod services;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use armada_core::lifecycle::Lifecycle;
use log::debug;
use tokio_util::sync::CancellationToken;

pub use config::{Environment, Features, ProviderConfig};
pub use context::ProviderContext;

use arm::ArmClient;
use clients::Clients;
use transport::{HttpTransport, Transport, TransportError};

/// Name the provider registers under
pub const PROVIDER_NAME: &str = "azurerm";

/// Build the provider over an explicit transport
pub fn provider(
    config: &ProviderConfig,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) -> Lifecycle<ProviderContext> {
    let arm = ArmClient::new(transport, config.poller, cancel);
    let clients = Arc::new(Clients::new(arm));
    debug!(
        "configured {} clients for subscription {}",
        Clients::service_names().join(", "),
        config.subscription_id
    );

    let ctx = ProviderContext::new(clients, &config.subscription_id, config.features);
    services::register(Lifecycle::new(PROVIDER_NAME, ctx))
}

/// Build the provider talking HTTP to the configured Resource Manager endpoint
pub fn from_config(
    config: &ProviderConfig,
    cancel: CancellationToken,
) -> Result<Lifecycle<ProviderContext>, TransportError> {
    let transport = HttpTransport::from_config(config)?;
    Ok(provider(config, Arc::new(transport), cancel))
}
