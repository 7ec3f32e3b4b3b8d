//! Typed context handed to every resource handler

use std::sync::Arc;

use crate::clients::Clients;
use crate::config::Features;

pub struct ProviderContext {
    pub clients: Arc<Clients>,
    /// Subscription new resources are created in
    pub subscription_id: String,
    pub features: Features,
}

impl ProviderContext {
    pub fn new(clients: Arc<Clients>, subscription_id: impl Into<String>, features: Features) -> Self {
        Self {
            clients,
            subscription_id: subscription_id.into(),
            features,
        }
    }
}
