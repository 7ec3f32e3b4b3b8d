//! Azure Monitor: metric alerts

mod metric_alert_resource;
pub mod models;

pub use metric_alert_resource::MetricAlertResource;

use armada_core::lifecycle::Lifecycle;

use crate::context::ProviderContext;

pub fn register(lifecycle: Lifecycle<ProviderContext>) -> Lifecycle<ProviderContext> {
    lifecycle.with_resource(MetricAlertResource)
}
