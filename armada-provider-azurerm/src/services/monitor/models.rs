use std::collections::HashMap;

use armada_core::odata_union;
use serde::{Deserialize, Serialize};

use crate::utils::Tags;

pub const SINGLE_RESOURCE_MULTIPLE_METRIC_CRITERIA: &str =
    "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria";
pub const MULTIPLE_RESOURCE_MULTIPLE_METRIC_CRITERIA: &str =
    "Microsoft.Azure.Monitor.MultipleResourceMultipleMetricCriteria";
pub const WEBTEST_LOCATION_AVAILABILITY_CRITERIA: &str =
    "Microsoft.Azure.Monitor.WebtestLocationAvailabilityCriteria";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    pub properties: MetricAlertProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlertProperties {
    #[serde(default)]
    pub description: String,
    pub severity: i32,
    pub enabled: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// ISO 8601 duration, e.g. `PT1M`
    pub evaluation_frequency: String,
    pub window_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_resource_region: Option<String>,
    pub criteria: MetricAlertCriteria,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mitigate: Option<bool>,
    #[serde(default)]
    pub actions: Vec<MetricAlertAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAlertAction {
    pub action_group_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub web_hook_properties: HashMap<String, String>,
}

odata_union! {
    /// Criteria of a metric alert, tagged by `odata.type`
    pub enum MetricAlertCriteria = "odata.type" {
        /// Legacy shape, only produced for alerts that already use it
        SingleResourceMultipleMetric(MultipleMetricCriteria) =
            "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria",
        MultipleResourceMultipleMetric(MultipleMetricCriteria) =
            "Microsoft.Azure.Monitor.MultipleResourceMultipleMetricCriteria",
        WebtestLocationAvailability(WebtestLocationAvailabilityCriteria) =
            "Microsoft.Azure.Monitor.WebtestLocationAvailabilityCriteria",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleMetricCriteria {
    #[serde(default)]
    pub all_of: Vec<MultiMetricCriteria>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebtestLocationAvailabilityCriteria {
    pub web_test_id: String,
    pub component_id: String,
    pub failed_location_count: f64,
}

odata_union! {
    /// One condition of a multi-metric alert, tagged by `criterionType`
    pub enum MultiMetricCriteria = "criterionType" {
        StaticThreshold(MetricCriteria) = "StaticThresholdCriterion",
        DynamicThreshold(DynamicMetricCriteria) = "DynamicThresholdCriterion",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDimension {
    pub name: String,
    /// `Include` or `Exclude`
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCriteria {
    pub name: String,
    pub metric_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_namespace: Option<String>,
    pub time_aggregation: String,
    #[serde(default)]
    pub dimensions: Vec<MetricDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_metric_validation: Option<bool>,
    pub operator: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicThresholdFailingPeriods {
    pub number_of_evaluation_periods: f64,
    pub min_failing_periods_to_alert: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicMetricCriteria {
    pub name: String,
    pub metric_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_namespace: Option<String>,
    pub time_aggregation: String,
    #[serde(default)]
    pub dimensions: Vec<MetricDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_metric_validation: Option<bool>,
    pub operator: String,
    pub alert_sensitivity: String,
    pub failing_periods: DynamicThresholdFailingPeriods,
    /// RFC 3339 timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_data_before: Option<String>,
}
