//! Metric alert rules
//!
//! Alerts are global resources. New alerts always use the multiple-resource
//! criteria shape; alerts created with the older single-resource shape keep
//! it on update because the service rejects changing the criteria type.
//!
//! Freshly written alerts can briefly read as 404 when several are created in
//! parallel, so every write waits until the alert has been readable for
//! [`VISIBLE_READS`] polls in a row.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info};

use armada_core::lro::{PollStatus, poll_fn, poll_until_done};
use armada_core::provider::{ProviderError, ProviderResult, ResourceHandler};
use armada_core::resource::{Attributes, Resource, ResourceAddress, State, Value, blocks};
use armada_core::resource_id::{ResourceIdError, ResourceIdentifier};
use armada_core::schema::{
    AttributeSchema, AttributeType, BlockSchema, ResourceSchema, Timeouts, Validator, types,
};

use super::models::{
    DynamicMetricCriteria, DynamicThresholdFailingPeriods, MetricAlert, MetricAlertAction,
    MetricAlertCriteria, MetricAlertProperties, MetricCriteria, MetricDimension,
    MultiMetricCriteria, MultipleMetricCriteria, WebtestLocationAvailabilityCriteria,
};
use crate::arm::ResourceClient;
use crate::context::ProviderContext;
use crate::ids::MetricAlertId;
use crate::services::{arm_error, check_requires_import, gone};
use crate::utils::{
    block_bool, block_float, block_int, block_str, expand_string_list, expand_string_map,
    expand_tags, flatten_string_list, flatten_string_map, flatten_tags, set,
};

/// Successful reads in a row before a written alert counts as visible
pub const VISIBLE_READS: u32 = 10;

const STATIC_CRITERIA: &str = "criteria";
const DYNAMIC_CRITERIA: &str = "dynamic_criteria";
const WEBTEST_CRITERIA: &str = "application_insights_web_test_location_availability_criteria";

const AGGREGATIONS: &[&str] = &["Average", "Count", "Minimum", "Maximum", "Total"];
const FREQUENCIES: &[&str] = &["PT1M", "PT5M", "PT15M", "PT30M", "PT1H"];
const WINDOW_SIZES: &[&str] = &["PT1M", "PT5M", "PT15M", "PT30M", "PT1H", "PT6H", "PT12H", "P1D"];

pub struct MetricAlertResource;

type MetricAlertClient = ResourceClient<MetricAlertId, MetricAlert>;

fn scopes() -> AttributeType {
    AttributeType::Custom {
        name: "Scopes".to_string(),
        base: Box::new(AttributeType::List(Box::new(types::resource_id()))),
        validate: Validator::new(|value| match value.as_list() {
            Some(items) if !items.is_empty() => Ok(()),
            _ => Err("at least one scope is required".to_string()),
        }),
    }
}

fn dimension_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
        .attribute(
            AttributeSchema::new("operator", types::one_of(&["Include", "Exclude"]))
                .with_default("Include"),
        )
        .attribute(
            AttributeSchema::new("values", AttributeType::List(Box::new(AttributeType::String)))
                .required(),
        )
        .into_type()
}

/// Attributes shared by static and dynamic criteria
fn metric_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(AttributeSchema::new("metric_namespace", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("metric_name", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("aggregation", types::one_of(AGGREGATIONS)).required())
        .attribute(AttributeSchema::new("dimension", dimension_block()))
        .attribute(
            AttributeSchema::new("skip_metric_validation", AttributeType::Bool).with_default(false),
        )
}

fn static_criteria_block() -> AttributeType {
    metric_block()
        .attribute(
            AttributeSchema::new(
                "operator",
                types::one_of(&[
                    "Equals",
                    "NotEquals",
                    "GreaterThan",
                    "GreaterThanOrEqual",
                    "LessThan",
                    "LessThanOrEqual",
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("threshold", AttributeType::Float).required())
        .into_type()
}

fn dynamic_criteria_block() -> AttributeType {
    metric_block()
        .attribute(
            AttributeSchema::new(
                "operator",
                types::one_of(&["LessThan", "GreaterThan", "GreaterOrLessThan"]),
            )
            .required(),
        )
        .attribute(
            AttributeSchema::new("alert_sensitivity", types::one_of(&["Low", "Medium", "High"]))
                .required(),
        )
        .attribute(AttributeSchema::new("evaluation_total_count", types::positive_int()).with_default(4i64))
        .attribute(
            AttributeSchema::new("evaluation_failure_count", types::positive_int())
                .with_default(4i64),
        )
        .attribute(AttributeSchema::new(
            "ignore_data_before",
            types::string_matching(
                r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$",
                "expected an RFC 3339 timestamp",
            ),
        ))
        .max_items(1)
        .into_type()
}

fn webtest_criteria_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("web_test_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("component_id", types::resource_id()).required())
        .attribute(AttributeSchema::new("failed_location_count", types::positive_int()).required())
        .max_items(1)
        .into_type()
}

fn action_block() -> AttributeType {
    BlockSchema::new()
        .attribute(AttributeSchema::new("action_group_id", types::resource_id()).required())
        .attribute(AttributeSchema::new(
            "webhook_properties",
            AttributeType::Map(Box::new(AttributeType::String)),
        ))
        .into_type()
}

// =============================================================================
// Expand
// =============================================================================

fn expand_dimensions(block: &HashMap<String, Value>) -> Vec<MetricDimension> {
    blocks(block.get("dimension"))
        .into_iter()
        .map(|dimension| MetricDimension {
            name: block_str(dimension, "name").unwrap_or_default().to_string(),
            operator: block_str(dimension, "operator").unwrap_or("Include").to_string(),
            values: expand_string_list(dimension.get("values")),
        })
        .collect()
}

fn criterion_name(index: usize) -> String {
    format!("Metric{}", index + 1)
}

fn expand_static_criteria(items: &[&HashMap<String, Value>]) -> Vec<MultiMetricCriteria> {
    items
        .iter()
        .enumerate()
        .map(|(i, block)| {
            MultiMetricCriteria::StaticThreshold(MetricCriteria {
                name: criterion_name(i),
                metric_name: block_str(block, "metric_name").unwrap_or_default().to_string(),
                metric_namespace: block_str(block, "metric_namespace").map(str::to_string),
                time_aggregation: block_str(block, "aggregation").unwrap_or_default().to_string(),
                dimensions: expand_dimensions(block),
                skip_metric_validation: block_bool(block, "skip_metric_validation"),
                operator: block_str(block, "operator").unwrap_or_default().to_string(),
                threshold: block_float(block, "threshold").unwrap_or_default(),
            })
        })
        .collect()
}

fn expand_dynamic_criteria(items: &[&HashMap<String, Value>]) -> Vec<MultiMetricCriteria> {
    items
        .iter()
        .enumerate()
        .map(|(i, block)| {
            MultiMetricCriteria::DynamicThreshold(DynamicMetricCriteria {
                name: criterion_name(i),
                metric_name: block_str(block, "metric_name").unwrap_or_default().to_string(),
                metric_namespace: block_str(block, "metric_namespace").map(str::to_string),
                time_aggregation: block_str(block, "aggregation").unwrap_or_default().to_string(),
                dimensions: expand_dimensions(block),
                skip_metric_validation: block_bool(block, "skip_metric_validation"),
                operator: block_str(block, "operator").unwrap_or_default().to_string(),
                alert_sensitivity: block_str(block, "alert_sensitivity")
                    .unwrap_or_default()
                    .to_string(),
                failing_periods: DynamicThresholdFailingPeriods {
                    number_of_evaluation_periods: block_int(block, "evaluation_total_count")
                        .unwrap_or(4) as f64,
                    min_failing_periods_to_alert: block_int(block, "evaluation_failure_count")
                        .unwrap_or(4) as f64,
                },
                ignore_data_before: block_str(block, "ignore_data_before").map(str::to_string),
            })
        })
        .collect()
}

/// Build the criteria union from whichever criteria attribute is set
fn expand_criteria(resource: &Resource, legacy: bool) -> ProviderResult<MetricAlertCriteria> {
    let static_criteria = resource.get_blocks(STATIC_CRITERIA);
    if !static_criteria.is_empty() {
        let criteria = MultipleMetricCriteria {
            all_of: expand_static_criteria(&static_criteria),
        };
        return Ok(if legacy {
            MetricAlertCriteria::SingleResourceMultipleMetric(criteria)
        } else {
            MetricAlertCriteria::MultipleResourceMultipleMetric(criteria)
        });
    }

    let dynamic_criteria = resource.get_blocks(DYNAMIC_CRITERIA);
    if !dynamic_criteria.is_empty() {
        return Ok(MetricAlertCriteria::MultipleResourceMultipleMetric(
            MultipleMetricCriteria {
                all_of: expand_dynamic_criteria(&dynamic_criteria),
            },
        ));
    }

    if let Some(webtest) = resource.get_blocks(WEBTEST_CRITERIA).first() {
        return Ok(MetricAlertCriteria::WebtestLocationAvailability(
            WebtestLocationAvailabilityCriteria {
                web_test_id: block_str(webtest, "web_test_id").unwrap_or_default().to_string(),
                component_id: block_str(webtest, "component_id").unwrap_or_default().to_string(),
                failed_location_count: block_int(webtest, "failed_location_count").unwrap_or(1)
                    as f64,
            },
        ));
    }

    Err(ProviderError::validation(format!(
        "one of {}, {} or {} must be set",
        STATIC_CRITERIA, DYNAMIC_CRITERIA, WEBTEST_CRITERIA
    )))
}

fn expand_actions(resource: &Resource) -> Vec<MetricAlertAction> {
    resource
        .get_blocks("action")
        .into_iter()
        .filter_map(|action| {
            Some(MetricAlertAction {
                action_group_id: block_str(action, "action_group_id")?.to_string(),
                web_hook_properties: expand_string_map(action.get("webhook_properties")),
            })
        })
        .collect()
}

fn expand(resource: &Resource, legacy: bool) -> ProviderResult<MetricAlert> {
    Ok(MetricAlert {
        id: None,
        name: None,
        location: "global".to_string(),
        tags: expand_tags(resource.get("tags")),
        properties: MetricAlertProperties {
            description: resource.get_str("description").unwrap_or_default().to_string(),
            severity: resource.get_int("severity").unwrap_or(3) as i32,
            enabled: resource.get_bool("enabled").unwrap_or(true),
            scopes: expand_string_list(resource.get("scopes")),
            evaluation_frequency: resource.get_str("frequency").unwrap_or("PT1M").to_string(),
            window_size: resource.get_str("window_size").unwrap_or("PT5M").to_string(),
            target_resource_type: resource.get_str("target_resource_type").map(str::to_string),
            target_resource_region: resource
                .get_str("target_resource_location")
                .map(str::to_string),
            criteria: expand_criteria(resource, legacy)?,
            auto_mitigate: Some(resource.get_bool("auto_mitigate").unwrap_or(true)),
            actions: expand_actions(resource),
        },
    })
}

// =============================================================================
// Flatten
// =============================================================================

fn flatten_dimensions(dimensions: &[MetricDimension]) -> Value {
    Value::List(
        dimensions
            .iter()
            .map(|d| {
                let mut block = Attributes::new();
                block.insert("name".to_string(), Value::String(d.name.clone()));
                block.insert("operator".to_string(), Value::String(d.operator.clone()));
                block.insert("values".to_string(), flatten_string_list(&d.values));
                Value::Map(block)
            })
            .collect(),
    )
}

/// Criteria attribute and block for one criterion, routed by its own type
fn flatten_metric_criterion(criterion: &MultiMetricCriteria) -> Option<(&'static str, Attributes)> {
    let mut block = Attributes::new();
    let (attribute, metric_namespace, metric_name, aggregation, dimensions, skip) = match criterion {
        MultiMetricCriteria::StaticThreshold(c) => {
            block.insert("operator".to_string(), Value::String(c.operator.clone()));
            block.insert("threshold".to_string(), Value::Float(c.threshold));
            (
                STATIC_CRITERIA,
                &c.metric_namespace,
                &c.metric_name,
                &c.time_aggregation,
                &c.dimensions,
                c.skip_metric_validation,
            )
        }
        MultiMetricCriteria::DynamicThreshold(c) => {
            block.insert("operator".to_string(), Value::String(c.operator.clone()));
            block.insert(
                "alert_sensitivity".to_string(),
                Value::String(c.alert_sensitivity.clone()),
            );
            block.insert(
                "evaluation_total_count".to_string(),
                Value::Int(c.failing_periods.number_of_evaluation_periods as i64),
            );
            block.insert(
                "evaluation_failure_count".to_string(),
                Value::Int(c.failing_periods.min_failing_periods_to_alert as i64),
            );
            set(&mut block, "ignore_data_before", c.ignore_data_before.clone());
            (
                DYNAMIC_CRITERIA,
                &c.metric_namespace,
                &c.metric_name,
                &c.time_aggregation,
                &c.dimensions,
                c.skip_metric_validation,
            )
        }
        MultiMetricCriteria::Unknown(raw) => {
            debug!("skipping criterion of unknown type {:?}", raw.discriminator);
            return None;
        }
    };

    block.insert(
        "metric_namespace".to_string(),
        Value::String(metric_namespace.clone().unwrap_or_default()),
    );
    block.insert("metric_name".to_string(), Value::String(metric_name.clone()));
    block.insert("aggregation".to_string(), Value::String(aggregation.clone()));
    if !dimensions.is_empty() {
        block.insert("dimension".to_string(), flatten_dimensions(dimensions));
    }
    block.insert(
        "skip_metric_validation".to_string(),
        Value::Bool(skip.unwrap_or(false)),
    );
    Some((attribute, block))
}

/// Criteria attributes (name and block list) for the criteria the alert uses
fn flatten_criteria(criteria: &MetricAlertCriteria) -> Vec<(&'static str, Value)> {
    match criteria {
        MetricAlertCriteria::SingleResourceMultipleMetric(multi)
        | MetricAlertCriteria::MultipleResourceMultipleMetric(multi) => {
            let mut static_items = Vec::new();
            let mut dynamic_items = Vec::new();
            for (attribute, block) in multi.all_of.iter().filter_map(flatten_metric_criterion) {
                if attribute == DYNAMIC_CRITERIA {
                    dynamic_items.push(Value::Map(block));
                } else {
                    static_items.push(Value::Map(block));
                }
            }
            [(STATIC_CRITERIA, static_items), (DYNAMIC_CRITERIA, dynamic_items)]
                .into_iter()
                .filter(|(_, items)| !items.is_empty())
                .map(|(name, items)| (name, Value::List(items)))
                .collect()
        }
        MetricAlertCriteria::WebtestLocationAvailability(webtest) => {
            let mut block = Attributes::new();
            block.insert(
                "web_test_id".to_string(),
                Value::String(webtest.web_test_id.clone()),
            );
            block.insert(
                "component_id".to_string(),
                Value::String(webtest.component_id.clone()),
            );
            block.insert(
                "failed_location_count".to_string(),
                Value::Int(webtest.failed_location_count as i64),
            );
            vec![(WEBTEST_CRITERIA, Value::List(vec![Value::Map(block)]))]
        }
        MetricAlertCriteria::Unknown(raw) => {
            debug!("metric alert criteria of unknown type {:?}", raw.discriminator);
            Vec::new()
        }
    }
}

fn flatten_actions(actions: &[MetricAlertAction]) -> Value {
    Value::List(
        actions
            .iter()
            .map(|action| {
                let mut block = Attributes::new();
                block.insert(
                    "action_group_id".to_string(),
                    Value::String(action.action_group_id.clone()),
                );
                if !action.web_hook_properties.is_empty() {
                    block.insert(
                        "webhook_properties".to_string(),
                        flatten_string_map(&action.web_hook_properties),
                    );
                }
                Value::Map(block)
            })
            .collect(),
    )
}

fn flatten(alert: &MetricAlert, id: &MetricAlertId) -> Attributes {
    let props = &alert.properties;
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), Value::String(id.metric_alert_name.clone()));
    attributes.insert(
        "resource_group_name".to_string(),
        Value::String(id.resource_group_name.clone()),
    );
    attributes.insert("enabled".to_string(), Value::Bool(props.enabled));
    attributes.insert(
        "auto_mitigate".to_string(),
        Value::Bool(props.auto_mitigate.unwrap_or(true)),
    );
    attributes.insert("description".to_string(), Value::String(props.description.clone()));
    attributes.insert("severity".to_string(), Value::Int(i64::from(props.severity)));
    attributes.insert(
        "frequency".to_string(),
        Value::String(props.evaluation_frequency.clone()),
    );
    attributes.insert("window_size".to_string(), Value::String(props.window_size.clone()));
    attributes.insert("scopes".to_string(), flatten_string_list(&props.scopes));
    for (name, criteria) in flatten_criteria(&props.criteria) {
        attributes.insert(name.to_string(), criteria);
    }
    attributes.insert("action".to_string(), flatten_actions(&props.actions));
    set(&mut attributes, "target_resource_type", props.target_resource_type.clone());
    set(
        &mut attributes,
        "target_resource_location",
        props.target_resource_region.clone(),
    );
    attributes.insert("tags".to_string(), flatten_tags(alert.tags.as_ref()));
    attributes
}

// =============================================================================
// Handler
// =============================================================================

/// Poll until the alert has been readable [`VISIBLE_READS`] times in a row
pub(crate) async fn wait_until_visible(
    client: &MetricAlertClient,
    id: &MetricAlertId,
) -> ProviderResult<MetricAlert> {
    debug!("waiting for {} to be readable", id);
    let config = client
        .arm()
        .poller()
        .with_consecutive_successes(VISIBLE_READS);
    let mut poller = poll_fn(move || async move {
        client.get_optional(id).await.map(|alert| match alert {
            Some(alert) => PollStatus::Succeeded(alert),
            None => PollStatus::InProgress,
        })
    });

    poll_until_done(&mut poller, &config, client.arm().cancellation())
        .await
        .map_err(|e| ProviderError::from(e).context(format!("waiting for {} to be readable", id)))
}

async fn write(
    ctx: &ProviderContext,
    id: &MetricAlertId,
    alert: &MetricAlert,
    action: &str,
) -> ProviderResult<MetricAlert> {
    let client = &ctx.clients.monitor.metric_alerts;
    client
        .create_or_update(id, alert)
        .await
        .map_err(|e| arm_error(action, id, e))?;
    wait_until_visible(client, id).await
}

#[async_trait]
impl ResourceHandler<ProviderContext> for MetricAlertResource {
    fn resource_type(&self) -> &'static str {
        "azurerm_monitor_metric_alert"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.resource_type())
            .with_description("An Azure Monitor metric alert rule")
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required().force_new())
            .attribute(
                AttributeSchema::new("resource_group_name", types::resource_group_name())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("scopes", scopes()).required())
            .attribute(AttributeSchema::new("target_resource_type", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("target_resource_location", AttributeType::String).computed(),
            )
            .attribute(AttributeSchema::new(STATIC_CRITERIA, static_criteria_block()))
            .attribute(AttributeSchema::new(DYNAMIC_CRITERIA, dynamic_criteria_block()))
            .attribute(AttributeSchema::new(WEBTEST_CRITERIA, webtest_criteria_block()))
            .attribute(AttributeSchema::new("action", action_block()))
            .attribute(AttributeSchema::new("auto_mitigate", AttributeType::Bool).with_default(true))
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool).with_default(true))
            .attribute(AttributeSchema::new("frequency", types::one_of(FREQUENCIES)).with_default("PT1M"))
            .attribute(AttributeSchema::new("severity", types::int_between(0, 4)).with_default(3i64))
            .attribute(
                AttributeSchema::new("window_size", types::one_of(WINDOW_SIZES)).with_default("PT5M"),
            )
            .attribute(AttributeSchema::new("tags", types::tags()))
            .with_exactly_one_of(&[STATIC_CRITERIA, DYNAMIC_CRITERIA, WEBTEST_CRITERIA])
            .with_timeouts(Timeouts::minutes(30, 5, 30, 30))
    }

    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError> {
        MetricAlertId::parse(id).map(|_| ())
    }

    async fn create(&self, ctx: &ProviderContext, resource: &Resource) -> ProviderResult<State> {
        let id = MetricAlertId::new(
            &ctx.subscription_id,
            resource.get_str("resource_group_name").unwrap_or_default(),
            resource.get_str("name").unwrap_or_default(),
        );
        check_requires_import(ctx, &ctx.clients.monitor.metric_alerts, &id, self.resource_type())
            .await?;

        let alert = write(ctx, &id, &expand(resource, false)?, "creating").await?;
        info!("created {}", id);

        Ok(State::existing(resource.address.clone(), flatten(&alert, &id)).with_id(id.id()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        address: &ResourceAddress,
        id: &str,
    ) -> ProviderResult<State> {
        let id = MetricAlertId::parse(id)?;
        let alert = ctx
            .clients
            .monitor
            .metric_alerts
            .get_optional(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;

        Ok(match alert {
            Some(alert) => State::existing(address.clone(), flatten(&alert, &id)).with_id(id.id()),
            None => gone(address, &id),
        })
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _from: &State,
        to: &Resource,
        _changed: &[String],
    ) -> ProviderResult<State> {
        let id = MetricAlertId::parse(id)?;
        let existing = ctx
            .clients
            .monitor
            .metric_alerts
            .get(&id)
            .await
            .map_err(|e| arm_error("retrieving", &id, e))?;
        let legacy = matches!(
            existing.properties.criteria,
            MetricAlertCriteria::SingleResourceMultipleMetric(_)
        );

        let alert = write(ctx, &id, &expand(to, legacy)?, "updating").await?;
        Ok(State::existing(to.address.clone(), flatten(&alert, &id)).with_id(id.id()))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str) -> ProviderResult<()> {
        let id = MetricAlertId::parse(id)?;
        ctx.clients
            .monitor
            .metric_alerts
            .delete(&id)
            .await
            .map_err(|e| arm_error("deleting", &id, e))?;
        info!("deleted {}", id);
        Ok(())
    }
}
