//! Differ - Compare desired configuration with current state
//!
//! Only attributes present in the configuration are compared; computed-only
//! attributes are never compared. Sensitive attributes the API never returns
//! are not compared either. A change to a `force_new` attribute turns an
//! update into a replacement.

use std::collections::HashMap;

use crate::resource::{Resource, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create,
    /// Resource exists with differences that can be applied in place
    Update { changed: Vec<String> },
    /// At least one changed attribute forces destroy-and-recreate
    Replace { changed: Vec<String> },
    /// Resource exists with no differences -> no action needed
    NoChange,
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange)
    }

    pub fn changed(&self) -> &[String] {
        match self {
            Diff::Update { changed } | Diff::Replace { changed } => changed,
            Diff::Create | Diff::NoChange => &[],
        }
    }
}

/// Compare desired configuration with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create;
    }

    let changed = changed_attributes(&desired.attributes, &current.attributes, schema);
    if changed.is_empty() {
        return Diff::NoChange;
    }

    let force_new = schema.force_new_attributes();
    let replace = changed.iter().any(|name| force_new.contains(&name.as_str()));
    if replace {
        Diff::Replace { changed }
    } else {
        Diff::Update { changed }
    }
}

/// Names of configured attributes whose value differs from the current state, sorted
pub fn changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        .filter(|(key, _)| {
            !schema
                .attributes
                .get(key.as_str())
                .is_some_and(|a| a.read_only)
        })
        .filter(|(key, desired_value)| match current.get(key.as_str()) {
            Some(current_value) => !values_equal(desired_value, current_value),
            // write-only; the API never echoes it back
            None => !schema
                .attributes
                .get(key.as_str())
                .is_some_and(|a| a.sensitive),
        })
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}

/// Value equality where `5` and `5.0` compare equal, and a block key that is
/// missing on one side matches an empty list or map on the other
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_float() == b.as_float()
        }
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            let matches = |from: &HashMap<String, Value>, to: &HashMap<String, Value>| {
                from.iter().all(|(k, x)| match to.get(k) {
                    Some(y) => values_equal(x, y),
                    None => is_empty_collection(x),
                })
            };
            matches(xs, ys) && matches(ys, xs)
        }
        _ => a == b,
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceAddress;
    use crate::schema::{AttributeSchema, AttributeType};

    fn schema() -> ResourceSchema {
        ResourceSchema::new("azurerm_mssql_database_short_term_retention_policy")
            .attribute(AttributeSchema::new("database_id", AttributeType::String).required().force_new())
            .attribute(AttributeSchema::new("retention_days", AttributeType::Int).required())
            .attribute(AttributeSchema::new("backup_interval_in_hours", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("etag", AttributeType::String).read_only())
            .attribute(AttributeSchema::new("admin_password", AttributeType::String).sensitive())
    }

    fn address() -> ResourceAddress {
        ResourceAddress::new("azurerm_mssql_database_short_term_retention_policy", "test")
    }

    fn current(retention: i64) -> State {
        let mut attrs = HashMap::new();
        attrs.insert("database_id".to_string(), Value::from("/db/1"));
        attrs.insert("retention_days".to_string(), Value::Int(retention));
        attrs.insert("backup_interval_in_hours".to_string(), Value::Int(12));
        attrs.insert("etag".to_string(), Value::from("abc"));
        State::existing(address(), attrs)
    }

    fn desired(retention: i64) -> Resource {
        Resource::new("azurerm_mssql_database_short_term_retention_policy", "test")
            .with_attribute("database_id", "/db/1")
            .with_attribute("retention_days", retention)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let result = diff(&desired(7), &State::not_found(address()), &schema());
        assert_eq!(result, Diff::Create);
    }

    #[test]
    fn diff_ignores_attributes_missing_from_configuration() {
        let result = diff(&desired(7), &current(7), &schema());
        assert_eq!(result, Diff::NoChange);
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_in_place() {
        let result = diff(&desired(14), &current(7), &schema());
        assert_eq!(
            result,
            Diff::Update {
                changed: vec!["retention_days".to_string()]
            }
        );
    }

    #[test]
    fn diff_replace_on_force_new_change() {
        let wanted = desired(7).with_attribute("database_id", "/db/2");
        let result = diff(&wanted, &current(7), &schema());
        assert_eq!(result.changed(), ["database_id".to_string()]);
        assert!(matches!(result, Diff::Replace { .. }));
    }

    #[test]
    fn diff_skips_read_only_attributes() {
        let wanted = desired(7).with_attribute("etag", "other");
        assert_eq!(diff(&wanted, &current(7), &schema()), Diff::NoChange);
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert!(values_equal(&Value::Int(5), &Value::Float(5.0)));
        assert!(!values_equal(&Value::Int(5), &Value::Float(5.5)));
        assert!(!values_equal(&Value::Int(5), &Value::from("5")));
    }

    #[test]
    fn sensitive_attributes_missing_from_state_are_not_changes() {
        let wanted = desired(7).with_attribute("admin_password", "s3cret!");
        assert_eq!(diff(&wanted, &current(7), &schema()), Diff::NoChange);

        let mut known = current(7);
        known
            .attributes
            .insert("admin_password".to_string(), Value::from("old"));
        assert_eq!(
            diff(&wanted, &known, &schema()).changed(),
            ["admin_password".to_string()]
        );
    }

    #[test]
    fn missing_block_keys_match_empty_collections() {
        let block = |pairs: Vec<(&str, Value)>| {
            Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
        };
        let configured = Value::List(vec![block(vec![("metric_name", Value::from("Requests"))])]);
        let read_back = Value::List(vec![block(vec![
            ("metric_name", Value::from("Requests")),
            ("dimension", Value::List(vec![])),
            ("webhook_properties", Value::Map(HashMap::new())),
        ])]);
        assert!(values_equal(&configured, &read_back));

        let extra = Value::List(vec![block(vec![
            ("metric_name", Value::from("Requests")),
            ("dimension", Value::List(vec![Value::from("ApiName")])),
        ])]);
        assert!(!values_equal(&configured, &extra));
    }

    #[test]
    fn removed_tags_are_still_a_change() {
        let tags = |pairs: &[(&str, &str)]| {
            Value::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::from(*v)))
                    .collect(),
            )
        };
        assert!(!values_equal(
            &tags(&[("env", "dev")]),
            &tags(&[("env", "dev"), ("owner", "ops")])
        ));
    }
}
