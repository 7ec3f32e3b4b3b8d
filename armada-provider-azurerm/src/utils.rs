//! Helpers for converting between configuration values and ARM models

use std::collections::{BTreeMap, HashMap};

use armada_core::resource::{Attributes, Value};
use armada_core::schema::normalize_location;

/// Tags as ARM sends and receives them
pub type Tags = BTreeMap<String, String>;

/// Read a `tags` attribute into the ARM tag map; non-string values are skipped
pub fn expand_tags(value: Option<&Value>) -> Option<Tags> {
    let map = value.and_then(Value::as_map)?;
    Some(
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
    )
}

/// Tags for state; a missing tag map reads as empty
pub fn flatten_tags(tags: Option<&Tags>) -> Value {
    Value::Map(
        tags.into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Read a list of strings; anything else in the list is skipped
pub fn expand_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_string_list<S: AsRef<str>>(items: &[S]) -> Value {
    Value::List(
        items
            .iter()
            .map(|s| Value::String(s.as_ref().to_string()))
            .collect(),
    )
}

/// Read a map of strings (e.g. webhook properties)
pub fn expand_string_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_string_map(map: &HashMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Location as stored in state
pub fn flatten_location(location: Option<&str>) -> Value {
    Value::String(location.map(normalize_location).unwrap_or_default())
}

/// Insert `value` under `key` when it is set
pub fn set<V: Into<Value>>(attributes: &mut Attributes, key: &str, value: Option<V>) {
    if let Some(value) = value {
        attributes.insert(key.to_string(), value.into());
    }
}

/// Nested block as a single-element block list
pub fn single_block(block: Attributes) -> Value {
    Value::List(vec![Value::Map(block)])
}

/// Text from a block map, treating empty strings as unset
pub fn block_str<'a>(block: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    block.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn block_int(block: &HashMap<String, Value>, key: &str) -> Option<i64> {
    block.get(key).and_then(Value::as_int)
}

pub fn block_float(block: &HashMap<String, Value>, key: &str) -> Option<f64> {
    block.get(key).and_then(Value::as_float)
}

pub fn block_bool(block: &HashMap<String, Value>, key: &str) -> Option<bool> {
    block.get(key).and_then(Value::as_bool)
}
