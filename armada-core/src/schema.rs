//! Schema - Define type schemas for resources
//!
//! Each resource handler declares a schema for its resource type,
//! enabling validation before any remote call is made.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::resource::Value;

/// Validation function attached to a custom attribute type
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number (integers are accepted)
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: Validator,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block: a list of attribute maps
    Block(Box<BlockSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate
                    .check(v)
                    .map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::List(items)) => block.validate(items),

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedOnly { name: String },

    #[error("Expected between {min} and {} blocks, got {got}", max.map(|m| m.to_string()).unwrap_or_else(|| "unlimited".to_string()))]
    BlockCount {
        min: usize,
        max: Option<usize>,
        got: usize,
    },

    #[error("Exactly one of {} must be set", names.join(", "))]
    ExactlyOneOf { names: Vec<String> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Filled in by the remote API when configuration leaves it unset
    pub computed: bool,
    /// Only ever set by the remote API
    pub read_only: bool,
    /// Changing this attribute requires destroying and recreating the resource
    pub force_new: bool,
    /// Never echoed back by the API; preserved from prior state on read
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Canonicalizes configured values before they are compared or sent
    pub normalize: Option<fn(&Value) -> Value>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            read_only: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            normalize: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Computed-only: set by the API, never by configuration
    pub fn read_only(mut self) -> Self {
        self.computed = true;
        self.read_only = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_normalizer(mut self, normalize: fn(&Value) -> Value) -> Self {
        self.normalize = Some(normalize);
        self
    }
}

/// Nested block schema
#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
    pub min_items: usize,
    pub max_items: Option<usize>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            min_items: 0,
            max_items: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = min;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn into_type(self) -> AttributeType {
        AttributeType::Block(Box::new(self))
    }

    fn validate(&self, items: &[Value]) -> Result<(), TypeError> {
        let out_of_range =
            items.len() < self.min_items || self.max_items.is_some_and(|max| items.len() > max);
        if out_of_range {
            return Err(TypeError::BlockCount {
                min: self.min_items,
                max: self.max_items,
                got: items.len(),
            });
        }

        for (i, item) in items.iter().enumerate() {
            let Value::Map(map) = item else {
                return Err(TypeError::ListItemError {
                    index: i,
                    inner: Box::new(TypeError::TypeMismatch {
                        expected: "Map".to_string(),
                        got: item.type_name(),
                    }),
                });
            };
            let errors = validate_attributes(&self.attributes, map);
            if let Some(first) = errors.into_iter().next() {
                return Err(TypeError::ListItemError {
                    index: i,
                    inner: Box::new(first),
                });
            }
        }
        Ok(())
    }

    /// Fill in defaults for every block in a block-list value
    fn apply_defaults(&self, value: &mut Value) {
        if let Value::List(items) = value {
            for item in items {
                if let Value::Map(map) = item {
                    apply_defaults(&self.attributes, map);
                }
            }
        }
    }
}

impl Default for BlockSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-operation time limits for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

impl Timeouts {
    pub fn minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub timeouts: Timeouts,
    /// Groups of attributes where exactly one member must be set
    pub exactly_one_of: Vec<Vec<String>>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            timeouts: Timeouts::default(),
            exactly_one_of: Vec::new(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_exactly_one_of(mut self, names: &[&str]) -> Self {
        self.exactly_one_of
            .push(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Names of attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }

    /// Fill in schema defaults for attributes missing from the configuration
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_defaults(&self.attributes, attributes);
    }

    /// Rewrite configured values into their canonical form
    pub fn normalize(&self, attributes: &mut HashMap<String, Value>) {
        for (name, value) in attributes.iter_mut() {
            if let Some(normalize) = self.attributes.get(name).and_then(|a| a.normalize) {
                *value = normalize(value);
            }
        }
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = validate_attributes(&self.attributes, attributes);

        for group in &self.exactly_one_of {
            let set = group
                .iter()
                .filter(|name| is_set(attributes.get(name.as_str())))
                .count();
            if set != 1 {
                errors.push(TypeError::ExactlyOneOf {
                    names: group.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(Value::List(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn apply_defaults(schemas: &HashMap<String, AttributeSchema>, attributes: &mut HashMap<String, Value>) {
    for (name, schema) in schemas {
        if let Some(default) = &schema.default
            && !attributes.contains_key(name)
        {
            attributes.insert(name.clone(), default.clone());
        }
        if let AttributeType::Block(block) = &schema.attr_type
            && let Some(value) = attributes.get_mut(name)
        {
            block.apply_defaults(value);
        }
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    let mut required: Vec<&AttributeSchema> = schemas
        .values()
        .filter(|s| s.required && s.default.is_none())
        .collect();
    required.sort_by(|a, b| a.name.cmp(&b.name));
    for schema in required {
        if !attributes.contains_key(&schema.name) {
            errors.push(TypeError::MissingRequired {
                name: schema.name.clone(),
            });
        }
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();
    for name in names {
        let value = &attributes[name];
        match schemas.get(name) {
            Some(schema) if schema.read_only => {
                errors.push(TypeError::ComputedOnly { name: name.clone() });
            }
            Some(schema) => {
                if let Err(e) = schema.attr_type.validate(value) {
                    errors.push(TypeError::AttributeError {
                        name: name.clone(),
                        inner: Box::new(e),
                    });
                }
            }
            None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
        }
    }

    errors
}

/// Helper functions for common types
pub mod types {
    use regex::Regex;

    use super::*;
    use crate::resource_id::{ArmResourceId, ResourceIdentifier};

    fn custom(
        name: &str,
        base: AttributeType,
        validate: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> AttributeType {
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(base),
            validate: Validator::new(validate),
        }
    }

    /// Enum from a static list of allowed values
    pub fn one_of(values: &[&str]) -> AttributeType {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        int_at_least(1)
    }

    pub fn int_at_least(min: i64) -> AttributeType {
        custom("IntAtLeast", AttributeType::Int, move |value| match value {
            Value::Int(n) if *n >= min => Ok(()),
            Value::Int(n) => Err(format!("expected a value of at least {}, got {}", min, n)),
            _ => Err("Expected integer".to_string()),
        })
    }

    pub fn int_between(min: i64, max: i64) -> AttributeType {
        custom("IntBetween", AttributeType::Int, move |value| match value {
            Value::Int(n) if (min..=max).contains(n) => Ok(()),
            Value::Int(n) => Err(format!(
                "expected a value between {} and {}, got {}",
                min, max, n
            )),
            _ => Err("Expected integer".to_string()),
        })
    }

    pub fn int_in(allowed: &'static [i64]) -> AttributeType {
        custom("IntInSlice", AttributeType::Int, move |value| match value {
            Value::Int(n) if allowed.contains(n) => Ok(()),
            Value::Int(n) => Err(format!("expected one of {:?}, got {}", allowed, n)),
            _ => Err("Expected integer".to_string()),
        })
    }

    pub fn non_empty_string() -> AttributeType {
        custom("NonEmptyString", AttributeType::String, |value| match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            _ => Err("expected a non-empty string".to_string()),
        })
    }

    /// String matching a regular expression, with a user-facing message on failure
    pub fn string_matching(pattern: &str, message: &'static str) -> AttributeType {
        // Patterns are compile-time literals in handler schemas
        let re = Regex::new(pattern).ok();
        custom("StringMatch", AttributeType::String, move |value| {
            let Value::String(s) = value else {
                return Err("Expected string".to_string());
            };
            match &re {
                Some(re) if re.is_match(s) => Ok(()),
                Some(_) => Err(format!("{:?}: {}", s, message)),
                None => Err("invalid validation pattern".to_string()),
            }
        })
    }

    pub fn uuid() -> AttributeType {
        custom("Uuid", AttributeType::String, |value| match value {
            Value::String(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(()),
            Value::String(s) => Err(format!("{:?} is not a valid UUID", s)),
            _ => Err("Expected string".to_string()),
        })
    }

    /// Any well-formed ARM resource ID
    pub fn resource_id() -> AttributeType {
        custom("ResourceId", AttributeType::String, |value| match value {
            Value::String(s) => s
                .parse::<ArmResourceId>()
                .map(|_| ())
                .map_err(|e| e.to_string()),
            _ => Err("Expected string".to_string()),
        })
    }

    /// An ARM resource ID of one specific typed shape
    pub fn typed_id<T: ResourceIdentifier + 'static>(name: &str) -> AttributeType {
        custom(name, AttributeType::String, |value| match value {
            Value::String(s) => T::parse(s).map(|_| ()).map_err(|e| e.to_string()),
            _ => Err("Expected string".to_string()),
        })
    }

    pub fn resource_group_name() -> AttributeType {
        string_matching(
            r"^[-\w._()]{0,89}[-\w_()]$",
            "resource group names can only contain alphanumeric characters, periods, underscores, hyphens and parentheses, cannot end in a period, and must be 1-90 characters long",
        )
    }

    /// Azure location, compared in normalized form
    pub fn location() -> AttributeType {
        custom("Location", AttributeType::String, |value| match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            _ => Err("expected a non-empty location".to_string()),
        })
    }

    /// Tags: string map with Azure's key/value limits
    pub fn tags() -> AttributeType {
        custom(
            "Tags",
            AttributeType::Map(Box::new(AttributeType::String)),
            |value| {
                let Value::Map(map) = value else {
                    return Err("Expected map".to_string());
                };
                if map.len() > 50 {
                    return Err(format!("a maximum of 50 tags can be applied, got {}", map.len()));
                }
                for (k, v) in map {
                    if k.len() > 512 {
                        return Err(format!("tag name {:?} exceeds 512 characters", k));
                    }
                    if v.as_str().is_some_and(|v| v.len() > 256) {
                        return Err(format!("value for tag {:?} exceeds 256 characters", k));
                    }
                }
                Ok(())
            },
        )
    }
}

/// Normalize an Azure location for comparison ("West Europe" -> "westeurope")
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// [`normalize_location`] over attribute values; non-strings pass through
pub fn normalize_location_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_location(s)),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn float_accepts_integers() {
        assert!(AttributeType::Float.validate(&Value::Int(2)).is_ok());
        assert!(AttributeType::Float.validate(&Value::Float(2.5)).is_ok());
        assert!(AttributeType::Float.validate(&Value::Bool(true)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = types::one_of(&["PT1M", "PT5M"]);
        assert!(t.validate(&Value::String("PT1M".to_string())).is_ok());
        assert!(t.validate(&Value::String("PT2M".to_string())).is_err());
    }

    #[test]
    fn validate_int_between() {
        let t = types::int_between(1, 35);
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(35)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(36)).is_err());
        assert!(t.validate(&Value::String("7".into())).is_err());
    }

    #[test]
    fn validate_uuid() {
        let t = types::uuid();
        assert!(
            t.validate(&Value::from("00000000-0000-0000-0000-000000000000"))
                .is_ok()
        );
        assert!(t.validate(&Value::from("not-a-uuid")).is_err());
    }

    #[test]
    fn validate_resource_group_name() {
        let t = types::resource_group_name();
        assert!(t.validate(&Value::from("acctestRG-01")).is_ok());
        assert!(t.validate(&Value::from("ends-in-period.")).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("my-resource".to_string()));
        attrs.insert("count".to_string(), Value::Int(5));
        attrs.insert("enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("server")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let attrs = HashMap::new();
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::MissingRequired { .. }));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let schema = ResourceSchema::new("server")
            .attribute(AttributeSchema::new("name", AttributeType::String));
        let mut attrs = HashMap::new();
        attrs.insert("nmae".to_string(), Value::from("typo"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::UnknownAttribute { .. }));
    }

    #[test]
    fn read_only_attribute_cannot_be_configured() {
        let schema = ResourceSchema::new("server").attribute(
            AttributeSchema::new("fully_qualified_domain_name", AttributeType::String).read_only(),
        );
        let mut attrs = HashMap::new();
        attrs.insert(
            "fully_qualified_domain_name".to_string(),
            Value::from("x.database.windows.net"),
        );
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::ComputedOnly { .. }));
    }

    #[test]
    fn block_limits_and_nested_validation() {
        let block = BlockSchema::new()
            .attribute(AttributeSchema::new("preset_name", AttributeType::String).required())
            .max_items(1);
        let schema =
            ResourceSchema::new("transform").attribute(AttributeSchema::new("preset", block.into_type()));

        let mut inner = HashMap::new();
        inner.insert("preset_name".to_string(), Value::from("AdaptiveStreaming"));

        let mut attrs = HashMap::new();
        attrs.insert(
            "preset".to_string(),
            Value::List(vec![Value::Map(inner.clone())]),
        );
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert(
            "preset".to_string(),
            Value::List(vec![Value::Map(inner.clone()), Value::Map(inner)]),
        );
        assert!(schema.validate(&attrs).is_err());

        attrs.insert(
            "preset".to_string(),
            Value::List(vec![Value::Map(HashMap::new())]),
        );
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn exactly_one_of_is_enforced() {
        let schema = ResourceSchema::new("alert")
            .attribute(AttributeSchema::new("a", AttributeType::String))
            .attribute(AttributeSchema::new("b", AttributeType::String))
            .with_exactly_one_of(&["a", "b"]);

        let mut attrs = HashMap::new();
        assert!(schema.validate(&attrs).is_err());
        attrs.insert("a".to_string(), Value::from("x"));
        assert!(schema.validate(&attrs).is_ok());
        attrs.insert("b".to_string(), Value::from("y"));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn defaults_fill_nested_blocks() {
        let block = BlockSchema::new()
            .attribute(AttributeSchema::new("operator", AttributeType::String).required())
            .attribute(AttributeSchema::new("skip", AttributeType::Bool).with_default(false));
        let schema = ResourceSchema::new("alert")
            .attribute(AttributeSchema::new("severity", AttributeType::Int).with_default(3i64))
            .attribute(AttributeSchema::new("criteria", block.into_type()));

        let mut inner = HashMap::new();
        inner.insert("operator".to_string(), Value::from("GreaterThan"));
        let mut attrs = HashMap::new();
        attrs.insert("criteria".to_string(), Value::List(vec![Value::Map(inner)]));

        schema.apply_defaults(&mut attrs);
        assert_eq!(attrs.get("severity"), Some(&Value::Int(3)));
        let criteria = attrs["criteria"].as_list().unwrap()[0].as_map().unwrap();
        assert_eq!(criteria.get("skip"), Some(&Value::Bool(false)));
    }

    #[test]
    fn location_normalization() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("westeurope"), "westeurope");

        let schema = ResourceSchema::new("test").attribute(
            AttributeSchema::new("location", types::location())
                .with_normalizer(normalize_location_value),
        );
        let mut attrs = HashMap::new();
        attrs.insert("location".to_string(), Value::String("UK South".to_string()));
        schema.normalize(&mut attrs);
        assert_eq!(attrs["location"], Value::String("uksouth".to_string()));
    }

    #[test]
    fn force_new_attributes_are_sorted() {
        let schema = ResourceSchema::new("azurerm_mssql_database")
            .attribute(AttributeSchema::new("server_id", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("sku_name", AttributeType::String));
        assert_eq!(schema.force_new_attributes(), vec!["name", "server_id"]);
    }
}
