//! Resource IDs - Parse and format Azure Resource Manager resource identifiers
//!
//! A typed resource ID is described by an ordered list of [`Segment`]s. Fixed
//! segments (`subscriptions`, `providers`, `Microsoft.Sql`, ...) must match
//! literally; value segments capture one path component each. A scope segment
//! may only come first and captures every component up to the fixed tail.
//!
//! `format` is the inverse of `parse`: for every canonical ID string `s`,
//! `format(parse(s)) == s`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of one segment in a resource ID template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Fixed literal such as `subscriptions` or `servers`
    Static(&'static str),
    /// Fixed resource provider namespace such as `Microsoft.Sql`
    ResourceProvider(&'static str),
    SubscriptionId,
    ResourceGroup,
    /// Any single non-empty path component
    UserSpecified,
    /// One or more leading path components (e.g. `/subscriptions/xxx/resourceGroups/yyy`)
    Scope,
}

/// One segment of a resource ID template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub name: &'static str,
    pub kind: SegmentKind,
    pub example: &'static str,
}

impl Segment {
    pub fn fixed(value: &'static str) -> Self {
        Self {
            name: value,
            kind: SegmentKind::Static(value),
            example: value,
        }
    }

    pub fn provider(namespace: &'static str) -> Self {
        Self {
            name: namespace,
            kind: SegmentKind::ResourceProvider(namespace),
            example: namespace,
        }
    }

    pub fn subscription_id() -> Self {
        Self {
            name: "subscription_id",
            kind: SegmentKind::SubscriptionId,
            example: "12345678-1234-9876-4563-123456789012",
        }
    }

    pub fn resource_group_name() -> Self {
        Self {
            name: "resource_group_name",
            kind: SegmentKind::ResourceGroup,
            example: "example-resource-group",
        }
    }

    pub fn user(name: &'static str, example: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::UserSpecified,
            example,
        }
    }

    pub fn scope(name: &'static str, example: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::Scope,
            example,
        }
    }

    /// `/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}`
    pub fn resource_group_prefix() -> Vec<Segment> {
        vec![
            Segment::fixed("subscriptions"),
            Segment::subscription_id(),
            Segment::fixed("resourceGroups"),
            Segment::resource_group_name(),
        ]
    }

    fn fixed_value(&self) -> Option<&'static str> {
        match self.kind {
            SegmentKind::Static(v) | SegmentKind::ResourceProvider(v) => Some(v),
            _ => None,
        }
    }
}

/// Errors produced while parsing a resource ID
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceIdError {
    #[error("parsing {id:?}: resource IDs must start with '/'. Expected a Resource ID that matches: {expected}")]
    MissingLeadingSlash { id: String, expected: String },

    #[error("parsing {id:?}: resource IDs must not contain empty segments. Expected a Resource ID that matches: {expected}")]
    EmptySegment { id: String, expected: String },

    #[error("parsing {id:?}: the number of segments didn't match (expected {want}, got {got}). Expected a Resource ID that matches: {expected}")]
    SegmentCount {
        id: String,
        want: usize,
        got: usize,
        expected: String,
    },

    #[error("parsing {id:?}: expected segment {position} to be {want:?} but got {got:?}. Expected a Resource ID that matches: {expected}")]
    UnexpectedSegment {
        id: String,
        position: usize,
        want: String,
        got: String,
        expected: String,
    },

    #[error("resource ID is missing a value for {name:?}")]
    MissingValue { name: String },

    #[error("parsing {id:?}: {message}")]
    Malformed { id: String, message: String },
}

/// Values captured from a parsed resource ID, keyed by segment name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResourceId {
    values: BTreeMap<String, String>,
}

impl ParsedResourceId {
    pub fn value(&self, name: &str) -> Result<&str, ResourceIdError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ResourceIdError::MissingValue {
                name: name.to_string(),
            })
    }

    /// Convenience for `from_parsed` implementations
    pub fn owned(&self, name: &str) -> Result<String, ResourceIdError> {
        self.value(name).map(str::to_string)
    }
}

/// Build an example ID from the segment examples, used in error messages
pub fn example_id(segments: &[Segment]) -> String {
    let examples: Vec<&str> = segments
        .iter()
        .filter(|s| s.fixed_value().is_none())
        .map(|s| s.example)
        .collect();
    format_segments(segments, &examples)
}

/// Parse `input` against a segment template
pub fn parse_segments(
    segments: &[Segment],
    input: &str,
    insensitively: bool,
) -> Result<ParsedResourceId, ResourceIdError> {
    let expected = || example_id(segments);

    let Some(path) = input.strip_prefix('/') else {
        return Err(ResourceIdError::MissingLeadingSlash {
            id: input.to_string(),
            expected: expected(),
        });
    };

    let components: Vec<&str> = path.split('/').collect();
    if components.iter().any(|c| c.is_empty()) {
        return Err(ResourceIdError::EmptySegment {
            id: input.to_string(),
            expected: expected(),
        });
    }

    let mut parsed = ParsedResourceId::default();

    let (tail, offset) = match segments.first() {
        Some(first) if first.kind == SegmentKind::Scope => {
            let tail = &segments[1..];
            if components.len() <= tail.len() {
                return Err(ResourceIdError::SegmentCount {
                    id: input.to_string(),
                    want: tail.len() + 1,
                    got: components.len(),
                    expected: expected(),
                });
            }
            let scope_len = components.len() - tail.len();
            parsed.values.insert(
                first.name.to_string(),
                format!("/{}", components[..scope_len].join("/")),
            );
            (tail, scope_len)
        }
        _ => {
            if components.len() != segments.len() {
                return Err(ResourceIdError::SegmentCount {
                    id: input.to_string(),
                    want: segments.len(),
                    got: components.len(),
                    expected: expected(),
                });
            }
            (segments, 0)
        }
    };

    for (i, (segment, component)) in tail.iter().zip(&components[offset..]).enumerate() {
        match segment.fixed_value() {
            Some(want) => {
                let matches = if insensitively {
                    want.eq_ignore_ascii_case(component)
                } else {
                    want == *component
                };
                if !matches {
                    return Err(ResourceIdError::UnexpectedSegment {
                        id: input.to_string(),
                        position: offset + i,
                        want: want.to_string(),
                        got: component.to_string(),
                        expected: expected(),
                    });
                }
            }
            None => {
                if segment.kind == SegmentKind::Scope {
                    return Err(ResourceIdError::Malformed {
                        id: input.to_string(),
                        message: "a scope segment may only appear first".to_string(),
                    });
                }
                parsed
                    .values
                    .insert(segment.name.to_string(), component.to_string());
            }
        }
    }

    Ok(parsed)
}

/// Format values (in segment order, value segments only) into an ID string
pub fn format_segments(segments: &[Segment], values: &[&str]) -> String {
    let mut out = String::new();
    let mut values = values.iter();
    for segment in segments {
        match (segment.fixed_value(), segment.kind) {
            (Some(fixed), _) => {
                out.push('/');
                out.push_str(fixed);
            }
            (None, SegmentKind::Scope) => {
                let scope = values.next().copied().unwrap_or_default();
                out.push('/');
                out.push_str(scope.trim_matches('/'));
            }
            (None, _) => {
                out.push('/');
                out.push_str(values.next().copied().unwrap_or_default());
            }
        }
    }
    out
}

/// A strongly typed resource ID
pub trait ResourceIdentifier: Sized {
    /// Template this ID type parses
    fn segments() -> Vec<Segment>;

    fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError>;

    /// Values for every non-fixed segment, in template order
    fn user_values(&self) -> Vec<&str>;

    fn parse(input: &str) -> Result<Self, ResourceIdError> {
        let parsed = parse_segments(&Self::segments(), input, false)?;
        Self::from_parsed(&parsed)
    }

    /// Accept fixed segments in any casing (the API sometimes lowercases them)
    fn parse_insensitively(input: &str) -> Result<Self, ResourceIdError> {
        let parsed = parse_segments(&Self::segments(), input, true)?;
        Self::from_parsed(&parsed)
    }

    fn id(&self) -> String {
        format_segments(&Self::segments(), &self.user_values())
    }
}

/// Untyped decomposition of an ARM resource ID
///
/// `/subscriptions/{sub}[/resourceGroups/{rg}][/providers/{ns}/{type}/{name}[/{childType}/{childName}...]]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArmResourceId {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub provider: Option<String>,
    /// (type, name) pairs after the provider namespace
    pub path: Vec<(String, String)>,
}

impl ArmResourceId {
    /// Full resource type, e.g. `Microsoft.Sql/servers/databases`
    pub fn resource_type(&self) -> Option<String> {
        let provider = self.provider.as_ref()?;
        let mut out = provider.clone();
        for (kind, _) in &self.path {
            out.push('/');
            out.push_str(kind);
        }
        Some(out)
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(|(_, name)| name.as_str())
    }

    /// Value for a type key such as `servers`
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    /// The parent resource, if this ID has child segments
    pub fn parent(&self) -> Option<ArmResourceId> {
        if self.path.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.path.pop();
        Some(parent)
    }
}

impl FromStr for ArmResourceId {
    type Err = ResourceIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = |message: &str| ResourceIdError::Malformed {
            id: input.to_string(),
            message: message.to_string(),
        };

        let Some(path) = input.strip_prefix('/') else {
            return Err(malformed("resource IDs must start with '/'"));
        };
        let components: Vec<&str> = path.split('/').collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(malformed("resource IDs must not contain empty segments"));
        }

        let mut rest = components.as_slice();
        let subscription_id = match rest {
            ["subscriptions", sub, tail @ ..] => {
                rest = tail;
                sub.to_string()
            }
            _ => return Err(malformed("expected the ID to start with /subscriptions/{id}")),
        };

        let resource_group = match rest {
            ["resourceGroups", rg, tail @ ..] => {
                rest = tail;
                Some(rg.to_string())
            }
            _ => None,
        };

        let provider = match rest {
            [] => None,
            ["providers", ns, tail @ ..] => {
                rest = tail;
                Some(ns.to_string())
            }
            _ => return Err(malformed("expected a providers segment")),
        };

        if provider.is_some() && (rest.is_empty() || rest.len() % 2 != 0) {
            return Err(malformed(
                "expected type/name pairs after the provider namespace",
            ));
        }

        let path = rest
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }
}

impl fmt::Display for ArmResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(rg) = &self.resource_group {
            write!(f, "/resourceGroups/{}", rg)?;
        }
        if let Some(ns) = &self.provider {
            write!(f, "/providers/{}", ns)?;
        }
        for (kind, name) in &self.path {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct DatabaseId {
        subscription_id: String,
        resource_group_name: String,
        server_name: String,
        database_name: String,
    }

    impl ResourceIdentifier for DatabaseId {
        fn segments() -> Vec<Segment> {
            let mut segments = Segment::resource_group_prefix();
            segments.extend([
                Segment::fixed("providers"),
                Segment::provider("Microsoft.Sql"),
                Segment::fixed("servers"),
                Segment::user("server_name", "serverValue"),
                Segment::fixed("databases"),
                Segment::user("database_name", "databaseValue"),
            ]);
            segments
        }

        fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError> {
            Ok(Self {
                subscription_id: parsed.owned("subscription_id")?,
                resource_group_name: parsed.owned("resource_group_name")?,
                server_name: parsed.owned("server_name")?,
                database_name: parsed.owned("database_name")?,
            })
        }

        fn user_values(&self) -> Vec<&str> {
            vec![
                &self.subscription_id,
                &self.resource_group_name,
                &self.server_name,
                &self.database_name,
            ]
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct DefinitionId {
        scope: String,
        name: String,
    }

    impl ResourceIdentifier for DefinitionId {
        fn segments() -> Vec<Segment> {
            vec![
                Segment::scope("scope", "/subscriptions/12345678-1234-9876-4563-123456789012"),
                Segment::fixed("providers"),
                Segment::provider("Microsoft.ManagedServices"),
                Segment::fixed("registrationDefinitions"),
                Segment::user("name", "definitionValue"),
            ]
        }

        fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError> {
            Ok(Self {
                scope: parsed.owned("scope")?,
                name: parsed.owned("name")?,
            })
        }

        fn user_values(&self) -> Vec<&str> {
            vec![&self.scope, &self.name]
        }
    }

    const DB: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/rg1/providers/Microsoft.Sql/servers/srv1/databases/db1";

    #[test]
    fn parse_typed_id() {
        let id = DatabaseId::parse(DB).unwrap();
        assert_eq!(id.resource_group_name, "rg1");
        assert_eq!(id.server_name, "srv1");
        assert_eq!(id.database_name, "db1");
        assert_eq!(id.id(), DB);
    }

    #[test]
    fn parse_rejects_wrong_casing_unless_insensitive() {
        let lowered = DB.replace("resourceGroups", "resourcegroups");
        let err = DatabaseId::parse(&lowered).unwrap_err();
        assert!(matches!(err, ResourceIdError::UnexpectedSegment { position: 2, .. }));

        let id = DatabaseId::parse_insensitively(&lowered).unwrap();
        assert_eq!(id.id(), DB);
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        let server = "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.Sql/servers/srv1";
        let err = DatabaseId::parse(server).unwrap_err();
        assert!(matches!(
            err,
            ResourceIdError::SegmentCount { want: 10, got: 8, .. }
        ));
        assert!(err.to_string().contains("Expected a Resource ID that matches"));
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(matches!(
            DatabaseId::parse("subscriptions/x").unwrap_err(),
            ResourceIdError::MissingLeadingSlash { .. }
        ));
        assert!(matches!(
            DatabaseId::parse(&format!("{}/", DB)).unwrap_err(),
            ResourceIdError::EmptySegment { .. }
        ));
        assert!(DatabaseId::parse("").is_err());
    }

    #[test]
    fn scope_ids_capture_leading_components() {
        let input = "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.ManagedServices/registrationDefinitions/def1";
        let id = DefinitionId::parse(input).unwrap();
        assert_eq!(id.scope, "/subscriptions/sub/resourceGroups/rg1");
        assert_eq!(id.name, "def1");
        assert_eq!(id.id(), input);

        let too_short = "/providers/Microsoft.ManagedServices/registrationDefinitions/def1";
        assert!(DefinitionId::parse(too_short).is_err());
    }

    #[test]
    fn example_id_uses_segment_examples() {
        assert_eq!(
            example_id(&DatabaseId::segments()),
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/example-resource-group/providers/Microsoft.Sql/servers/serverValue/databases/databaseValue"
        );
    }

    #[test]
    fn arm_resource_id_decomposes_paths() {
        let id: ArmResourceId = DB.parse().unwrap();
        assert_eq!(id.subscription_id, "12345678-1234-9876-4563-123456789012");
        assert_eq!(id.resource_group.as_deref(), Some("rg1"));
        assert_eq!(id.resource_type().as_deref(), Some("Microsoft.Sql/servers/databases"));
        assert_eq!(id.get("servers"), Some("srv1"));
        assert_eq!(id.name(), Some("db1"));
        assert_eq!(
            id.parent().unwrap().to_string(),
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/rg1/providers/Microsoft.Sql/servers/srv1"
        );
        assert_eq!(id.to_string(), DB);
    }

    #[test]
    fn arm_resource_id_rejects_dangling_type() {
        assert!(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Sql/servers"
                .parse::<ArmResourceId>()
                .is_err()
        );
        assert!("/resourceGroups/rg".parse::<ArmResourceId>().is_err());
    }

    fn component() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9_.()-]{0,20}"
    }

    proptest! {
        #[test]
        fn typed_id_round_trips(sub in component(), rg in component(), srv in component(), db in component()) {
            let id = DatabaseId {
                subscription_id: sub,
                resource_group_name: rg,
                server_name: srv,
                database_name: db,
            };
            let formatted = id.id();
            let parsed = DatabaseId::parse(&formatted).unwrap();
            prop_assert_eq!(&parsed, &id);
            prop_assert_eq!(parsed.id(), formatted);
        }

        #[test]
        fn scope_id_round_trips(parts in proptest::collection::vec(component(), 1..6), name in component()) {
            let id = DefinitionId {
                scope: format!("/{}", parts.join("/")),
                name,
            };
            let parsed = DefinitionId::parse(&id.id()).unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn arm_resource_id_round_trips(
            sub in component(),
            rg in proptest::option::of(component()),
            pairs in proptest::collection::vec((component(), component()), 1..4),
        ) {
            let mut s = format!("/subscriptions/{}", sub);
            if let Some(rg) = &rg {
                s.push_str(&format!("/resourceGroups/{}", rg));
            }
            s.push_str("/providers/Microsoft.Example");
            for (kind, name) in &pairs {
                s.push_str(&format!("/{}/{}", kind, name));
            }
            let parsed: ArmResourceId = s.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), s);
        }
    }
}
