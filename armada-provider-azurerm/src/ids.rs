//! Typed resource IDs for the resources this provider manages
//!
//! Every ID type parses exactly one ARM path shape and formats back to the
//! same string. `Display` renders a human description used in error messages
//! (e.g. `SQL Database "db" (Server "srv" / Resource Group "rg")`).

use std::fmt;

use armada_core::resource_id::{ParsedResourceId, ResourceIdError, ResourceIdentifier, Segment};

/// Declare an ID nested under a resource group:
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/...]`
macro_rules! resource_group_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident in $namespace:literal {
            $( $fixed:literal / $field:ident = $example:literal ),+ $(,)?
        }
        $( tail [ $( $tail:literal ),+ ] )?
        display($fmt:literal $(, $arg:ident)* $(,)?)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            pub subscription_id: String,
            pub resource_group_name: String,
            $( pub $field: String, )+
        }

        impl $name {
            pub fn new(
                subscription_id: impl Into<String>,
                resource_group_name: impl Into<String>,
                $( $field: impl Into<String>, )+
            ) -> Self {
                Self {
                    subscription_id: subscription_id.into(),
                    resource_group_name: resource_group_name.into(),
                    $( $field: $field.into(), )+
                }
            }
        }

        impl ResourceIdentifier for $name {
            fn segments() -> Vec<Segment> {
                let mut segments = Segment::resource_group_prefix();
                segments.push(Segment::fixed("providers"));
                segments.push(Segment::provider($namespace));
                $(
                    segments.push(Segment::fixed($fixed));
                    segments.push(Segment::user(stringify!($field), $example));
                )+
                $( $( segments.push(Segment::fixed($tail)); )+ )?
                segments
            }

            fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError> {
                Ok(Self {
                    subscription_id: parsed.owned("subscription_id")?,
                    resource_group_name: parsed.owned("resource_group_name")?,
                    $( $field: parsed.owned(stringify!($field))?, )+
                })
            }

            fn user_values(&self) -> Vec<&str> {
                vec![
                    self.subscription_id.as_str(),
                    self.resource_group_name.as_str(),
                    $( self.$field.as_str(), )+
                ]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $fmt $(, self.$arg)*)
            }
        }
    };
}

/// `/subscriptions/{subscription_id}/resourceGroups/{resource_group_name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceGroupId {
    pub subscription_id: String,
    pub resource_group_name: String,
}

impl ResourceGroupId {
    pub fn new(subscription_id: impl Into<String>, resource_group_name: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group_name: resource_group_name.into(),
        }
    }
}

impl ResourceIdentifier for ResourceGroupId {
    fn segments() -> Vec<Segment> {
        Segment::resource_group_prefix()
    }

    fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError> {
        Ok(Self {
            subscription_id: parsed.owned("subscription_id")?,
            resource_group_name: parsed.owned("resource_group_name")?,
        })
    }

    fn user_values(&self) -> Vec<&str> {
        vec![self.subscription_id.as_str(), self.resource_group_name.as_str()]
    }
}

impl fmt::Display for ResourceGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource Group {:?}", self.resource_group_name)
    }
}

resource_group_id! {
    pub struct MssqlServerId in "Microsoft.Sql" {
        "servers" / server_name = "serverValue",
    }
    display("SQL Server {:?} (Resource Group {:?})", server_name, resource_group_name)
}

resource_group_id! {
    pub struct MssqlDatabaseId in "Microsoft.Sql" {
        "servers" / server_name = "serverValue",
        "databases" / database_name = "databaseValue",
    }
    display(
        "SQL Database {:?} (Server {:?} / Resource Group {:?})",
        database_name,
        server_name,
        resource_group_name,
    )
}

resource_group_id! {
    /// The retention policy is a singleton child named `default`
    pub struct ShortTermRetentionPolicyId in "Microsoft.Sql" {
        "servers" / server_name = "serverValue",
        "databases" / database_name = "databaseValue",
    }
    tail ["backupShortTermRetentionPolicies", "default"]
    display(
        "Short Term Retention Policy (Database {:?} / Server {:?} / Resource Group {:?})",
        database_name,
        server_name,
        resource_group_name,
    )
}

resource_group_id! {
    pub struct MetricAlertId in "Microsoft.Insights" {
        "metricAlerts" / metric_alert_name = "metricAlertValue",
    }
    display("Metric Alert {:?} (Resource Group {:?})", metric_alert_name, resource_group_name)
}

resource_group_id! {
    pub struct MediaServicesAccountId in "Microsoft.Media" {
        "mediaServices" / account_name = "accountValue",
    }
    display("Media Services Account {:?} (Resource Group {:?})", account_name, resource_group_name)
}

resource_group_id! {
    pub struct TransformId in "Microsoft.Media" {
        "mediaServices" / account_name = "accountValue",
        "transforms" / transform_name = "transformValue",
    }
    display(
        "Transform {:?} (Media Services Account {:?} / Resource Group {:?})",
        transform_name,
        account_name,
        resource_group_name,
    )
}

impl MssqlServerId {
    pub fn resource_group_id(&self) -> ResourceGroupId {
        ResourceGroupId::new(&self.subscription_id, &self.resource_group_name)
    }
}

impl MssqlDatabaseId {
    pub fn server_id(&self) -> MssqlServerId {
        MssqlServerId::new(&self.subscription_id, &self.resource_group_name, &self.server_name)
    }

    pub fn short_term_retention_policy_id(&self) -> ShortTermRetentionPolicyId {
        ShortTermRetentionPolicyId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.server_name,
            &self.database_name,
        )
    }
}

impl ShortTermRetentionPolicyId {
    pub fn database_id(&self) -> MssqlDatabaseId {
        MssqlDatabaseId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.server_name,
            &self.database_name,
        )
    }
}

impl MediaServicesAccountId {
    pub fn transform_id(&self, transform_name: impl Into<String>) -> TransformId {
        TransformId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.account_name,
            transform_name,
        )
    }
}

/// `{scope}/providers/Microsoft.ManagedServices/registrationDefinitions/{registration_definition_id}`
///
/// The scope is usually a subscription (`/subscriptions/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationDefinitionId {
    pub scope: String,
    pub registration_definition_id: String,
}

impl RegistrationDefinitionId {
    pub fn new(scope: impl Into<String>, registration_definition_id: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            registration_definition_id: registration_definition_id.into(),
        }
    }
}

impl ResourceIdentifier for RegistrationDefinitionId {
    fn segments() -> Vec<Segment> {
        vec![
            Segment::scope("scope", "/subscriptions/12345678-1234-9876-4563-123456789012"),
            Segment::fixed("providers"),
            Segment::provider("Microsoft.ManagedServices"),
            Segment::fixed("registrationDefinitions"),
            Segment::user("registration_definition_id", "registrationDefinitionIdValue"),
        ]
    }

    fn from_parsed(parsed: &ParsedResourceId) -> Result<Self, ResourceIdError> {
        Ok(Self {
            scope: parsed.owned("scope")?,
            registration_definition_id: parsed.owned("registration_definition_id")?,
        })
    }

    fn user_values(&self) -> Vec<&str> {
        vec![self.scope.as_str(), self.registration_definition_id.as_str()]
    }
}

impl fmt::Display for RegistrationDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registration Definition {:?} (Scope {:?})",
            self.registration_definition_id, self.scope
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DB: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Sql/servers/srv/databases/db";

    #[test]
    fn database_id_round_trips() {
        let id = MssqlDatabaseId::parse(DB).unwrap();
        assert_eq!(id.server_name, "srv");
        assert_eq!(id.database_name, "db");
        assert_eq!(id.id(), DB);
        assert_eq!(
            id.server_id().id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Sql/servers/srv"
        );
        assert_eq!(
            id.to_string(),
            r#"SQL Database "db" (Server "srv" / Resource Group "rg")"#
        );
    }

    #[test]
    fn retention_policy_has_fixed_tail() {
        let id = MssqlDatabaseId::parse(DB).unwrap().short_term_retention_policy_id();
        assert_eq!(id.id(), format!("{}/backupShortTermRetentionPolicies/default", DB));
        assert_eq!(ShortTermRetentionPolicyId::parse(&id.id()).unwrap(), id);

        let err = ShortTermRetentionPolicyId::parse(&format!("{}/backupShortTermRetentionPolicies/other", DB))
            .unwrap_err();
        assert!(matches!(err, ResourceIdError::UnexpectedSegment { ref want, .. } if want == "default"));
    }

    #[test]
    fn parsing_a_parent_id_as_child_fails() {
        let err = MssqlDatabaseId::parse(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Sql/servers/srv",
        )
        .unwrap_err();
        assert!(matches!(err, ResourceIdError::SegmentCount { want: 10, got: 8, .. }));
        assert!(err.to_string().contains(
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/example-resource-group/providers/Microsoft.Sql/servers/serverValue/databases/databaseValue"
        ));
    }

    #[test]
    fn insensitive_parsing_normalizes_casing() {
        let id = MetricAlertId::parse_insensitively(
            "/subscriptions/sub/resourcegroups/rg/providers/microsoft.insights/metricalerts/cpu",
        )
        .unwrap();
        assert_eq!(
            id.id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Insights/metricAlerts/cpu"
        );
        assert!(MetricAlertId::parse(
            "/subscriptions/sub/resourcegroups/rg/providers/microsoft.insights/metricalerts/cpu"
        )
        .is_err());
    }

    #[test]
    fn registration_definition_scope_spans_components() {
        let raw = "/subscriptions/sub/providers/Microsoft.ManagedServices/registrationDefinitions/2f3c1f2e-7a5c-4c57-9a55-4f4b2b8b1f11";
        let id = RegistrationDefinitionId::parse(raw).unwrap();
        assert_eq!(id.scope, "/subscriptions/sub");
        assert_eq!(id.registration_definition_id, "2f3c1f2e-7a5c-4c57-9a55-4f4b2b8b1f11");
        assert_eq!(id.id(), raw);

        let rg_scoped = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ManagedServices/registrationDefinitions/x";
        assert_eq!(
            RegistrationDefinitionId::parse(rg_scoped).unwrap().scope,
            "/subscriptions/sub/resourceGroups/rg"
        );
    }

    #[test]
    fn transform_id_from_account() {
        let account = MediaServicesAccountId::new("sub", "rg", "media1");
        let id = account.transform_id("encode");
        assert_eq!(
            id.id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Media/mediaServices/media1/transforms/encode"
        );
        assert_eq!(TransformId::parse(&id.id()).unwrap(), id);
    }

    fn component() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9_.-]{0,20}"
    }

    proptest! {
        #[test]
        fn typed_ids_round_trip(sub in component(), rg in component(), server in component(), db in component()) {
            let id = ShortTermRetentionPolicyId::new(sub, rg, server, db);
            prop_assert_eq!(ShortTermRetentionPolicyId::parse(&id.id()).unwrap(), id.clone());
            prop_assert_eq!(ShortTermRetentionPolicyId::parse(&id.id()).unwrap().id(), id.id());
        }
    }
}
