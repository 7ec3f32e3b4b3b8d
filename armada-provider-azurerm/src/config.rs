//! Provider configuration
//!
//! Settings come from the environment (`ARM_*` variables) and can be
//! overridden with the builder setters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use armada_core::lro::PollerConfig;

/// Azure cloud the provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl Environment {
    /// Resource Manager endpoint for this cloud
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            Environment::Public => "https://management.azure.com",
            Environment::UsGovernment => "https://management.usgovcloudapi.net",
            Environment::China => "https://management.chinacloudapi.cn",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "azurepubliccloud" => Ok(Environment::Public),
            "usgovernment" | "azureusgovernmentcloud" => Ok(Environment::UsGovernment),
            "china" | "azurechinacloud" => Ok(Environment::China),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Public => "public",
            Environment::UsGovernment => "usgovernment",
            Environment::China => "china",
        };
        f.write_str(s)
    }
}

/// Opt-in behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Features {
    /// Skip the "requires import" check and adopt existing resources on create
    pub import_existing_on_create: bool,
}

/// Retry policy for throttled or failed HTTP calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// First backoff delay; doubled on every retry unless the server sends `Retry-After`
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("unknown Azure environment {0:?} (expected public, usgovernment or china)")]
    UnknownEnvironment(String),

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

/// Provider settings
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub subscription_id: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub environment: Environment,
    /// Bearer token for Resource Manager
    pub access_token: String,
    /// Overrides the environment's Resource Manager endpoint (used by tests)
    pub endpoint: Option<String>,
    pub features: Features,
    pub poller: PollerConfig,
    pub retry: RetryConfig,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("environment", &self.environment)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("features", &self.features)
            .field("poller", &self.poller)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(subscription_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            tenant_id: None,
            client_id: None,
            environment: Environment::default(),
            access_token: access_token.into(),
            endpoint: None,
            features: Features::default(),
            poller: PollerConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Read `ARM_SUBSCRIPTION_ID`, `ARM_ACCESS_TOKEN`, `ARM_TENANT_ID`,
    /// `ARM_CLIENT_ID`, `ARM_ENVIRONMENT` and `ARM_IMPORT_EXISTING_ON_CREATE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let subscription_id =
            get("ARM_SUBSCRIPTION_ID").ok_or(ConfigError::Missing("ARM_SUBSCRIPTION_ID"))?;
        let access_token =
            get("ARM_ACCESS_TOKEN").ok_or(ConfigError::Missing("ARM_ACCESS_TOKEN"))?;

        let mut config = Self::new(subscription_id, access_token);
        config.tenant_id = get("ARM_TENANT_ID");
        config.client_id = get("ARM_CLIENT_ID");
        if let Some(env) = get("ARM_ENVIRONMENT") {
            config.environment = env.parse()?;
        }
        if let Some(raw) = get("ARM_IMPORT_EXISTING_ON_CREATE") {
            config.features.import_existing_on_create =
                parse_bool("ARM_IMPORT_EXISTING_ON_CREATE", &raw)?;
        }
        Ok(config)
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_poller(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resource Manager base URL without a trailing slash
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.environment.resource_manager_endpoint())
            .trim_end_matches('/')
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}
