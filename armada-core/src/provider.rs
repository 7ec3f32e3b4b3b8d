//! Provider - Traits abstracting resource operations
//!
//! A [`Provider`] is the object-safe surface the CLI drives. Providers are
//! assembled from one [`ResourceHandler`] per resource type (and one
//! [`DataSourceHandler`] per data source), each receiving the provider's typed
//! context `C` instead of an untyped bag of clients.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::differ::Diff;
use crate::lro::LroError;
use crate::resource::{Resource, ResourceAddress, State};
use crate::resource_id::ResourceIdError;
use crate::schema::{ResourceSchema, TypeError};

/// Broad classification of provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    /// The resource exists but is not tracked; it must be imported first
    AlreadyExists,
    MalformedId,
    Validation,
    RequiresReplacement,
    Transient,
    Timeout,
    Cancelled,
    Api,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::MalformedId => "malformed id",
            ErrorKind::Validation => "validation",
            ErrorKind::RequiresReplacement => "requires replacement",
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Api => "api",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource: Option<ResourceAddress>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref address) = self.resource {
            write!(f, "[{}] {}", address, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            resource: None,
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::NotFound)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Validation)
    }

    /// The resource already exists outside of our state
    pub fn requires_import(resource_type: &str, id: &str) -> Self {
        Self::new(format!(
            "A resource with the ID {:?} already exists - to be managed by armada this resource \
             needs to be imported into the state. Please see the documentation for {:?} for more information.",
            id, resource_type
        ))
        .with_kind(ErrorKind::AlreadyExists)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_resource(mut self, address: ResourceAddress) -> Self {
        self.resource = Some(address);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Prefix the message with the operation that failed (e.g. "creating SQL Server ...")
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

impl From<ResourceIdError> for ProviderError {
    fn from(e: ResourceIdError) -> Self {
        ProviderError::new(e.to_string())
            .with_kind(ErrorKind::MalformedId)
            .with_cause(e)
    }
}

impl From<TypeError> for ProviderError {
    fn from(e: TypeError) -> Self {
        ProviderError::validation(e.to_string()).with_cause(e)
    }
}

impl From<LroError> for ProviderError {
    fn from(e: LroError) -> Self {
        match e {
            LroError::Poll(cause) => match cause.downcast::<ProviderError>() {
                Ok(inner) => *inner,
                Err(other) => ProviderError {
                    kind: ErrorKind::Transient,
                    message: format!("polling failed: {}", other),
                    resource: None,
                    cause: Some(other),
                },
            },
            LroError::Cancelled => ProviderError::new(e.to_string()).with_kind(ErrorKind::Cancelled),
            LroError::Exhausted { .. } => {
                ProviderError::new(e.to_string()).with_kind(ErrorKind::Timeout)
            }
            LroError::Failed(_) | LroError::Canceled => {
                ProviderError::new(e.to_string()).with_kind(ErrorKind::Api)
            }
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "azurerm")
    fn name(&self) -> &'static str;

    /// Schemas of every managed resource type, sorted by type name
    fn schemas(&self) -> Vec<ResourceSchema>;

    /// Schemas of every data source, sorted by type name
    fn data_source_schemas(&self) -> Vec<ResourceSchema>;

    /// Schema of one resource or data source type
    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.schemas()
            .into_iter()
            .chain(self.data_source_schemas())
            .find(|s| s.resource_type == resource_type)
    }

    /// Check a configuration against its schema without calling the API
    fn validate(&self, resource: &Resource) -> ProviderResult<()>;

    /// Diff a configuration against the current state, after schema
    /// defaults and normalizers have been applied to the configuration
    fn plan(&self, desired: &Resource, current: &State) -> ProviderResult<Diff>;

    /// Get the current state of a resource by its ARM ID
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<State>>;

    /// Re-read a tracked resource, keeping sensitive values the API never returns
    fn refresh(&self, prior: &State) -> BoxFuture<'_, ProviderResult<State>>;

    /// Read a data source using its configuration as the lookup key
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with id set to the ARM resource ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource; deleting something already gone succeeds
    fn delete(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Bring an existing resource under management
    fn import(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        (**self).schemas()
    }

    fn data_source_schemas(&self) -> Vec<ResourceSchema> {
        (**self).data_source_schemas()
    }

    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        (**self).schema(resource_type)
    }

    fn validate(&self, resource: &Resource) -> ProviderResult<()> {
        (**self).validate(resource)
    }

    fn plan(&self, desired: &Resource, current: &State) -> ProviderResult<Diff> {
        (**self).plan(desired, current)
    }

    fn read(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(address, id)
    }

    fn refresh(&self, prior: &State) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).refresh(prior)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, from, to)
    }

    fn delete(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(address, id)
    }

    fn import(
        &self,
        address: &ResourceAddress,
        id: &str,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(address, id)
    }
}

/// CRUD handler for one resource type
///
/// Handlers are only called with configurations that already passed schema
/// validation, with defaults applied.
#[async_trait]
pub trait ResourceHandler<C: Send + Sync>: Send + Sync {
    /// Resource type name (e.g., "azurerm_mssql_server")
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Check that `id` has the shape this resource type expects
    fn validate_id(&self, id: &str) -> Result<(), ResourceIdError>;

    async fn create(&self, ctx: &C, resource: &Resource) -> ProviderResult<State>;

    /// Returns `State::not_found` when the remote object is gone
    async fn read(&self, ctx: &C, address: &ResourceAddress, id: &str) -> ProviderResult<State>;

    async fn update(
        &self,
        ctx: &C,
        id: &str,
        from: &State,
        to: &Resource,
        changed: &[String],
    ) -> ProviderResult<State>;

    async fn delete(&self, ctx: &C, id: &str) -> ProviderResult<()>;
}

/// Read-only lookup for one data source type
#[async_trait]
pub trait DataSourceHandler<C: Send + Sync>: Send + Sync {
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, ctx: &C, resource: &Resource) -> ProviderResult<State>;
}
