//! Lifecycle - Drive resource handlers through the Provider interface
//!
//! [`Lifecycle`] owns the handler registry and the provider's typed context.
//! It performs the work common to every resource type before a handler is
//! called: schema validation with defaults, per-operation timeouts,
//! replacement detection and preservation of sensitive attributes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::differ::{self, Diff, changed_attributes};
use crate::provider::{
    BoxFuture, DataSourceHandler, ErrorKind, Provider, ProviderError, ProviderResult,
    ResourceHandler,
};
use crate::resource::{Attributes, Resource, ResourceAddress, State};
use crate::schema::ResourceSchema;

/// A [`Provider`] assembled from per-type handlers sharing one context
pub struct Lifecycle<C> {
    name: &'static str,
    context: Arc<C>,
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler<C>>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler<C>>>,
}

impl<C: Send + Sync + 'static> Lifecycle<C> {
    pub fn new(name: &'static str, context: C) -> Self {
        Self {
            name,
            context: Arc::new(context),
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, handler: impl ResourceHandler<C> + 'static) -> Self {
        self.resources
            .insert(handler.resource_type(), Box::new(handler));
        self
    }

    pub fn with_data_source(mut self, handler: impl DataSourceHandler<C> + 'static) -> Self {
        self.data_sources
            .insert(handler.resource_type(), Box::new(handler));
        self
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Registered resource type names, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    fn handler(&self, address: &ResourceAddress) -> ProviderResult<&dyn ResourceHandler<C>> {
        self.resources
            .get(address.resource_type.as_str())
            .map(|h| h.as_ref())
            .ok_or_else(|| unknown_type(address, "resource"))
    }

    fn data_source(&self, address: &ResourceAddress) -> ProviderResult<&dyn DataSourceHandler<C>> {
        self.data_sources
            .get(address.resource_type.as_str())
            .map(|h| h.as_ref())
            .ok_or_else(|| unknown_type(address, "data source"))
    }

    async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let handler = self.handler(&resource.address)?;
        let schema = handler.schema();
        let resource = prepare(&schema, resource)?;

        debug!("creating {}", resource.address);
        let state = with_timeout(
            schema.timeouts.create,
            "create",
            handler.create(&self.context, &resource),
        )
        .await?;

        if state.id.is_none() {
            return Err(ProviderError::new("create returned a state without an ID")
                .for_resource(resource.address.clone()));
        }
        Ok(preserve_sensitive(&schema, &resource.attributes, state))
    }

    async fn read_resource(
        &self,
        address: &ResourceAddress,
        id: &str,
        prior: Option<&Attributes>,
    ) -> ProviderResult<State> {
        let handler = self.handler(address)?;
        let schema = handler.schema();

        let state = with_timeout(
            schema.timeouts.read,
            "read",
            handler.read(&self.context, address, id),
        )
        .await?;

        match prior {
            Some(prior) if state.exists => Ok(preserve_sensitive(&schema, prior, state)),
            _ => Ok(state),
        }
    }

    async fn update_resource(&self, id: &str, from: &State, to: &Resource) -> ProviderResult<State> {
        let handler = self.handler(&to.address)?;
        let schema = handler.schema();
        let to = prepare(&schema, to)?;

        let changed = changed_attributes(&to.attributes, &from.attributes, &schema);
        let forced: Vec<&str> = schema
            .force_new_attributes()
            .into_iter()
            .filter(|name| changed.iter().any(|c| c == name))
            .collect();
        if !forced.is_empty() {
            return Err(ProviderError::new(format!(
                "changing {} requires replacing the resource",
                forced.join(", ")
            ))
            .with_kind(ErrorKind::RequiresReplacement)
            .for_resource(to.address.clone()));
        }

        if changed.is_empty() {
            debug!("{} is up to date", to.address);
            return Ok(from.clone());
        }

        debug!("updating {} ({})", to.address, changed.join(", "));
        let state = with_timeout(
            schema.timeouts.update,
            "update",
            handler.update(&self.context, id, from, &to, &changed),
        )
        .await?;
        Ok(preserve_sensitive(&schema, &to.attributes, state))
    }

    async fn delete_resource(&self, address: &ResourceAddress, id: &str) -> ProviderResult<()> {
        let handler = self.handler(address)?;
        let schema = handler.schema();
        debug!("deleting {}", address);
        with_timeout(schema.timeouts.delete, "delete", handler.delete(&self.context, id)).await
    }

    async fn import_resource(&self, address: &ResourceAddress, id: &str) -> ProviderResult<State> {
        let handler = self.handler(address)?;
        handler
            .validate_id(id)
            .map_err(|e| ProviderError::from(e).for_resource(address.clone()))?;

        let state = self.read_resource(address, id, None).await?;
        if !state.exists {
            return Err(ProviderError::not_found(format!(
                "cannot import non-existent remote object {:?}",
                id
            ))
            .for_resource(address.clone()));
        }
        Ok(state)
    }

    async fn read_data(&self, resource: &Resource) -> ProviderResult<State> {
        let handler = self.data_source(&resource.address)?;
        let schema = handler.schema();
        let resource = prepare(&schema, resource)?;
        with_timeout(
            schema.timeouts.read,
            "read",
            handler.read(&self.context, &resource),
        )
        .await
    }
}

fn unknown_type(address: &ResourceAddress, what: &str) -> ProviderError {
    ProviderError::validation(format!(
        "unsupported {} type {:?}",
        what, address.resource_type
    ))
    .for_resource(address.clone())
}

/// Apply schema defaults, normalize and validate
fn prepare(schema: &ResourceSchema, resource: &Resource) -> ProviderResult<Resource> {
    let mut resource = resource.clone();
    schema.apply_defaults(&mut resource.attributes);
    schema.normalize(&mut resource.attributes);
    schema.validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ProviderError::validation(format!("invalid configuration: {}", messages.join("; ")))
            .for_resource(resource.address.clone())
    })?;
    Ok(resource)
}

/// Copy sensitive attributes the API never echoes back
fn preserve_sensitive(schema: &ResourceSchema, source: &Attributes, mut state: State) -> State {
    for attr in schema.attributes.values().filter(|a| a.sensitive) {
        if !state.attributes.contains_key(&attr.name)
            && let Some(value) = source.get(&attr.name)
        {
            state.attributes.insert(attr.name.clone(), value.clone());
        }
    }
    state
}

async fn with_timeout<T>(
    limit: Duration,
    operation: &str,
    fut: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::new(format!(
            "timed out after {:?} waiting for {} to complete",
            limit, operation
        ))
        .with_kind(ErrorKind::Timeout)),
    }
}

fn attach(address: &ResourceAddress, e: ProviderError) -> ProviderError {
    if e.resource.is_some() {
        e
    } else {
        e.for_resource(address.clone())
    }
}

impl<C: Send + Sync + 'static> Provider for Lifecycle<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        self.resources.values().map(|h| h.schema()).collect()
    }

    fn data_source_schemas(&self) -> Vec<ResourceSchema> {
        self.data_sources.values().map(|h| h.schema()).collect()
    }

    fn validate(&self, resource: &Resource) -> ProviderResult<()> {
        let schema = if resource.is_data_source() {
            self.data_source(&resource.address)?.schema()
        } else {
            self.handler(&resource.address)?.schema()
        };
        prepare(&schema, resource).map(|_| ())
    }

    fn plan(&self, desired: &Resource, current: &State) -> ProviderResult<Diff> {
        let schema = self.handler(&desired.address)?.schema();
        let desired = prepare(&schema, desired)?;
        Ok(differ::diff(&desired, current, &schema))
    }

    fn read(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let address = address.clone();
        let id = id.to_string();
        Box::pin(async move {
            self.read_resource(&address, &id, None)
                .await
                .map_err(|e| attach(&address, e))
        })
    }

    fn refresh(&self, prior: &State) -> BoxFuture<'_, ProviderResult<State>> {
        let prior = prior.clone();
        Box::pin(async move {
            let Some(id) = prior.id.as_deref() else {
                return Ok(State::not_found(prior.address.clone()));
            };
            self.read_resource(&prior.address, id, Some(&prior.attributes))
                .await
                .map_err(|e| attach(&prior.address, e))
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            self.read_data(&resource)
                .await
                .map_err(|e| attach(&resource.address, e))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            self.create_resource(&resource)
                .await
                .map_err(|e| attach(&resource.address, e))
        })
    }

    fn update(
        &self,
        id: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            self.update_resource(&id, &from, &to)
                .await
                .map_err(|e| attach(&to.address, e))
        })
    }

    fn delete(&self, address: &ResourceAddress, id: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let address = address.clone();
        let id = id.to_string();
        Box::pin(async move {
            self.delete_resource(&address, &id)
                .await
                .map_err(|e| attach(&address, e))
        })
    }

    fn import(
        &self,
        address: &ResourceAddress,
        id: &str,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let address = address.clone();
        let id = id.to_string();
        Box::pin(async move {
            self.import_resource(&address, &id)
                .await
                .map_err(|e| attach(&address, e))
        })
    }
}
