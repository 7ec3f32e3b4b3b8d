//! Azure Resource Manager client
//!
//! This module turns raw transport responses into typed results: it
//! classifies ARM error envelopes, follows long-running operations
//! (`Azure-AsyncOperation` and `Location` polling) and exposes a typed
//! per-resource client keyed by resource IDs.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use armada_core::lro::{LroError, PollStatus, Pollable, PollerConfig, poll_until_done};
use armada_core::provider::{ErrorKind, ProviderError};
use armada_core::resource_id::ResourceIdentifier;
use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::transport::{ArmRequest, ArmResponse, Transport, TransportError};

/// Errors returned by the ARM client
#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("conflict: {message}")]
    Conflict { code: String, message: String },

    #[error("unexpected status {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("decoding response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encoding request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("response had an empty body")]
    EmptyBody,

    #[error(transparent)]
    Lro(#[from] LroError),
}

impl ArmError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ArmError::NotFound { .. } => true,
            ArmError::Lro(LroError::Poll(cause)) => cause
                .downcast_ref::<ArmError>()
                .is_some_and(ArmError::is_not_found),
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ArmError::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ArmError::Transport(TransportError::Request { .. }) => true,
            _ => false,
        }
    }

    /// Provider error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            _ if self.is_not_found() => ErrorKind::NotFound,
            _ if self.is_retryable() => ErrorKind::Transient,
            ArmError::Lro(LroError::Poll(cause)) => cause
                .downcast_ref::<ArmError>()
                .map_or(ErrorKind::Transient, ArmError::kind),
            ArmError::Lro(LroError::Cancelled) => ErrorKind::Cancelled,
            ArmError::Lro(LroError::Exhausted { .. }) => ErrorKind::Timeout,
            ArmError::Decode(_) | ArmError::Encode(_) | ArmError::EmptyBody => ErrorKind::Internal,
            ArmError::Transport(_) => ErrorKind::Transient,
            _ => ErrorKind::Api,
        }
    }

    fn from_response(response: &ArmResponse) -> Self {
        let (code, message) = error_envelope(response);
        match response.status {
            404 => ArmError::NotFound { message },
            409 => ArmError::Conflict { code, message },
            status => ArmError::Api {
                status,
                code,
                message,
            },
        }
    }
}

impl From<ArmError> for ProviderError {
    fn from(e: ArmError) -> Self {
        let kind = e.kind();
        ProviderError::new(e.to_string()).with_kind(kind).with_cause(e)
    }
}

/// Extract `(code, message)` from the ARM error envelope
/// `{"error": {"code": "...", "message": "..."}}`
fn error_envelope(response: &ArmResponse) -> (String, String) {
    let error = response.body.as_ref().and_then(|b| b.get("error"));
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let code = field("code").unwrap_or_else(|| "Unknown".to_string());
    let message = field("message").unwrap_or_else(|| format!("status {}", response.status));
    (code, message)
}

/// Shared handle for issuing ARM requests
#[derive(Clone)]
pub struct ArmClient {
    transport: Arc<dyn Transport>,
    poller: PollerConfig,
    cancel: CancellationToken,
}

impl ArmClient {
    pub fn new(transport: Arc<dyn Transport>, poller: PollerConfig, cancel: CancellationToken) -> Self {
        Self {
            transport,
            poller,
            cancel,
        }
    }

    pub fn poller(&self) -> &PollerConfig {
        &self.poller
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Send a request; non-2xx responses become [`ArmError`]s
    pub async fn send(&self, request: ArmRequest) -> Result<ArmResponse, ArmError> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ArmError::from_response(&response))
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str, api_version: &str) -> Result<T, ArmError> {
        let response = self
            .send(ArmRequest::new(Method::GET, id).with_api_version(api_version))
            .await?;
        decode(response)
    }

    /// PUT and wait for provisioning; returns the resource as read afterwards
    pub async fn put<B, T>(&self, id: &str, api_version: &str, body: &B) -> Result<T, ArmError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.write(Method::PUT, id, api_version, body).await
    }

    /// PATCH and wait for provisioning; returns the resource as read afterwards
    pub async fn patch<B, T>(&self, id: &str, api_version: &str, body: &B) -> Result<T, ArmError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.write(Method::PATCH, id, api_version, body).await
    }

    async fn write<B, T>(&self, method: Method, id: &str, api_version: &str, body: &B) -> Result<T, ArmError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(ArmError::Encode)?;
        let response = self
            .send(
                ArmRequest::new(method, id)
                    .with_api_version(api_version)
                    .with_body(body),
            )
            .await?;

        if self.wait_for_completion(&response).await? || response.body.is_none() {
            return self.get(id, api_version).await;
        }
        decode(response)
    }

    /// DELETE and wait; a resource that is already gone counts as deleted
    pub async fn delete(&self, id: &str, api_version: &str) -> Result<(), ArmError> {
        let response = match self
            .send(ArmRequest::new(Method::DELETE, id).with_api_version(api_version))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        match self.wait_for_completion(&response).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    /// Follow the long-running operation a response points at, if any.
    /// Returns whether polling happened.
    async fn wait_for_completion(&self, response: &ArmResponse) -> Result<bool, ArmError> {
        if let Some(url) = response.header("azure-asyncoperation") {
            debug!("waiting for async operation {}", url);
            let mut poller = AsyncOperationPoller::new(self.clone(), url, response.retry_after());
            poll_until_done(&mut poller, &self.poller, &self.cancel).await?;
            return Ok(true);
        }
        if response.status == 202
            && let Some(url) = response.header("location")
        {
            debug!("waiting for operation at {}", url);
            let mut poller = LocationPoller::new(self.clone(), url, response.retry_after());
            poll_until_done(&mut poller, &self.poller, &self.cancel).await?;
            return Ok(true);
        }
        Ok(false)
    }
}

fn decode<T: DeserializeOwned>(response: ArmResponse) -> Result<T, ArmError> {
    let body = response.body.ok_or(ArmError::EmptyBody)?;
    serde_json::from_value(body).map_err(ArmError::Decode)
}

/// Polls the `Azure-AsyncOperation` URL; the body's `status` is authoritative
pub struct AsyncOperationPoller {
    client: ArmClient,
    url: String,
    retry_after: Option<Duration>,
}

impl AsyncOperationPoller {
    pub fn new(client: ArmClient, url: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            client,
            url: url.into(),
            retry_after,
        }
    }
}

#[async_trait]
impl Pollable for AsyncOperationPoller {
    type Output = ();
    type Error = ArmError;

    async fn poll(&mut self) -> Result<PollStatus<()>, ArmError> {
        let response = self
            .client
            .send(ArmRequest::new(Method::GET, self.url.clone()))
            .await?;
        self.retry_after = response.retry_after();

        let body = response.body.unwrap_or_default();
        let status = body.get("status").and_then(|s| s.as_str()).unwrap_or("InProgress");
        Ok(match status.to_ascii_lowercase().as_str() {
            "succeeded" => PollStatus::Succeeded(()),
            "failed" => {
                let message = body
                    .pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("the operation failed without an error message");
                PollStatus::Failed(message.to_string())
            }
            "canceled" | "cancelled" => PollStatus::Canceled,
            _ => PollStatus::InProgress,
        })
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Polls a `Location` URL; 202 means the operation is still running
pub struct LocationPoller {
    client: ArmClient,
    url: String,
    retry_after: Option<Duration>,
}

impl LocationPoller {
    pub fn new(client: ArmClient, url: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            client,
            url: url.into(),
            retry_after,
        }
    }
}

#[async_trait]
impl Pollable for LocationPoller {
    type Output = ();
    type Error = ArmError;

    async fn poll(&mut self) -> Result<PollStatus<()>, ArmError> {
        let response = self
            .client
            .send(ArmRequest::new(Method::GET, self.url.clone()))
            .await?;
        self.retry_after = response.retry_after();
        Ok(if response.status == 202 {
            PollStatus::InProgress
        } else {
            PollStatus::Succeeded(())
        })
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Typed client for one kind of resource, keyed by its resource ID type
pub struct ResourceClient<I, M> {
    arm: ArmClient,
    api_version: &'static str,
    _marker: PhantomData<fn() -> (I, M)>,
}

impl<I, M> Clone for ResourceClient<I, M> {
    fn clone(&self) -> Self {
        Self {
            arm: self.arm.clone(),
            api_version: self.api_version,
            _marker: PhantomData,
        }
    }
}

impl<I, M> ResourceClient<I, M>
where
    I: ResourceIdentifier,
    M: Serialize + DeserializeOwned + Sync,
{
    pub fn new(arm: ArmClient, api_version: &'static str) -> Self {
        Self {
            arm,
            api_version,
            _marker: PhantomData,
        }
    }

    pub fn api_version(&self) -> &'static str {
        self.api_version
    }

    pub fn arm(&self) -> &ArmClient {
        &self.arm
    }

    pub async fn get(&self, id: &I) -> Result<M, ArmError> {
        self.arm.get(&id.id(), self.api_version).await
    }

    /// `Ok(None)` when the resource does not exist
    pub async fn get_optional(&self, id: &I) -> Result<Option<M>, ArmError> {
        match self.get(id).await {
            Ok(model) => Ok(Some(model)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whole-object PUT
    pub async fn create_or_update(&self, id: &I, model: &M) -> Result<M, ArmError> {
        self.arm.put(&id.id(), self.api_version, model).await
    }

    /// Partial PATCH with an update model
    pub async fn update<P: Serialize + Sync>(&self, id: &I, patch: &P) -> Result<M, ArmError> {
        self.arm.patch(&id.id(), self.api_version, patch).await
    }

    pub async fn delete(&self, id: &I) -> Result<(), ArmError> {
        self.arm.delete(&id.id(), self.api_version).await
    }
}
