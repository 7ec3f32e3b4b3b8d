//! Transport - Send Resource Manager requests over HTTP
//!
//! [`Transport`] is the seam between the ARM client and the network. The
//! production implementation is [`HttpTransport`] (reqwest with rustls);
//! tests substitute an in-memory fake.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode};

use crate::config::{ProviderConfig, RetryConfig};

/// Maximum length of a body written to the debug log
const MAX_LOG_BODY_LENGTH: usize = 512;

/// Largest power of two applied to the retry base delay
const MAX_BACKOFF_EXPONENT: u32 = 10;

const USER_AGENT: &str = concat!("armada-provider-azurerm/", env!("CARGO_PKG_VERSION"));

/// One Resource Manager request
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRequest {
    pub method: Method,
    /// ARM path (`/subscriptions/...`) or an absolute URL returned by the service
    pub target: String,
    /// Appended as `api-version`; absolute polling URLs already carry one
    pub api_version: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl ArmRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            api_version: None,
            body: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response to an [`ArmRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct ArmResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    /// `None` for an empty body
    pub body: Option<serde_json::Value>,
}

impl ArmResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Delay requested through `Retry-After` (seconds form only)
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to obtain an access token: {0}")]
    Credential(String),
}

/// Supplies bearer tokens for Resource Manager
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self) -> Result<String, TransportError>;
}

/// A pre-issued token (e.g. from `az account get-access-token`)
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenCredential for StaticToken {
    async fn token(&self) -> Result<String, TransportError> {
        if self.0.is_empty() {
            return Err(TransportError::Credential("the access token is empty".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Sends requests and returns raw responses; non-2xx statuses are not errors here
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, TransportError>;
}

/// reqwest-backed transport with bearer auth and retries
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    credential: Box<dyn TokenCredential>,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl TokenCredential + 'static,
        retry: RetryConfig,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential: Box::new(credential),
            retry,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, TransportError> {
        Self::new(
            config.endpoint(),
            StaticToken::new(config.access_token.clone()),
            config.retry,
        )
    }

    fn url(&self, request: &ArmRequest) -> String {
        let base = if request.target.starts_with("http://") || request.target.starts_with("https://") {
            request.target.clone()
        } else {
            format!("{}{}", self.endpoint, request.target)
        };
        match &request.api_version {
            Some(version) => {
                let sep = if base.contains('?') { '&' } else { '?' };
                format!("{}{}api-version={}", base, sep, version)
            }
            None => base,
        }
    }

    async fn send_once(&self, url: &str, request: &ArmRequest) -> Result<ArmResponse, TransportError> {
        let token = self.credential.token().await?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        debug!(
            "{} {} -> {} {}",
            request.method,
            url,
            status.as_u16(),
            truncate_for_log(&text)
        );

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&text).map_err(|source| TransportError::InvalidJson {
                    url: url.to_string(),
                    source,
                })?,
            )
        };

        Ok(ArmResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, TransportError> {
        let url = self.url(&request);
        let mut attempt = 0;

        loop {
            let result = self.send_once(&url, &request).await;

            let retry_after = match &result {
                Ok(response) if is_retryable_status(response.status) => {
                    Some(response.retry_after())
                }
                Err(TransportError::Request { source, .. })
                    if source.is_connect() || source.is_timeout() =>
                {
                    Some(None)
                }
                _ => None,
            };

            let Some(retry_after) = retry_after else {
                return result;
            };
            if attempt >= self.retry.max_retries {
                return result;
            }

            let delay = retry_after.unwrap_or_else(|| backoff(self.retry.base_delay, attempt));
            attempt += 1;
            warn!(
                "{} {} failed ({}), retrying in {:?} ({}/{})",
                request.method,
                url,
                describe(&result),
                delay,
                attempt,
                self.retry.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// `base * 2^attempt`, with the exponent capped at [`MAX_BACKOFF_EXPONENT`]
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
}

fn is_retryable_status(status: u16) -> bool {
    StatusCode::from_u16(status).is_ok_and(|s| {
        matches!(
            s,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    })
}

fn describe(result: &Result<ArmResponse, TransportError>) -> String {
    match result {
        Ok(response) => format!("status {}", response.status),
        Err(e) => e.to_string(),
    }
}

/// Truncate long bodies so logs stay readable
fn truncate_for_log(body: &str) -> String {
    if body.len() <= MAX_LOG_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_LOG_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
}
