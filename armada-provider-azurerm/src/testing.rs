//! In-memory Resource Manager used by unit tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use armada_core::lifecycle::Lifecycle;
use armada_core::lro::PollerConfig;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::{Features, ProviderConfig};
use crate::context::ProviderContext;
use crate::transport::{ArmRequest, ArmResponse, Transport, TransportError};

const OPERATIONS: &str = "https://fake.arm/operations/";

pub const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Provider backed by `fake`, polling every millisecond
pub fn provider(fake: Arc<FakeArm>) -> Lifecycle<ProviderContext> {
    provider_with_features(fake, Features::default())
}

pub fn provider_with_features(fake: Arc<FakeArm>, features: Features) -> Lifecycle<ProviderContext> {
    let config = ProviderConfig::new(SUBSCRIPTION_ID, "test-token")
        .with_features(features)
        .with_poller(
            PollerConfig::default()
                .with_interval(Duration::from_millis(1))
                .with_max_attempts(50),
        );
    crate::provider(&config, fake, CancellationToken::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Sync,
    AsyncOperation,
    Location,
}

#[derive(Debug, Clone)]
enum Pending {
    Put(String, Value),
    Delete(String),
}

#[derive(Debug)]
struct Operation {
    remaining: usize,
    pending: Option<Pending>,
}

#[derive(Default)]
struct Inner {
    resources: BTreeMap<String, Value>,
    operations: HashMap<String, Operation>,
    next_operation: u64,
    polls: usize,
    failures: VecDeque<(u16, String, String)>,
    requests: Vec<(Method, String)>,
}

/// Stores resources by ARM path. PUT replaces, PATCH merges, DELETE removes.
/// Writes can be made asynchronous (`202` + `Azure-AsyncOperation` or `Location`).
pub struct FakeArm {
    inner: Mutex<Inner>,
    style: Style,
    in_progress_polls: usize,
    operation_failure: Option<String>,
}

impl FakeArm {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            style: Style::Sync,
            in_progress_polls: 0,
            operation_failure: None,
        }
    }

    /// Writes return `Azure-AsyncOperation`, reporting `InProgress` `polls` times
    pub fn with_async_operations(mut self, polls: usize) -> Self {
        self.style = Style::AsyncOperation;
        self.in_progress_polls = polls;
        self
    }

    /// Writes return `202` with a `Location` header
    pub fn with_location_operations(mut self, polls: usize) -> Self {
        self.style = Style::Location;
        self.in_progress_polls = polls;
        self
    }

    /// Every async operation ends as `Failed` with this message
    pub fn with_failing_operations(mut self, message: &str) -> Self {
        self.style = Style::AsyncOperation;
        self.operation_failure = Some(message.to_string());
        self
    }

    pub fn with_resource(self, path: &str, body: Value) -> Self {
        self.insert(path, body);
        self
    }

    pub fn insert(&self, path: &str, body: Value) {
        let mut inner = self.lock();
        inner.resources.insert(path.to_string(), stamp(path, body));
    }

    pub fn resource(&self, path: &str) -> Option<Value> {
        self.lock().resources.get(path).cloned()
    }

    /// The next request fails with this ARM error
    pub fn fail_next(&self, status: u16, code: &str, message: &str) {
        self.lock()
            .failures
            .push_back((status, code.to_string(), message.to_string()));
    }

    pub fn operation_polls(&self) -> usize {
        self.lock().polls
    }

    /// Requests seen so far, excluding operation polls
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start_operation(&self, inner: &mut Inner, pending: Pending) -> String {
        inner.next_operation += 1;
        let url = format!("{}{}", OPERATIONS, inner.next_operation);
        inner.operations.insert(
            url.clone(),
            Operation {
                remaining: self.in_progress_polls,
                pending: Some(pending),
            },
        );
        url
    }

    fn poll(&self, inner: &mut Inner, url: &str) -> ArmResponse {
        inner.polls += 1;
        let Some(op) = inner.operations.get_mut(url) else {
            return not_found(url);
        };
        if op.remaining > 0 {
            op.remaining -= 1;
            return match self.style {
                Style::Location => ArmResponse::new(202).with_header("Location", url),
                _ => ArmResponse::new(200).with_body(json!({"status": "InProgress"})),
            };
        }

        if let Some(message) = &self.operation_failure {
            return ArmResponse::new(200).with_body(json!({
                "status": "Failed",
                "error": {"code": "OperationFailed", "message": message}
            }));
        }

        if let Some(pending) = op.pending.take() {
            apply(inner, pending);
        }
        match self.style {
            Style::Location => ArmResponse::new(200),
            _ => ArmResponse::new(200).with_body(json!({"status": "Succeeded"})),
        }
    }

    fn write(&self, inner: &mut Inner, pending: Pending) -> ArmResponse {
        let (status, body) = match &pending {
            Pending::Put(path, body) => (201, Some(stamp(path, body.clone()))),
            Pending::Delete(_) => (202, None),
        };

        match self.style {
            Style::Sync => {
                let path = match &pending {
                    Pending::Put(path, _) => Some(path.clone()),
                    Pending::Delete(_) => None,
                };
                apply(inner, pending);
                match path.and_then(|p| inner.resources.get(&p).cloned()) {
                    Some(body) => ArmResponse::new(200).with_body(body),
                    None => ArmResponse::new(200),
                }
            }
            Style::AsyncOperation => {
                let url = self.start_operation(inner, pending);
                let response = ArmResponse::new(status).with_header("Azure-AsyncOperation", url);
                match body {
                    Some(body) => response.with_body(body),
                    None => response,
                }
            }
            Style::Location => {
                let url = self.start_operation(inner, pending);
                ArmResponse::new(202).with_header("Location", url)
            }
        }
    }
}

impl Default for FakeArm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeArm {
    async fn send(&self, request: ArmRequest) -> Result<ArmResponse, TransportError> {
        let mut inner = self.lock();

        if request.target.starts_with(OPERATIONS) {
            return Ok(self.poll(&mut inner, &request.target));
        }

        inner
            .requests
            .push((request.method.clone(), request.target.clone()));

        if let Some((status, code, message)) = inner.failures.pop_front() {
            return Ok(ArmResponse::new(status)
                .with_body(json!({"error": {"code": code, "message": message}})));
        }

        let path = request.target.clone();
        let response = match request.method {
            Method::GET => match inner.resources.get(&path) {
                Some(body) => ArmResponse::new(200).with_body(body.clone()),
                None => not_found(&path),
            },
            Method::PUT => {
                let body = request.body.unwrap_or_else(|| json!({}));
                self.write(&mut inner, Pending::Put(path, body))
            }
            Method::PATCH => match inner.resources.get(&path).cloned() {
                Some(mut existing) => {
                    if let Some(patch) = &request.body {
                        merge(&mut existing, patch);
                    }
                    self.write(&mut inner, Pending::Put(path, existing))
                }
                None => not_found(&path),
            },
            Method::DELETE => {
                if inner.resources.contains_key(&path) {
                    self.write(&mut inner, Pending::Delete(path))
                } else {
                    ArmResponse::new(204)
                }
            }
            _ => ArmResponse::new(405),
        };
        Ok(response)
    }
}

fn apply(inner: &mut Inner, pending: Pending) {
    match pending {
        Pending::Put(path, body) => {
            let body = stamp(&path, body);
            inner.resources.insert(path, body);
        }
        Pending::Delete(path) => {
            inner.resources.remove(&path);
        }
    }
}

/// Add the `id` and `name` fields ARM returns on every resource
fn stamp(path: &str, mut body: Value) -> Value {
    if let Value::Object(obj) = &mut body {
        obj.insert("id".to_string(), json!(path));
        let name = path.rsplit('/').next().unwrap_or_default();
        obj.insert("name".to_string(), json!(name));
    }
    body
}

/// JSON merge patch: objects merge recursively, `null` removes
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn not_found(path: &str) -> ArmResponse {
    ArmResponse::new(404).with_body(json!({
        "error": {
            "code": "ResourceNotFound",
            "message": format!("The resource {} was not found.", path)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn patch_merges_nested_objects() {
        let fake = FakeArm::new().with_resource(
            "/x",
            json!({"properties": {"a": 1, "b": 2}, "tags": {"k": "v"}}),
        );
        let response = fake
            .send(
                ArmRequest::new(Method::PATCH, "/x")
                    .with_body(json!({"properties": {"b": 3, "c": 4}, "tags": null})),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let stored = fake.resource("/x").unwrap();
        assert_eq!(stored["properties"], json!({"a": 1, "b": 3, "c": 4}));
        assert!(stored.get("tags").is_none());
        assert_eq!(stored["id"], "/x");
    }

    #[tokio::test]
    async fn async_writes_apply_when_the_operation_completes() {
        let fake = FakeArm::new().with_async_operations(1);
        let response = fake
            .send(ArmRequest::new(Method::PUT, "/a/b").with_body(json!({"location": "uksouth"})))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
        assert!(fake.resource("/a/b").is_none());

        let url = response.header("azure-asyncoperation").unwrap().to_string();
        let first = fake.send(ArmRequest::new(Method::GET, url.clone())).await.unwrap();
        assert_eq!(first.body.unwrap()["status"], "InProgress");
        let second = fake.send(ArmRequest::new(Method::GET, url)).await.unwrap();
        assert_eq!(second.body.unwrap()["status"], "Succeeded");
        assert_eq!(fake.resource("/a/b").unwrap()["name"], "b");
    }
}
