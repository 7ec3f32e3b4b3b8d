//! Integration tests for the HTTP transport and ARM client using wiremock

use std::sync::Arc;
use std::time::Duration;

use armada_core::lro::PollerConfig;
use armada_core::provider::{ErrorKind, Provider, ProviderError};
use armada_core::resource::Resource;
use armada_provider_azurerm::arm::{ArmClient, ArmError};
use armada_provider_azurerm::config::{ProviderConfig, RetryConfig};
use armada_provider_azurerm::transport::{ArmRequest, HttpTransport, StaticToken, Transport};
use reqwest::Method;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/acctestRG-1";

fn fast_retries(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay: Duration::from_millis(1),
    }
}

fn transport(server: &MockServer, retry: RetryConfig) -> HttpTransport {
    HttpTransport::new(server.uri(), StaticToken::new("test-token"), retry).unwrap()
}

fn arm(server: &MockServer) -> ArmClient {
    ArmClient::new(
        Arc::new(transport(server, fast_retries(0))),
        PollerConfig::default().with_interval(Duration::from_millis(1)),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn requests_carry_bearer_token_and_api_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .and(query_param("api-version", "2020-06-01"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"location": "westeurope"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server, fast_retries(0))
        .send(ArmRequest::new(Method::GET, GROUP).with_api_version("2020-06-01"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.unwrap()["location"], "westeurope");
}

#[tokio::test]
async fn throttled_requests_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "acctestRG-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server, fast_retries(2))
        .send(ArmRequest::new(Method::GET, GROUP))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn retries_stop_after_the_limit() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let response = transport(&server, fast_retries(2))
        .send(ArmRequest::new(Method::PUT, GROUP).with_body(json!({"location": "westeurope"})))
        .await
        .unwrap();
    assert_eq!(response.status, 503);
    assert!(response.body.is_none());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "InvalidApiVersionParameter", "message": "bad api-version"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = arm(&server).get::<Value>(GROUP, "1999-01-01").await.unwrap_err();
    let ArmError::Api { status, code, message } = &err else {
        panic!("unexpected error {:?}", err);
    };
    assert_eq!(*status, 400);
    assert_eq!(code, "InvalidApiVersionParameter");
    assert_eq!(message, "bad api-version");
    assert_eq!(err.kind(), ErrorKind::Api);
}

#[tokio::test]
async fn error_envelopes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "ResourceGroupNotFound", "message": "Resource group 'acctestRG-1' could not be found."}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": "ResourceGroupBeingDeleted", "message": "deprovisioning"}
        })))
        .mount(&server)
        .await;

    let client = arm(&server);
    let err = client.get::<Value>(GROUP, "2020-06-01").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("could not be found"));

    let err = client
        .put::<_, Value>(GROUP, "2020-06-01", &json!({"location": "westeurope"}))
        .await
        .unwrap_err();
    assert!(matches!(&err, ArmError::Conflict { code, .. } if code == "ResourceGroupBeingDeleted"));
    let err = ProviderError::from(err);
    assert_eq!(err.kind(), ErrorKind::Api);
}

#[tokio::test]
async fn delete_follows_the_async_operation() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/op1", server.uri());
    Mock::given(method("DELETE"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(202).insert_header("Azure-AsyncOperation", operation.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
        .expect(1)
        .mount(&server)
        .await;

    arm(&server).delete(GROUP, "2020-06-01").await.unwrap();
}

#[tokio::test]
async fn provider_creates_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GROUP))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(GROUP))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": GROUP,
            "name": "acctestRG-1",
            "location": "westeurope",
            "properties": {"provisioningState": "Succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("00000000-0000-0000-0000-000000000000", "test-token")
        .with_endpoint(server.uri())
        .with_retry(fast_retries(0));
    let provider = armada_provider_azurerm::from_config(&config, CancellationToken::new()).unwrap();

    let group = Resource::new("azurerm_resource_group", "test")
        .with_attribute("name", "acctestRG-1")
        .with_attribute("location", "West Europe");
    let state = provider.create(&group).await.unwrap();
    assert_eq!(state.id.as_deref(), Some(GROUP));
    assert_eq!(state.get("location").and_then(|v| v.as_str()), Some("westeurope"));
}
