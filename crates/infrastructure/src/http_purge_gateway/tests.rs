use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sentinel_purger_application::{AccessTokenProvider, PurgeGateway};
use sentinel_purger_core::{AppError, AppResult};
use sentinel_purger_domain::{PurgeOperation, TableName};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{HttpPurgeGateway, LogAnalyticsWorkspace};

const PURGE_PATH: &str = "/subscriptions/sub-1/resourceGroups/rg-logs/providers/Microsoft.OperationalInsights/workspaces/ws-sentinel/tables/SecurityEvent/deleteData";

#[derive(Default)]
struct CountingTokenProvider {
    issued: AtomicUsize,
}

#[async_trait]
impl AccessTokenProvider for CountingTokenProvider {
    async fn access_token(&self) -> AppResult<String> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok("test-token".to_owned())
    }
}

struct FailingTokenProvider;

#[async_trait]
impl AccessTokenProvider for FailingTokenProvider {
    async fn access_token(&self) -> AppResult<String> {
        Err(AppError::Auth("invalid client secret".to_owned()))
    }
}

fn workspace() -> LogAnalyticsWorkspace {
    LogAnalyticsWorkspace {
        subscription_id: "sub-1".to_owned(),
        resource_group: "rg-logs".to_owned(),
        workspace_name: "ws-sentinel".to_owned(),
    }
}

fn gateway_for(server: &MockServer, tokens: Arc<dyn AccessTokenProvider>) -> HttpPurgeGateway {
    HttpPurgeGateway::new(reqwest::Client::new(), tokens, &server.uri(), workspace())
        .unwrap_or_else(|_| unreachable!())
}

fn security_event() -> TableName {
    TableName::new("SecurityEvent").unwrap_or_else(|_| unreachable!())
}

fn threshold() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 10, 15, 30)
        .single()
        .unwrap_or_else(|| unreachable!())
}

#[test]
fn purge_url_is_table_scoped() {
    let gateway = HttpPurgeGateway::new(
        reqwest::Client::new(),
        Arc::new(CountingTokenProvider::default()),
        "https://management.azure.com",
        workspace(),
    )
    .unwrap_or_else(|_| unreachable!());

    let url = gateway
        .purge_url(&security_event())
        .map(|url| url.to_string())
        .unwrap_or_default();

    assert_eq!(
        url,
        format!("https://management.azure.com{PURGE_PATH}?api-version=2023-09-01")
    );
}

#[test]
fn invalid_management_endpoint_is_a_config_error() {
    let result = HttpPurgeGateway::new(
        reqwest::Client::new(),
        Arc::new(CountingTokenProvider::default()),
        "not a url",
        workspace(),
    );

    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn submit_returns_async_operation_url() {
    let server = MockServer::start().await;
    let operation_url = format!("{}/operations/op123", server.uri());

    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .and(query_param("api-version", "2023-09-01"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "filters": [{
                "column": "TimeGenerated",
                "operator": "<",
                "value": "2024-04-01T10:15:30Z"
            }]
        })))
        .respond_with(
            ResponseTemplate::new(202).insert_header("Azure-AsyncOperation", operation_url.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(CountingTokenProvider::default());
    let gateway = gateway_for(&server, tokens.clone());

    let operation = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(operation.is_ok());
    assert_eq!(
        operation
            .map(|operation| operation.operation_url().to_owned())
            .unwrap_or_default(),
        operation_url
    );
    assert_eq!(tokens.issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submit_rejects_non_accepted_status_and_keeps_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"error\":\"PurgeAlreadyRunning\"}"),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));

    let result = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(matches!(
        result,
        Err(AppError::PurgeSubmit { status: 200, ref body })
            if body == "{\"error\":\"PurgeAlreadyRunning\"}"
    ));
}

#[tokio::test]
async fn submit_reports_server_errors_as_purge_submit_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AuthorizationFailed"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));

    let result = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(matches!(
        result,
        Err(AppError::PurgeSubmit { status: 403, ref body }) if body == "AuthorizationFailed"
    ));
}

#[tokio::test]
async fn submit_without_operation_header_is_missing_handle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PURGE_PATH))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"operationId": "op123"})))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));

    let result = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(matches!(result, Err(AppError::MissingOperationHandle(_))));
}

#[tokio::test]
async fn submit_propagates_token_failures_without_calling_the_api() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(FailingTokenProvider));

    let result = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn submit_reports_unreachable_endpoint_as_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap_or_else(|_| unreachable!());
    let endpoint = listener
        .local_addr()
        .map(|address| format!("http://{address}"))
        .unwrap_or_default();
    drop(listener);

    let gateway = HttpPurgeGateway::new(
        reqwest::Client::new(),
        Arc::new(CountingTokenProvider::default()),
        &endpoint,
        workspace(),
    )
    .unwrap_or_else(|_| unreachable!());

    let result = gateway.submit_purge(&security_event(), threshold()).await;

    assert!(matches!(result, Err(AppError::Transport(_))));
}

#[tokio::test]
async fn status_is_lowercased() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/operations/op123"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Updating"})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));
    let operation = PurgeOperation::new(format!("{}/operations/op123", server.uri()))
        .unwrap_or_else(|_| unreachable!());

    let status = gateway.fetch_status(&operation).await;

    assert_eq!(
        status.map(|status| status.as_str().to_owned()).unwrap_or_default(),
        "updating"
    );
}

#[tokio::test]
async fn status_falls_back_to_properties_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/operations/op123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "op123", "properties": {"status": "Pending"}})),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));
    let operation = PurgeOperation::new(format!("{}/operations/op123", server.uri()))
        .unwrap_or_else(|_| unreachable!());

    let status = gateway.fetch_status(&operation).await;

    assert_eq!(
        status.map(|status| status.as_str().to_owned()).unwrap_or_default(),
        "pending"
    );
}

#[tokio::test]
async fn status_rejects_non_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));
    let operation = PurgeOperation::new(format!("{}/operations/op123", server.uri()))
        .unwrap_or_else(|_| unreachable!());

    let result = gateway.fetch_status(&operation).await;

    assert!(matches!(result, Err(AppError::StatusParse(_))));
}

#[tokio::test]
async fn status_rejects_empty_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": ""})))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));
    let operation = PurgeOperation::new(format!("{}/operations/op123", server.uri()))
        .unwrap_or_else(|_| unreachable!());

    let result = gateway.fetch_status(&operation).await;

    assert!(matches!(result, Err(AppError::StatusParse(_))));
}

#[tokio::test]
async fn status_rejects_non_ok_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("OperationNotFound"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Arc::new(CountingTokenProvider::default()));
    let operation = PurgeOperation::new(format!("{}/operations/op123", server.uri()))
        .unwrap_or_else(|_| unreachable!());

    let result = gateway.fetch_status(&operation).await;

    assert!(matches!(
        result,
        Err(AppError::StatusFetch { status: 404, ref body }) if body == "OperationNotFound"
    ));
}
