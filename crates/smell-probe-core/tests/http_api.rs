use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{json, Value};
use smell_probe_core::api::{router, AppState};
use smell_probe_core::{LlmClient, SmellAnalyzer, SmellSchema};

struct StubClient {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl StubClient {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmClient for StubClient {
    async fn query(&self, _prompt: &str, _model_id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

fn server_with(client: Arc<StubClient>) -> TestServer {
    let app = router(AppState::new(SmellAnalyzer::new(client)));
    TestServer::new(app).expect("Failed to create test server")
}

#[tokio::test]
async fn analyze_returns_complete_report() {
    let client = StubClient::replying(r#"{"large_class_smell": true}"#);
    let server = server_with(client.clone());

    let response = server
        .post("/analyze")
        .json(&json!({ "code": "class Foo {}" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["containsJson"], json!(true));
    assert_eq!(body["rawResponse"], json!(r#"{"large_class_smell": true}"#));

    let result = body["result"].as_object().expect("result should be an object");
    assert_eq!(result.len(), SmellSchema::default_schema().len());
    for (key, value) in result {
        let expected = key == "large_class_smell";
        assert_eq!(value, &json!(expected), "{key}");
    }
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_code_is_a_client_error() {
    let client = StubClient::replying("{}");
    let server = server_with(client.clone());

    let response = server.post("/analyze").json(&json!({})).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body.get("error").is_some());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_code_is_a_client_error() {
    let client = StubClient::replying("{}");
    let server = server_with(client.clone());

    let response = server.post("/analyze").json(&json!({ "code": "" })).await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_json_body_still_gets_json_envelope() {
    let client = StubClient::replying("{}");
    let server = server_with(client.clone());

    let response = server.post("/analyze").text("class Foo {}").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["error"].is_string());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_string_code_is_a_client_error() {
    let client = StubClient::replying("{}");
    let server = server_with(client.clone());

    let response = server.post("/analyze").json(&json!({ "code": 123 })).await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    let message = body["error"].as_str().expect("error should be a string");
    assert!(message.contains("string \"code\" field"));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn provider_failure_is_a_server_error() {
    let server = server_with(StubClient::failing("connection refused"));

    let response = server
        .post("/analyze")
        .json(&json!({ "code": "class Foo {}" }))
        .await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));
    let message = body["error"].as_str().expect("error should be a string");
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn prose_reply_yields_all_false_report() {
    let server = server_with(StubClient::replying("This code is clean."));

    let response = server
        .post("/analyze")
        .json(&json!({ "code": "class Foo {}" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["containsJson"], json!(false));
    let result = body["result"].as_object().unwrap();
    assert!(result.values().all(|value| value == &json!(false)));
}

#[tokio::test]
async fn status_reports_online() {
    let server = server_with(StubClient::replying("{}"));

    let response = server.get("/status").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({ "status": "online" }));
}
