//! Route-level tests driven through `tower::ServiceExt::oneshot`.
//!
//! Discovery is disabled so no test depends on a local Ollama; endpoints that
//! need a server point at a wiremock instance.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use graphkb_api::{router, AppState};
use graphkb_inference::{DiscoveryConfig, LlmConfigResolver, ResolverConfig};
use graphkb_jobs::{JobManager, PipelineConfig};

// ============================================================================
// HELPERS
// ============================================================================

struct TestApp {
    router: Router,
    input: TempDir,
    _output: TempDir,
}

fn test_app() -> TestApp {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::create_dir_all(input.path().join("batch1")).unwrap();
    std::fs::write(
        input.path().join("batch1/notes.txt"),
        "Grace Hopper worked on the Harvard Mark I.",
    )
    .unwrap();

    let resolver = Arc::new(LlmConfigResolver::new(
        ResolverConfig::default().with_discovery(
            DiscoveryConfig::empty().with_probe_timeout(Duration::from_millis(300)),
        ),
    ));
    let pipeline = PipelineConfig::default()
        .with_input_root(input.path())
        .with_output_dir(output.path());
    let jobs = Arc::new(JobManager::new(pipeline, resolver.clone()));

    TestApp {
        router: router(AppState::new(resolver, jobs)),
        input,
        _output: output,
    }
}

async fn ollama_mock() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.5.7"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:8b"}, {"name": "nomic-embed-text"}]
        })))
        .mount(&server)
        .await;
    server
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_json(router: &Router, uri: &str, payload: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    send(router, request).await
}

async fn post_raw(router: &Router, uri: &str, body: &'static str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    send(router, request).await
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

// ============================================================================
// HEALTH AND REQUEST IDS
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

// ============================================================================
// LLM CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_llm_status_initially_uninitialized() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/api/llm/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "ollama");
    assert_eq!(body["base_url"], Value::Null);
    assert_eq!(body["client_initialized"], false);
}

#[tokio::test]
async fn test_configure_custom_without_base_url_is_bad_request() {
    let app = test_app();
    let (status, body) = post_json(&app.router, "/api/llm/config", json!({"mode": "custom"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].as_str().unwrap().contains("base_url"));

    let (_, current) = get_json(&app.router, "/api/llm/status").await;
    assert_eq!(current["mode"], "ollama");
}

#[tokio::test]
async fn test_configure_unknown_mode_is_bad_request() {
    let app = test_app();
    let (status, _) = post_json(&app.router, "/api/llm/config", json!({"mode": "openai"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_configure_malformed_body_is_json_bad_request() {
    let app = test_app();
    let (status, body) = post_raw(&app.router, "/api/llm/config", "{\"mode\": ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].is_string());

    let (status, body) = post_raw(&app.router, "/api/llm/config", r#"{"base_url": 42}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].is_string());
}

#[tokio::test]
async fn test_configure_override_returns_empty_ok() {
    let app = test_app();
    let server = ollama_mock().await;

    let (status, body) = post_json(
        &app.router,
        "/api/llm/config",
        json!({"base_url": server.uri(), "model_name": "llama3:8b"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (_, current) = get_json(&app.router, "/api/llm/status").await;
    assert_eq!(current["base_url"], server.uri());
    assert_eq!(current["model_name"], "llama3:8b");
    assert_eq!(current["client_initialized"], true);
    assert_eq!(current["discovered_via"], "override");
}

#[tokio::test]
async fn test_list_models() {
    let app = test_app();
    let server = ollama_mock().await;
    post_json(&app.router, "/api/llm/config", json!({"base_url": server.uri()})).await;

    let (status, body) = get_json(&app.router, "/api/llm/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"], json!(["llama3:8b", "nomic-embed-text"]));
}

#[tokio::test]
async fn test_list_models_without_endpoint_is_bad_gateway() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/api/llm/models").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_models_in_custom_mode_is_bad_request() {
    let app = test_app();
    let server = MockServer::start().await;
    let (status, _) = post_json(
        &app.router,
        "/api/llm/config",
        json!({"mode": "custom", "base_url": server.uri()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&app.router, "/api/llm/models").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// PIPELINE
// ============================================================================

#[tokio::test]
async fn test_run_returns_pending_job() {
    let app = test_app();
    let (status, body) = post_json(
        &app.router,
        "/api/pipeline/run",
        json!({"input_path": "batch1", "indexing_method": "fast"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job = as_json(&body);
    assert_eq!(job["status"], "pending");
    assert_eq!(job["progress"], 0.0);
    assert_eq!(job["finished_at"], Value::Null);

    let job_id = job["job_id"].as_str().unwrap();
    let (status, polled) = get_json(&app.router, &format!("/api/pipeline/status/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled["job_id"], job_id);
    assert!(polled["progress"].as_f64().unwrap() >= 0.0);

    let (_, jobs) = get_json(&app.router, "/api/pipeline/jobs").await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_accepts_absolute_path_under_root() {
    let app = test_app();
    let absolute = app.input.path().join("batch1");
    let (status, _) = post_json(
        &app.router,
        "/api/pipeline/run",
        json!({"input_path": absolute.to_string_lossy()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_run_with_empty_path_is_bad_request() {
    let app = test_app();
    let (status, body) = post_json(&app.router, "/api/pipeline/run", json!({"input_path": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].is_string());

    let (_, jobs) = get_json(&app.router, "/api/pipeline/jobs").await;
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_malformed_body_is_json_bad_request() {
    let app = test_app();
    let (status, body) = post_raw(&app.router, "/api/pipeline/run", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/pipeline/run")
        .body(Body::from(r#"{"input_path": "batch1"}"#))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(as_json(&body)["error"].is_string());

    let (_, jobs) = get_json(&app.router, "/api/pipeline/jobs").await;
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_outside_root_is_bad_request() {
    let app = test_app();
    let (status, _) = post_json(&app.router, "/api/pipeline/run", json!({"input_path": "../"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = test_app();
    let (status, body) = get_json(&app.router, "/api/pipeline/status/unknown-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
