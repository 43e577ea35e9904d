//! Request lifecycle logging through a real axum router

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Extension},
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use beacon_http::{request_logging, CompletionPolicy, RequestLogging, REQUEST_ID_HEADER};
use beacon_log::{Logger, LoggerConfig, RequestContext, SharedBuffer};
use futures::FutureExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tower::ServiceExt;

fn test_logger(buffer: &SharedBuffer) -> Logger {
    let mut config = LoggerConfig::for_service("payments", "ledger");
    config.version = "1.0.0".to_string();
    config.environment = "production".to_string();
    Logger::new(config.with_output(buffer.sink()))
}

async fn echo_request_id(Extension(ctx): Extension<RequestContext>) -> String {
    ctx.request_id().unwrap_or_default().to_string()
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(50)).await;
    "done"
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

fn app(buffer: &SharedBuffer, policy: CompletionPolicy) -> Router {
    let logging = RequestLogging::new(test_logger(buffer)).with_policy(policy);

    Router::new()
        .route("/id", get(echo_request_id))
        .route("/created", get(|| async { (StatusCode::CREATED, "created") }))
        .route("/fail", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "fail") }))
        .route("/plain", get(|| async { "ok" }))
        .route("/slow", get(slow))
        .route("/explode", get(explode))
        .layer(middleware::from_fn_with_state(logging, request_logging))
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn by_message<'a>(records: &'a [Value], message: &str) -> Vec<&'a Value> {
    records.iter().filter(|r| r["message"] == message).collect()
}

#[tokio::test]
async fn test_inbound_request_id_is_shared_by_both_entries() {
    let buffer = SharedBuffer::new();
    let request = Request::builder()
        .uri("/id")
        .header(REQUEST_ID_HEADER, "abc123")
        .body(Body::empty())
        .unwrap();

    let response = app(&buffer, CompletionPolicy::default())
        .oneshot(request)
        .await
        .unwrap();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"abc123");

    let records = buffer.json_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["message"], "Request started");
    assert_eq!(records[1]["message"], "Request completed");
    for record in &records {
        assert_eq!(record["request_id"], "abc123");
        assert_eq!(record["service"], "ledger");
        assert_eq!(record["method"], "GET");
        assert_eq!(record["path"], "/id");
    }
}

#[tokio::test]
async fn test_missing_or_empty_header_generates_distinct_ids() {
    let buffer = SharedBuffer::new();
    let app = app(&buffer, CompletionPolicy::default());

    app.clone().oneshot(get_request("/plain")).await.unwrap();
    let empty_header = Request::builder()
        .uri("/plain")
        .header(REQUEST_ID_HEADER, "")
        .body(Body::empty())
        .unwrap();
    app.oneshot(empty_header).await.unwrap();

    let records = buffer.json_records();
    let started = by_message(&records, "Request started");
    let completed = by_message(&records, "Request completed");
    assert_eq!(started.len(), 2);

    let first = started[0]["request_id"].as_str().unwrap();
    let second = started[1]["request_id"].as_str().unwrap();
    assert!(!first.is_empty());
    assert!(!second.is_empty());
    assert_ne!(first, second);
    assert_eq!(completed[0]["request_id"], first);
    assert_eq!(completed[1]["request_id"], second);
}

#[tokio::test]
async fn test_completed_entry_reports_status() {
    let buffer = SharedBuffer::new();
    let app = app(&buffer, CompletionPolicy::default());

    for path in ["/created", "/fail", "/plain"] {
        app.clone().oneshot(get_request(path)).await.unwrap();
    }

    let records = buffer.json_records();
    let statuses: Vec<_> = by_message(&records, "Request completed")
        .iter()
        .map(|r| r["status"].as_u64().unwrap())
        .collect();
    assert_eq!(statuses, vec![201, 500, 200]);
}

#[tokio::test]
async fn test_duration_reflects_handler_time() {
    let buffer = SharedBuffer::new();

    app(&buffer, CompletionPolicy::default())
        .oneshot(get_request("/slow"))
        .await
        .unwrap();

    let records = buffer.json_records();
    let completed = by_message(&records, "Request completed");
    assert!(completed[0]["duration_ms"].as_u64().unwrap() >= 50);
}

#[tokio::test]
async fn test_started_entry_carries_remote_address() {
    let buffer = SharedBuffer::new();
    let addr: SocketAddr = "10.1.2.3:45678".parse().unwrap();
    let mut request = get_request("/plain");
    request.extensions_mut().insert(ConnectInfo(addr));

    app(&buffer, CompletionPolicy::default())
        .oneshot(request)
        .await
        .unwrap();

    let records = buffer.json_records();
    assert_eq!(records[0]["remote_address"], "10.1.2.3:45678");
    assert!(records[1].get("remote_address").is_none());
}

#[tokio::test]
async fn test_existing_context_identifiers_survive() {
    let buffer = SharedBuffer::new();
    let mut request = get_request("/id");
    request.extensions_mut().insert(
        RequestContext::new()
            .with_user_id("u-42")
            .with_trace_id("trace-7"),
    );

    app(&buffer, CompletionPolicy::default())
        .oneshot(request)
        .await
        .unwrap();

    for record in buffer.json_records() {
        assert_eq!(record["user_id"], "u-42");
        assert_eq!(record["trace_id"], "trace-7");
        assert!(record["request_id"].is_string());
    }
}

#[tokio::test]
async fn test_panicking_handler_skips_completion_by_default() {
    let buffer = SharedBuffer::new();
    let call = app(&buffer, CompletionPolicy::SkipOnPanic).oneshot(get_request("/explode"));

    let result = AssertUnwindSafe(call).catch_unwind().await;

    assert!(result.is_err());
    let records = buffer.json_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"], "Request started");
}

#[tokio::test]
async fn test_panicking_handler_logged_with_always_policy() {
    let buffer = SharedBuffer::new();
    let call = app(&buffer, CompletionPolicy::Always).oneshot(get_request("/explode"));

    let result = AssertUnwindSafe(call).catch_unwind().await;

    assert!(result.is_err());
    let records = buffer.json_records();
    let completed = by_message(&records, "Request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["status"], 500);
    assert_eq!(completed[0]["outcome"], "panicked");
    assert_eq!(completed[0]["path"], "/explode");
}

#[tokio::test]
async fn test_cancelled_request_logged_with_always_policy() {
    let buffer = SharedBuffer::new();
    let app = app(&buffer, CompletionPolicy::Always);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(5), app.oneshot(get_request("/slow"))).await;
    assert!(timed_out.is_err());

    let records = buffer.json_records();
    let completed = by_message(&records, "Request completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["outcome"], "cancelled");
}
