//! Integration tests for the endpoint registry API.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{test_network, TestMember, NETWORK};
use endpoint_registry::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    Ed25519Verifier, RegistryService, Store,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Create a test app with memory-only storage and a 10-member roster.
fn create_test_app(rate_limit: RateLimitState) -> (Router, Vec<TestMember>) {
    let (members, oracle) = test_network(10);
    let store = Arc::new(Store::memory(Duration::from_secs(5)));
    let registry = RegistryService::new(NETWORK, oracle, Arc::new(Ed25519Verifier::new()), store);
    let app = create_router_with_rate_limit(AppState::new(registry), rate_limit);
    (app, members)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn endpoint_body(member: &TestMember, url: &str) -> Value {
    serde_json::to_value(member.request(url)).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app(RateLimitState::permissive());

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["network"], 205);
    assert_eq!(json["member_count"], 10);
    assert_eq!(json["endpoint_count"], 0);
}

#[tokio::test]
async fn test_register_then_query() {
    let (app, members) = create_test_app(RateLimitState::permissive());

    let (status, json) = send(
        &app,
        "POST",
        "/register-endpoint",
        Some(endpoint_body(&members[3], "http://a")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");

    let (status, json) = send(
        &app,
        "POST",
        "/healthy-endpoints",
        Some(json!({"indices": [3]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["http://a"]));
}

#[tokio::test]
async fn test_register_mark_down_query() {
    let (app, members) = create_test_app(RateLimitState::permissive());
    let body = endpoint_body(&members[3], "http://a");

    let (status, _) = send(&app, "POST", "/register-endpoint", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "POST", "/down-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["changed"], true);

    let (_, json) = send(
        &app,
        "POST",
        "/healthy-endpoints",
        Some(json!({"indices": [3]})),
    )
    .await;
    assert_eq!(json, json!([]));

    // The record is kept, only marked down
    let (status, json) = send(&app, "GET", "/endpoints/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["alive"], false);
    assert_eq!(json["url"], "http://a");
}

#[tokio::test]
async fn test_unknown_indices_skipped_in_order() {
    let (app, members) = create_test_app(RateLimitState::permissive());

    for (member, url) in [(&members[7], "http://seven"), (&members[3], "http://three")] {
        let (status, _) = send(
            &app,
            "POST",
            "/register-endpoint",
            Some(endpoint_body(member, url)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send(
        &app,
        "POST",
        "/healthy-endpoints",
        Some(json!({"indices": [3, 7, 99]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["http://three", "http://seven"]));
}

#[tokio::test]
async fn test_mark_down_unknown_identity() {
    let (app, members) = create_test_app(RateLimitState::permissive());

    let (status, json) = send(
        &app,
        "POST",
        "/down-endpoint",
        Some(endpoint_body(&members[5], "http://never")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["changed"], false);

    let (_, json) = send(&app, "GET", "/endpoints", None).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_rejections_carry_reason() {
    let (app, members) = create_test_app(RateLimitState::permissive());

    // Out of range
    let mut body = endpoint_body(&members[3], "http://a");
    body["index"] = json!(42);
    let (status, json) = send(&app, "POST", "/register-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "OUT_OF_RANGE");
    assert_eq!(json["retryable"], false);

    // Negative index
    let mut body = endpoint_body(&members[3], "http://a");
    body["index"] = json!(-1);
    let (status, json) = send(&app, "POST", "/register-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "OUT_OF_RANGE");

    // Identity belongs to another index
    let mut body = endpoint_body(&members[3], "http://a");
    body["index"] = json!(4);
    let (status, json) = send(&app, "POST", "/register-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "IDENTITY_MISMATCH");

    // Signature for a different url
    let mut body = endpoint_body(&members[3], "http://a");
    body["url"] = json!("http://evil");
    let (status, json) = send(&app, "POST", "/register-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_SIGNATURE");

    // Garbage signature fails closed
    let mut body = endpoint_body(&members[3], "http://a");
    body["signature"] = json!("not-a-signature");
    let (status, json) = send(&app, "POST", "/down-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_SIGNATURE");

    let (_, json) = send(&app, "GET", "/endpoints", None).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_malformed_body_uses_error_shape() {
    let (app, _) = create_test_app(RateLimitState::permissive());

    let request = Request::builder()
        .method("POST")
        .uri("/register-endpoint")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let (app, members) = create_test_app(RateLimitState::permissive());
    let member = &members[2];

    // Only the current field names are accepted
    let body = json!({
        "uid": 2,
        "hotkey": member.identity,
        "api_url": "http://old",
        "signature": member.sign(2, "http://old"),
    });
    let (status, json) = send(&app, "POST", "/register-endpoint", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_REQUEST");

    let (status, json) = send(&app, "POST", "/healthy-endpoints", Some(json!({"uids": [2]}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_REQUEST");

    let (_, json) = send(&app, "GET", "/endpoints", None).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (app, _) = create_test_app(RateLimitState::permissive());

    let (status, json) = send(&app, "GET", "/endpoints/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_rate_limiting() {
    let (app, _) = create_test_app(RateLimitState::new(1));

    let (status, _) = send(&app, "GET", "/endpoints", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/endpoints", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["retryable"], true);

    // Health checks are not rate limited
    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
