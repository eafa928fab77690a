// tests/auth_http_test.rs
// End-to-end tests of the HTTP auth glue, driving the router directly
// with tower's oneshot instead of a bound socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use chatroom_server::api::create_router;

async fn post_json(router: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&bytes).to_string()}));
    (status, json)
}

#[tokio::test]
async fn register_then_duplicate_conflicts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };
    let router = create_router(state);

    let (status, body) = post_json(
        &router,
        "/api/v1/auth/register",
        json!({"username": "alice", "password": "hunter2", "display_name": "Alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = post_json(
        &router,
        "/api/v1/auth/register",
        json!({"username": "alice", "password": "different", "display_name": "Alice Two"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthenticated() {
    let temp_dir = tempfile::tempdir().unwrap();
    let Some(state) = common::try_build_state(&temp_dir).await else {
        return;
    };
    let router = create_router(state);

    post_json(
        &router,
        "/api/v1/auth/register",
        json!({"username": "bob", "password": "correct-horse", "display_name": "Bob"}),
    )
    .await;

    let (status, _) = post_json(
        &router,
        "/api/v1/auth/login",
        json!({"username": "bob", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post_json(
        &router,
        "/api/v1/auth/login",
        json!({"username": "bob", "password": "correct-horse"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
}
