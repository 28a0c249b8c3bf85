//! End-to-end tests against the sync router
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`: auth
//! rejection, envelope shapes, batch partial failure over HTTP, and
//! cross-owner isolation through the full stack.
//!
//! Run with: cargo test --test http_api

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use studysync::api::{router, AppState};
use studysync::auth::{TokenManager, User, UserManager};
use studysync::storage::StoragePool;
use studysync::types::StorageConfig;

struct TestServer {
    app: Router,
    alice_token: String,
    bob_token: String,
}

fn setup() -> TestServer {
    let pool = StoragePool::new(StorageConfig::in_memory(), 1).unwrap();

    let (alice_token, bob_token) = pool
        .with_connection(|conn| {
            let users = UserManager::new(conn);
            let tokens = TokenManager::new(conn);

            let alice = User::new("alice");
            users.create_user(&alice, None)?;
            let (_, alice_token) = tokens.create_token(&alice.id, "desktop", None)?;

            let bob = User::new("bob");
            users.create_user(&bob, None)?;
            let (_, bob_token) = tokens.create_token(&bob.id, "desktop", None)?;

            Ok((alice_token, bob_token))
        })
        .unwrap();

    TestServer {
        app: router(AppState::new(Arc::new(pool))),
        alice_token,
        bob_token,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn missing_token_is_rejected_before_any_processing() {
    let server = setup();
    let request = Request::builder()
        .method("GET")
        .uri("/sync/schedule")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let server = setup();
    let (status, _) = send(&server.app, get("/sync/schedule", "ssk_bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_needs_no_auth() {
    let server = setup();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn schedule_read_returns_the_envelope() {
    let server = setup();
    let (status, body) = send(&server.app, get("/sync/schedule", &server.alice_token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert!(data["items"].is_array());
    assert_eq!(data["pagination"]["total"], 0);
    assert_eq!(data["pagination"]["limit"], 50);
    assert_eq!(data["pagination"]["hasMore"], false);
    assert!(data["sync"]["timestamp"].is_string());
    assert_eq!(data["sync"]["totalItems"], 0);
}

#[tokio::test]
async fn schedule_batch_create_reports_partial_failure_with_200() {
    let server = setup();
    let body = json!({
        "items": [
            {"title": "Task 1"},
            {"title": "Task 2"},
            {"title": ""},
            {"title": "Task 4"},
            {"title": "Task 5"}
        ]
    });
    let (status, response) = send(
        &server.app,
        send_json("POST", "/sync/schedule", &server.alice_token, &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["count"], 4);
    assert_eq!(response["data"]["created"].as_array().unwrap().len(), 4);
    let errors = response["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["item"]["title"], "");
}

#[tokio::test]
async fn owners_never_see_each_other() {
    let server = setup();

    let body = json!({"items": [{"title": "Alice's task"}]});
    send(
        &server.app,
        send_json("POST", "/sync/schedule", &server.alice_token, &body),
    )
    .await;

    let (_, alice_view) = send(&server.app, get("/sync/schedule", &server.alice_token)).await;
    assert_eq!(alice_view["data"]["pagination"]["total"], 1);

    let (_, bob_view) = send(&server.app, get("/sync/schedule", &server.bob_token)).await;
    assert_eq!(bob_view["data"]["pagination"]["total"], 0);

    // Bob cannot delete Alice's item either
    let id = alice_view["data"]["items"][0]["id"].as_i64().unwrap();
    let (status, deleted) = send(
        &server.app,
        delete(&format!("/sync/schedule?id={}", id), &server.bob_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["deleted"], 0);
}

#[tokio::test]
async fn incremental_read_honors_last_synced_at() {
    let server = setup();

    let body = json!({"items": [{"title": "Before baseline"}]});
    send(
        &server.app,
        send_json("POST", "/sync/schedule", &server.alice_token, &body),
    )
    .await;

    let (_, baseline) = send(&server.app, get("/sync/schedule", &server.alice_token)).await;
    let cursor = baseline["data"]["sync"]["timestamp"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let body = json!({"items": [{"title": "After baseline"}]});
    send(
        &server.app,
        send_json("POST", "/sync/schedule", &server.alice_token, &body),
    )
    .await;

    let uri = format!("/sync/schedule?lastSyncedAt={}", urlencode(&cursor));
    let (_, incremental) = send(&server.app, get(&uri, &server.alice_token)).await;
    let items = incremental["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "After baseline");
}

#[tokio::test]
async fn malformed_since_is_a_validation_error() {
    let server = setup();
    let (status, body) = send(
        &server.app,
        get("/sync/schedule?lastSyncedAt=yesterday", &server.alice_token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn chat_session_create_then_cascade_delete() {
    let server = setup();

    let body = json!({
        "type": "session",
        "data": {"sessionId": "s1", "title": "Calculus", "subject": "math"}
    });
    let (status, created) = send(
        &server.app,
        send_json("POST", "/sync/chat", &server.alice_token, &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["data"]["session"]["sessionId"], "s1");

    let body = json!({
        "type": "messages",
        "data": {
            "sessionId": "s1",
            "messages": [
                {"messageId": "m1", "type": "user", "content": "hi"},
                {"messageId": "m2", "type": "assistant", "content": "hello"}
            ]
        }
    });
    let (_, messages) = send(
        &server.app,
        send_json("POST", "/sync/chat", &server.alice_token, &body),
    )
    .await;
    assert_eq!(messages["data"]["count"], 2);

    let (_, cascade) = send(
        &server.app,
        delete("/sync/chat?sessionId=s1", &server.alice_token),
    )
    .await;
    assert_eq!(cascade["data"]["deletedSession"], true);
    assert_eq!(cascade["data"]["deletedMessages"], 2);

    // Second delete of the same session succeeds with zero counts
    let (status, again) = send(
        &server.app,
        delete("/sync/chat?sessionId=s1", &server.alice_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["data"]["deletedSession"], false);
    assert_eq!(again["data"]["deletedMessages"], 0);
}

#[tokio::test]
async fn chat_single_update_404s_on_missing_target() {
    let server = setup();
    let body = json!({
        "type": "session",
        "data": {"sessionId": "missing", "title": "nope"}
    });
    let (status, response) = send(
        &server.app,
        send_json("PUT", "/sync/chat", &server.alice_token, &body),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn voice_settings_are_created_on_first_read() {
    let server = setup();

    let (status, body) = send(
        &server.app,
        get("/sync/voice?type=settings", &server.alice_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sync"]["created"], true);
    assert_eq!(body["data"]["settings"]["language"], "en-US");

    let (_, again) = send(
        &server.app,
        get("/sync/voice?type=settings", &server.alice_token),
    )
    .await;
    assert_eq!(again["data"]["sync"]["created"], false);
}

#[tokio::test]
async fn voice_settings_upsert_patch() {
    let server = setup();
    let body = json!({
        "type": "settings",
        "data": {"volume": 0.5, "activationKeyword": "Hey Tutor"}
    });
    let (status, response) = send(
        &server.app,
        send_json("PUT", "/sync/voice", &server.alice_token, &body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["data"]["settings"]["volume"], 0.5);
    assert_eq!(response["data"]["settings"]["activationKeyword"], "hey tutor");
    // Unnamed field keeps its default
    assert_eq!(response["data"]["settings"]["rate"], 150);
}

#[tokio::test]
async fn voice_command_history_round_trip() {
    let server = setup();

    let body = json!({
        "type": "commands",
        "data": {
            "commands": [
                {"command": "start focus", "transcription": "start focus", "confidence": 0.95},
                {"command": "bad", "transcription": "bad", "confidence": 2.0}
            ]
        }
    });
    let (_, created) = send(
        &server.app,
        send_json("POST", "/sync/voice", &server.alice_token, &body),
    )
    .await;
    assert_eq!(created["data"]["count"], 1);
    assert_eq!(created["data"]["errors"].as_array().unwrap().len(), 1);

    let (_, listed) = send(
        &server.app,
        get("/sync/voice?type=commands", &server.alice_token),
    )
    .await;
    assert_eq!(listed["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn status_reports_per_family_counts() {
    let server = setup();

    let body = json!({"items": [{"title": "One task"}]});
    send(
        &server.app,
        send_json("POST", "/sync/schedule", &server.alice_token, &body),
    )
    .await;

    let (status, response) = send(&server.app, get("/sync/status", &server.alice_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["stats"]["schedules"], 1);
    assert_eq!(response["stats"]["chatSessions"], 0);
    assert!(response["stats"]["lastSync"]["schedules"].is_string());
}

/// Percent-encode the characters RFC3339 timestamps put in query strings
fn urlencode(s: &str) -> String {
    s.replace('+', "%2B").replace(':', "%3A")
}
