//! Control-plane routes driven in-process with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use huddle_server::{app, AppState, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::default()));
    let router = app(Arc::clone(&state)).unwrap();
    (router, state)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn create_room_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ws/create-room")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_create_room_and_list() {
    let (router, _state) = test_app();

    let (status, body) = send(&router, create_room_request(r#"{"id":"r1","name":"lobby"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "r1", "name": "lobby"}));

    let (status, body) = send(&router, get("/ws/rooms")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "r1", "name": "lobby"}]));
}

#[tokio::test]
async fn test_create_room_is_idempotent() {
    let (router, _state) = test_app();

    send(&router, create_room_request(r#"{"id":"r1","name":"lobby"}"#)).await;
    let (status, body) = send(&router, create_room_request(r#"{"id":"r1","name":"renamed"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "r1", "name": "lobby"}));

    let (_, rooms) = send(&router, get("/ws/rooms")).await;
    assert_eq!(rooms.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_room_rejects_bad_input() {
    let (router, _state) = test_app();

    let (status, body) = send(&router, create_room_request(r#"{"id":"","name":"x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    for id in ["a/b", "a?b", "a#b", "a b"] {
        let request = create_room_request(&format!(r#"{{"id":"{id}","name":"x"}}"#));
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert!(body["error"].is_string());
    }

    let (status, body) = send(&router, create_room_request("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_clients_of_unknown_room_is_empty() {
    let (router, _state) = test_app();

    let (status, body) = send(&router, get("/ws/clients/nowhere")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_health_reports_counts() {
    let (router, state) = test_app();
    state.hub.create_room("r1", "lobby");
    state.hub.create_room("r2", "den");

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rooms"], 2);
    assert_eq!(body["clients"], 0);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let (router, _state) = test_app();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/ws/create-room")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
}
