//! Integration tests for the HTTP API surface
//!
//! Drives the axum router directly via tower::ServiceExt.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use invigil::config::ProctorConfig;
use invigil::core::{create_router, EventSink, MemorySink, ScriptedSource, SessionRegistry};
use invigil::types::Observation;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn frame_b64() -> String {
    base64::engine::general_purpose::STANDARD.encode(b"not-really-a-jpeg")
}

struct TestApp {
    router: axum::Router,
    sink: Arc<dyn EventSink>,
    source: Arc<ScriptedSource>,
}

fn test_app() -> TestApp {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let source = Arc::new(ScriptedSource::new());
    let registry = SessionRegistry::new(&ProctorConfig::default(), Arc::clone(&sink));
    let router = create_router(ProctorConfig::default(), registry, source.clone());
    TestApp { router, sink, source }
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["sessions_active"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_create_session_returns_ws_url() {
    let app = test_app();
    let response = app
        .router
        .oneshot(post_json(
            "/session/new",
            json!({"student_id": "stu-1", "exam_id": "exam-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let session_id = json["session_id"].as_str().unwrap();
    assert!(!session_id.is_empty());
    assert_eq!(
        json["websocket_url"],
        format!("/ws/proctor/{}", session_id)
    );
    assert_eq!(json["frame_interval_secs"], 2.0);
}

#[tokio::test]
async fn test_session_status_reflects_store() {
    let app = test_app();
    let session = app.sink.create_session("stu-1", "exam-1").await.unwrap();

    let response = app
        .router
        .oneshot(get(&format!("/session/{}", session.session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "active");
    assert_eq!(json["student_id"], "stu-1");
    assert_eq!(json["warnings_count"], 0);
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn test_session_not_found() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get("/session/nonexistent"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_identity_verification_accepts_single_face() {
    let app = test_app();
    let session = app.sink.create_session("stu-1", "exam-1").await.unwrap();
    app.source.push(Observation::single_face(at(0)));

    let response = app
        .router
        .oneshot(post_json(
            &format!("/session/{}/identity", session.session_id),
            json!({"frame": frame_b64()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["verified"], true);

    let state = app
        .sink
        .get_session_state(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(state.identity_verified);
}

#[tokio::test]
async fn test_identity_verification_rejects_multiple_faces() {
    let app = test_app();
    let session = app.sink.create_session("stu-1", "exam-1").await.unwrap();
    app.source.push(Observation::faces(2, at(0)));

    let response = app
        .router
        .oneshot(post_json(
            &format!("/session/{}/identity", session.session_id),
            json!({"frame": frame_b64()}),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["verified"], false);
    assert_eq!(json["message"], "Multiple faces detected");

    let state = app
        .sink
        .get_session_state(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!state.identity_verified);
}

#[tokio::test]
async fn test_identity_verification_rejects_bad_base64() {
    let app = test_app();
    let session = app.sink.create_session("stu-1", "exam-1").await.unwrap();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/session/{}/identity", session.session_id),
            json!({"frame": "%%%not-base64%%%"}),
        ))
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["verified"], false);
    assert_eq!(json["message"], "Failed to decode frame");
}

#[tokio::test]
async fn test_submit_then_resubmit_conflicts() {
    let app = test_app();
    let session = app.sink.create_session("stu-1", "exam-1").await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            &format!("/session/{}/submit", session.session_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "submitted");
    assert!(json["end_time"].is_string());

    let response = app
        .router
        .oneshot(post_json(
            &format!("/session/{}/submit", session.session_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_submit_unknown_session_is_404() {
    let app = test_app();
    let response = app
        .router
        .oneshot(post_json("/session/nonexistent/submit", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_violations_and_report_after_processing() {
    let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
    let session = sink.create_session("stu-1", "exam-1").await.unwrap();
    let registry = SessionRegistry::new(&ProctorConfig::default(), Arc::clone(&sink));

    // Drive a NoFace violation then a critical auto-submit
    for secs in 0..=3 {
        registry
            .process(&session.session_id, &Observation::faces(0, at(secs)))
            .await
            .unwrap();
    }
    registry
        .process(&session.session_id, &Observation::faces(2, at(5)))
        .await
        .unwrap();

    let router = create_router(
        ProctorConfig::default(),
        registry,
        Arc::new(ScriptedSource::new()),
    );

    let response = router
        .clone()
        .oneshot(get(&format!("/session/{}/violations", session.session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let violations = json.as_array().unwrap();
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0]["class"], "NO_FACE");
    assert_eq!(violations[1]["class"], "MULTIPLE_FACES");

    let response = router
        .oneshot(get(&format!("/session/{}/report", session.session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "auto_submitted");
    assert_eq!(json["total_warnings"], 1);
    assert_eq!(json["total_violations"], 2);
    assert_eq!(json["violations"].as_array().unwrap().len(), 2);
}
