//! HTTP + WebSocket API for the proctoring engine
//!
//! Endpoints:
//! - POST /session/new - Create exam session
//! - GET /session/{id} - Session status
//! - POST /session/{id}/identity - Initial identity verification
//! - POST /session/{id}/submit - Manual submit
//! - GET /session/{id}/violations - Persisted violation events
//! - GET /session/{id}/report - Final exam report
//! - WS /ws/proctor/{id} - Live frame stream
//! - GET /health - Health check

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, StreamExt};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ProctorConfig;
use crate::core::{ObservationSource, SessionRegistry};
use crate::types::{
    EngineError, ExamReport, FrameMessage, FrameReply, SessionState, SessionStatus, ViolationClass,
    ViolationEvent, CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR, CLOSE_SESSION_NOT_FOUND,
};

/// App state shared by all handlers
pub struct AppState {
    pub registry: SessionRegistry,
    pub source: Arc<dyn ObservationSource>,
    pub config: ProctorConfig,
}

/// Create new session request
#[derive(Debug, Deserialize)]
pub struct NewSessionRequest {
    pub student_id: String,
    pub exam_id: String,
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    /// Advisory frame upload cadence for the client
    pub frame_interval_secs: f64,
}

/// Session status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub status: SessionStatus,
    pub warnings_count: u32,
    pub violation_count: u32,
    pub identity_verified: bool,
    pub ongoing: Vec<ViolationClass>,
    pub connected: bool,
}

/// Identity verification request
#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    /// Base64-encoded webcam frame
    pub frame: String,
}

/// Identity verification response
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router(
    config: ProctorConfig,
    registry: SessionRegistry,
    source: Arc<dyn ObservationSource>,
) -> Router {
    let state = Arc::new(AppState {
        registry,
        source,
        config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session))
        .route("/session/:id/identity", post(verify_identity))
        .route("/session/:id/submit", post(submit_session))
        .route("/session/:id/violations", get(get_violations))
        .route("/session/:id/report", get(get_report))
        .route("/ws/proctor/:id", get(proctor_ws))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: state.registry.sessions_active().await,
    })
}

/// Create new exam session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, StatusCode> {
    let session = state
        .registry
        .sink()
        .create_session(&req.student_id, &req.exam_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/proctor/{}", session.session_id),
        session_id: session.session_id,
        frame_interval_secs: state.config.frame_interval_secs,
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let session = fetch_session(&state, &id).await?;
    let live = state.registry.counters(&id).await;
    let connected = live.is_some();

    let (warnings_count, violation_count, ongoing) = match live {
        Some(counters) => counters,
        None => (session.warnings_count, session.violation_count, Vec::new()),
    };

    Ok(Json(SessionStatusResponse {
        session_id: session.session_id,
        student_id: session.student_id,
        exam_id: session.exam_id,
        status: session.status,
        warnings_count,
        violation_count,
        identity_verified: session.identity_verified,
        ongoing,
        connected,
    }))
}

/// Verify student identity at exam start: exactly one face required
async fn verify_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<IdentityResponse>, StatusCode> {
    let session = fetch_session(&state, &id).await?;
    if session.status.is_terminal() {
        return Err(StatusCode::CONFLICT);
    }

    let bytes = match base64::engine::general_purpose::STANDARD.decode(&req.frame) {
        Ok(bytes) => bytes,
        Err(_) => {
            return Ok(Json(IdentityResponse {
                verified: false,
                message: Some("Failed to decode frame".to_string()),
            }))
        }
    };

    let obs = match state.source.analyze(&bytes, Utc::now()).await {
        Ok(obs) => obs,
        Err(err) => {
            warn!(session_id = %id, %err, "identity frame analysis failed");
            return Ok(Json(IdentityResponse {
                verified: false,
                message: Some("Failed to analyze frame".to_string()),
            }));
        }
    };

    let rejection = match obs.face_count {
        0 => Some("No face detected"),
        1 => None,
        _ => Some("Multiple faces detected"),
    };
    if let Some(rejection) = rejection {
        return Ok(Json(IdentityResponse {
            verified: false,
            message: Some(rejection.to_string()),
        }));
    }

    state
        .registry
        .sink()
        .set_identity_verified(&id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    info!(session_id = %id, "identity verified");

    Ok(Json(IdentityResponse {
        verified: true,
        message: None,
    }))
}

/// Submit the exam on the student's behalf
async fn submit_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, StatusCode> {
    match state.registry.submit(&id).await {
        Ok(session) => Ok(Json(session)),
        Err(EngineError::UnknownSession(_)) => Err(StatusCode::NOT_FOUND),
        Err(EngineError::SessionTerminated { .. }) => Err(StatusCode::CONFLICT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// List persisted violations for a session
async fn get_violations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ViolationEvent>>, StatusCode> {
    fetch_session(&state, &id).await?;
    let violations = state
        .registry
        .sink()
        .list_violations(&id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(violations))
}

/// Final exam report for a session
async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExamReport>, StatusCode> {
    let session = fetch_session(&state, &id).await?;
    let violations = state
        .registry
        .sink()
        .list_violations(&id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(ExamReport::from_session(&session, violations)))
}

async fn fetch_session(state: &AppState, id: &str) -> Result<SessionState, StatusCode> {
    state
        .registry
        .sink()
        .get_session_state(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)
}

/// WebSocket endpoint for the live frame stream
async fn proctor_ws(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_proctor_socket(socket, state, id))
}

/// Drive one proctoring connection: recv frame, analyze, process, reply
///
/// The loop is serial per connection, so observations for this session
/// reach the registry in arrival order with at most one in flight.
async fn handle_proctor_socket(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Refuse unknown or already-terminal sessions before any state exists
    if let Err(err) = state.registry.ensure(&session_id).await {
        warn!(session_id = %session_id, %err, "proctoring connection refused");
        let _ = sender
            .send(close_message(CLOSE_SESSION_NOT_FOUND, "Session not found or terminal"))
            .await;
        return;
    }
    info!(session_id = %session_id, "proctoring connection established");

    while let Some(inbound) = receiver.next().await {
        let text = match inbound {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            // Pings are answered by axum; other frame kinds carry nothing we accept
            Ok(_) => continue,
        };

        let frame: FrameMessage = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(_) => {
                // Malformed payload: protocol-error close, no state mutation
                let _ = sender
                    .send(close_message(CLOSE_PROTOCOL_ERROR, "Invalid JSON payload"))
                    .await;
                break;
            }
        };

        let Some(captured_at) = frame_time(frame.timestamp) else {
            let _ = sender
                .send(close_message(CLOSE_PROTOCOL_ERROR, "Invalid timestamp"))
                .await;
            break;
        };

        let bytes = match base64::engine::general_purpose::STANDARD.decode(&frame.frame) {
            Ok(bytes) => bytes,
            Err(_) => {
                // Undecodable frame: dropped and logged, never a violation
                warn!(session_id = %session_id, "dropping undecodable frame");
                if send_reply(&mut sender, &FrameReply::error("Failed to decode frame"))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        let obs = match state.source.analyze(&bytes, captured_at).await {
            Ok(obs) => obs,
            Err(err) => {
                warn!(session_id = %session_id, %err, "dropping frame, vision pipeline failed");
                if send_reply(&mut sender, &FrameReply::error("Frame analysis failed"))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        match state.registry.process(&session_id, &obs).await {
            Ok(result) => {
                let reply =
                    FrameReply::ok(frame.timestamp, result.violation_message(), result.auto_submit);
                if send_reply(&mut sender, &reply).await.is_err() {
                    break;
                }

                if result.auto_submit {
                    // One terminal message, then a normal close
                    let _ = send_reply(
                        &mut sender,
                        &FrameReply::auto_submit("Exam auto-submitted due to violations"),
                    )
                    .await;
                    let _ = sender
                        .send(close_message(CLOSE_NORMAL, "Exam auto-submitted"))
                        .await;
                    return;
                }
            }
            Err(err) if err.is_terminal_rejection() => {
                let _ = send_reply(&mut sender, &FrameReply::error(err.to_string())).await;
                let _ = sender
                    .send(close_message(CLOSE_NORMAL, "Session no longer active"))
                    .await;
                return;
            }
            Err(err) => {
                warn!(session_id = %session_id, %err, "frame processing error");
                if send_reply(&mut sender, &FrameReply::error(err.to_string()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    // Transport gone: evict the tracker; counters resume from the sink on
    // reconnect
    state.registry.retire(&session_id).await;
    info!(session_id = %session_id, "proctoring connection closed");
}

async fn send_reply(
    sender: &mut SplitSink<WebSocket, Message>,
    reply: &FrameReply,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(reply).unwrap_or_default();
    sender.send(Message::Text(json)).await
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }))
}

/// Client capture time (unix seconds) as a DateTime
fn frame_time(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0) as i64)
}

/// Run the API server
pub async fn run_server(
    addr: &str,
    config: ProctorConfig,
    registry: SessionRegistry,
    source: Arc<dyn ObservationSource>,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(config, registry, source);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "proctoring API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_time_accepts_fractional_seconds() {
        let time = frame_time(1_700_000_000.25).unwrap();
        assert_eq!(time.timestamp_millis(), 1_700_000_000_250);
    }

    #[test]
    fn test_frame_time_rejects_garbage() {
        assert!(frame_time(f64::NAN).is_none());
        assert!(frame_time(f64::INFINITY).is_none());
        assert!(frame_time(-5.0).is_none());
    }
}
