//! Wire messages for the proctoring WebSocket channel

use serde::{Deserialize, Serialize};

/// WS close code for normal termination (auto-submit path)
pub const CLOSE_NORMAL: u16 = 1000;
/// WS close code for malformed inbound payloads
pub const CLOSE_PROTOCOL_ERROR: u16 = 4000;
/// WS close code for unknown or terminal sessions at connect
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4004;

/// Inbound frame message from the examinee client
#[derive(Debug, Clone, Deserialize)]
pub struct FrameMessage {
    /// Base64-encoded image payload, opaque to the engine
    pub frame: String,
    /// Client capture time, unix seconds
    pub timestamp: f64,
}

/// Outbound status of one processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
    AutoSubmit,
}

/// Outbound reply for one inbound frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameReply {
    pub status: ReplyStatus,
    pub processed: bool,
    pub auto_submit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FrameReply {
    /// Frame processed, session continues
    pub fn ok(timestamp: f64, violation_message: Option<String>, auto_submit: bool) -> Self {
        Self {
            status: ReplyStatus::Ok,
            processed: true,
            auto_submit,
            timestamp: Some(timestamp),
            violation_message,
            message: None,
        }
    }

    /// Frame dropped or rejected, session continues
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            processed: false,
            auto_submit: false,
            timestamp: None,
            violation_message: None,
            message: Some(message.into()),
        }
    }

    /// Terminal message before a normal close
    pub fn auto_submit(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::AutoSubmit,
            processed: true,
            auto_submit: true,
            timestamp: None,
            violation_message: None,
            message: Some(message.into()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
