//! Invigil: real-time exam proctoring engine
//!
//! Turns a per-session stream of webcam observations (face count, gaze,
//! head pose) into debounced violation events and session-lifecycle
//! decisions: continue, warn, or auto-submit.

pub mod config;
pub mod core;
pub mod types;

// =============================================================================
// DEFAULT THRESHOLDS - overridable via ProctorConfig
// =============================================================================

/// Seconds the face may be absent before a NoFace violation fires
pub const DEFAULT_NO_FACE_THRESHOLD_SECS: f64 = 3.0;

/// Seconds of sustained off-screen gaze before a LookingAway violation fires
pub const DEFAULT_LOOKING_AWAY_THRESHOLD_SECS: f64 = 3.0;

/// Seconds of sustained head turn before a HeadTurn violation fires
pub const DEFAULT_HEAD_TURN_THRESHOLD_SECS: f64 = 3.0;

/// Warnings accumulated before a session is auto-submitted
pub const DEFAULT_MAX_WARNINGS: u32 = 3;

/// Advisory cadence for client frame uploads (seconds); not enforced
pub const DEFAULT_FRAME_INTERVAL_SECS: f64 = 2.0;

// =============================================================================
// EVENT SINK RETRY DISCIPLINE
// =============================================================================

/// Attempts for a durable write before the session fails into NeedsReview
pub const SINK_RETRY_LIMIT: u32 = 3;

/// Base backoff between sink retries (milliseconds, doubled per attempt)
pub const SINK_RETRY_BACKOFF_MS: u64 = 50;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
