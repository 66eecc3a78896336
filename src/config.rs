//! Runtime configuration for the proctoring engine

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_HEAD_TURN_THRESHOLD_SECS, DEFAULT_LOOKING_AWAY_THRESHOLD_SECS,
    DEFAULT_MAX_WARNINGS, DEFAULT_NO_FACE_THRESHOLD_SECS,
};

/// Recognized engine options, loaded once at startup and read-only after
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Sustained threshold for NoFace (seconds)
    pub no_face_threshold_secs: f64,
    /// Sustained threshold for LookingAway (seconds)
    pub looking_away_threshold_secs: f64,
    /// Sustained threshold for HeadTurn (seconds)
    pub head_turn_threshold_secs: f64,
    /// Warning count at which a session is auto-submitted
    pub max_warnings: u32,
    /// Advisory client frame cadence (seconds); reported, not enforced
    pub frame_interval_secs: f64,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            no_face_threshold_secs: DEFAULT_NO_FACE_THRESHOLD_SECS,
            looking_away_threshold_secs: DEFAULT_LOOKING_AWAY_THRESHOLD_SECS,
            head_turn_threshold_secs: DEFAULT_HEAD_TURN_THRESHOLD_SECS,
            max_warnings: DEFAULT_MAX_WARNINGS,
            frame_interval_secs: DEFAULT_FRAME_INTERVAL_SECS,
        }
    }
}
