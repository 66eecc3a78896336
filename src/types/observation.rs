//! Per-frame observations produced by the vision pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounding box of one detected face, normalized pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub confidence: f64,
}

/// Gaze estimation metadata from the eye tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeMeta {
    /// Horizontal gaze ratio, 0.5 is center
    pub horizontal_ratio: f64,
    /// Vertical gaze ratio, 0.5 is center
    pub vertical_ratio: f64,
}

/// Head pose metadata from the pose estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMeta {
    /// Yaw angle in degrees, positive is turned right
    pub yaw: f64,
    /// Pitch angle in degrees, positive is looking up
    pub pitch: f64,
}

/// One frame's worth of structured vision output
///
/// Immutable; routed through the engine and never persisted itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub face_count: usize,
    pub faces: Vec<FaceBox>,
    pub looking_away: bool,
    pub gaze: Option<GazeMeta>,
    pub head_turned: bool,
    pub pose: Option<PoseMeta>,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Observation with a single centered face and no gaze/pose flags
    pub fn single_face(timestamp: DateTime<Utc>) -> Self {
        Self {
            face_count: 1,
            faces: Vec::new(),
            looking_away: false,
            gaze: None,
            head_turned: false,
            pose: None,
            timestamp,
        }
    }

    /// Observation with `count` faces and no gaze/pose flags
    pub fn faces(count: usize, timestamp: DateTime<Utc>) -> Self {
        Self {
            face_count: count,
            ..Self::single_face(timestamp)
        }
    }
}
