//! Violation classes, severities, policies and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Categories of proctoring breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationClass {
    /// No face visible in the frame
    NoFace,
    /// More than one face visible
    MultipleFaces,
    /// Gaze directed away from the screen
    LookingAway,
    /// Head turned away from the camera
    HeadTurn,
}

impl ViolationClass {
    /// All classes, in detection order
    pub const ALL: [ViolationClass; 4] = [
        ViolationClass::NoFace,
        ViolationClass::MultipleFaces,
        ViolationClass::LookingAway,
        ViolationClass::HeadTurn,
    ];

    /// Human-readable description for status messages
    pub fn description(&self) -> &'static str {
        match self {
            ViolationClass::NoFace => "No face detected",
            ViolationClass::MultipleFaces => "Multiple faces detected",
            ViolationClass::LookingAway => "Looking away from screen",
            ViolationClass::HeadTurn => "Head turned away",
        }
    }
}

impl std::fmt::Display for ViolationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViolationClass::NoFace => "NO_FACE",
            ViolationClass::MultipleFaces => "MULTIPLE_FACES",
            ViolationClass::LookingAway => "LOOKING_AWAY",
            ViolationClass::HeadTurn => "HEAD_TURN",
        };
        write!(f, "{}", name)
    }
}

/// Severity of a violation, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// How a violation class is triggered
///
/// Instant classes fire on first detection; Sustained classes fire only
/// after the condition holds continuously for the threshold duration.
/// The tagged variant makes "compare duration against a missing
/// threshold" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TriggerMode {
    Instant,
    Sustained { threshold_secs: f64 },
}

/// Policy for one violation class, loaded once at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViolationPolicy {
    pub trigger: TriggerMode,
    pub severity: Severity,
    /// Whether a firing counts toward the auto-submit warning threshold
    pub counts_as_warning: bool,
}

/// Bookkeeping for a condition currently holding in a session
///
/// At most one entry per class per session exists at any time; presence
/// means the condition has been continuously true since `started_at`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OngoingViolation {
    pub class: ViolationClass,
    pub started_at: DateTime<Utc>,
    /// Set once the occurrence has fired; suppresses re-firing until the
    /// condition clears and re-starts
    pub fired: bool,
}

impl OngoingViolation {
    pub fn new(class: ViolationClass, started_at: DateTime<Utc>) -> Self {
        Self {
            class,
            started_at,
            fired: false,
        }
    }
}

/// One audited violation firing
///
/// Created exactly once per firing, immutable, owned by the event sink
/// once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub id: Uuid,
    pub session_id: String,
    pub student_id: String,
    pub class: ViolationClass,
    pub severity: Severity,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
    /// Detector metadata captured at firing time (gaze/pose data)
    pub metadata: Value,
}

impl ViolationEvent {
    /// Status-line message for outbound WS replies
    pub fn message(&self) -> String {
        format!("{} ({})", self.class.description(), self.severity)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_serializes_screaming_snake() {
        let json = serde_json::to_string(&ViolationClass::NoFace).unwrap();
        assert_eq!(json, "\"NO_FACE\"");
        let json = serde_json::to_string(&ViolationClass::MultipleFaces).unwrap();
        assert_eq!(json, "\"MULTIPLE_FACES\"");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_trigger_mode_roundtrip() {
        let sustained = TriggerMode::Sustained { threshold_secs: 3.0 };
        let json = serde_json::to_string(&sustained).unwrap();
        let back: TriggerMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sustained);
    }
}
