//! Violation policy table: class -> trigger mode, severity, warning eligibility
//!
//! Defaults:
//! - NO_FACE:        Sustained 3.0s, High, counts as warning
//! - MULTIPLE_FACES: Instant, Critical, no warning (forces auto-submit)
//! - LOOKING_AWAY:   Sustained 3.0s, Medium, counts as warning
//! - HEAD_TURN:      Sustained 3.0s, Medium, counts as warning

use crate::config::ProctorConfig;
use crate::types::{Severity, TriggerMode, ViolationClass, ViolationPolicy};

/// Static, read-only mapping from violation class to policy
///
/// Built once from config at startup and shared by all sessions without
/// locking.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTable {
    no_face: ViolationPolicy,
    multiple_faces: ViolationPolicy,
    looking_away: ViolationPolicy,
    head_turn: ViolationPolicy,
}

impl PolicyTable {
    /// Build the table from configured thresholds
    pub fn from_config(config: &ProctorConfig) -> Self {
        Self {
            no_face: ViolationPolicy {
                trigger: TriggerMode::Sustained {
                    threshold_secs: config.no_face_threshold_secs,
                },
                severity: Severity::High,
                counts_as_warning: true,
            },
            multiple_faces: ViolationPolicy {
                trigger: TriggerMode::Instant,
                severity: Severity::Critical,
                counts_as_warning: false,
            },
            looking_away: ViolationPolicy {
                trigger: TriggerMode::Sustained {
                    threshold_secs: config.looking_away_threshold_secs,
                },
                severity: Severity::Medium,
                counts_as_warning: true,
            },
            head_turn: ViolationPolicy {
                trigger: TriggerMode::Sustained {
                    threshold_secs: config.head_turn_threshold_secs,
                },
                severity: Severity::Medium,
                counts_as_warning: true,
            },
        }
    }

    /// Policy for a class
    pub fn policy(&self, class: ViolationClass) -> &ViolationPolicy {
        match class {
            ViolationClass::NoFace => &self.no_face,
            ViolationClass::MultipleFaces => &self.multiple_faces,
            ViolationClass::LookingAway => &self.looking_away,
            ViolationClass::HeadTurn => &self.head_turn,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::from_config(&ProctorConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
