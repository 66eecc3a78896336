//! Session aggregator: tracker plus counters plus the auto-submit predicate
//!
//! Detection order mirrors what the vision pipeline can actually measure:
//! with zero faces only NoFace is evaluated; with several faces only
//! MultipleFaces; gaze and head pose are evaluated only when exactly one
//! face is visible, and their ongoing state is cleared otherwise.

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::core::tracker::{Firing, ViolationTracker};
use crate::core::PolicyTable;
use crate::types::{Observation, ProcessResult, Severity, ViolationClass, ViolationEvent};

/// Tracker wrapper with running counters for one session
#[derive(Debug)]
pub struct SessionAggregator {
    session_id: String,
    student_id: String,
    tracker: ViolationTracker,
    max_warnings: u32,
    warnings_count: u32,
    violation_count: u32,
}

impl SessionAggregator {
    pub fn new(session_id: &str, student_id: &str, policies: PolicyTable, max_warnings: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            student_id: student_id.to_string(),
            tracker: ViolationTracker::new(policies),
            max_warnings,
            warnings_count: 0,
            violation_count: 0,
        }
    }

    /// Run one observation through the tracker and compute the session
    /// decision synchronously
    pub fn process(&mut self, obs: &Observation) -> ProcessResult {
        let now = obs.timestamp;
        let mut firings: Vec<Firing> = Vec::new();

        if obs.face_count == 0 {
            firings.extend(self.tracker.evaluate(ViolationClass::NoFace, true, now));
            self.tracker.evaluate(ViolationClass::MultipleFaces, false, now);
            // No face to measure gaze or pose from
            self.tracker.clear(ViolationClass::LookingAway);
            self.tracker.clear(ViolationClass::HeadTurn);
        } else if obs.face_count > 1 {
            firings.extend(self.tracker.evaluate(ViolationClass::MultipleFaces, true, now));
            self.tracker.evaluate(ViolationClass::NoFace, false, now);
            self.tracker.clear(ViolationClass::LookingAway);
            self.tracker.clear(ViolationClass::HeadTurn);
        } else {
            self.tracker.evaluate(ViolationClass::NoFace, false, now);
            self.tracker.evaluate(ViolationClass::MultipleFaces, false, now);
            firings.extend(self.tracker.evaluate(ViolationClass::LookingAway, obs.looking_away, now));
            firings.extend(self.tracker.evaluate(ViolationClass::HeadTurn, obs.head_turned, now));
        }

        let mut critical_fired = false;
        let mut events = Vec::with_capacity(firings.len());
        for firing in firings {
            self.violation_count += 1;
            if firing.counts_as_warning {
                self.warnings_count += 1;
            }
            if firing.severity == Severity::Critical {
                critical_fired = true;
            }

            let event = self.build_event(&firing, obs);
            info!(
                session_id = %self.session_id,
                class = %event.class,
                severity = %event.severity,
                duration_secs = event.duration_secs,
                "violation fired"
            );
            events.push(event);
        }

        // A Critical firing forces auto-submit regardless of warnings
        let auto_submit = critical_fired || self.warnings_count >= self.max_warnings;

        ProcessResult {
            events,
            auto_submit,
            warnings_count: self.warnings_count,
            violation_count: self.violation_count,
        }
    }

    fn build_event(&self, firing: &Firing, obs: &Observation) -> ViolationEvent {
        ViolationEvent {
            id: Uuid::new_v4(),
            session_id: self.session_id.clone(),
            student_id: self.student_id.clone(),
            class: firing.class,
            severity: firing.severity,
            duration_secs: firing.duration_secs,
            timestamp: obs.timestamp,
            metadata: json!({
                "gaze": obs.gaze,
                "pose": obs.pose,
                "face_count": obs.face_count,
            }),
        }
    }

    /// Resume counters from the durable record (reconnect after eviction)
    pub fn seed_counts(&mut self, warnings: u32, violations: u32) {
        self.warnings_count = warnings;
        self.violation_count = violations;
    }

    /// True once accumulated warnings reach the configured limit
    ///
    /// Critical firings force auto-submit inside `process` directly and
    /// are not reflected here.
    pub fn should_auto_submit(&self) -> bool {
        self.warnings_count >= self.max_warnings
    }

    pub fn warnings_count(&self) -> u32 {
        self.warnings_count
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    /// Classes currently tracked as ongoing (for status snapshots)
    pub fn ongoing_classes(&self) -> Vec<ViolationClass> {
        self.tracker.ongoing_classes()
    }
}

// =============================================================================
// TESTS
// =============================================================================
