//! Per-session violation tracker: debounced state machine over observations
//!
//! Transitions per class:
//! - condition false            -> ongoing entry cleared (re-armed)
//! - condition true, untracked  -> entry recorded; Instant fires now
//! - condition true, tracked    -> Sustained fires once duration >= threshold
//!
//! Each continuous occurrence fires at most once; the class re-arms only
//! after the condition transitions through false.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::PolicyTable;
use crate::types::{OngoingViolation, Severity, TriggerMode, ViolationClass};

/// A violation firing produced by one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Firing {
    pub class: ViolationClass,
    pub severity: Severity,
    pub duration_secs: f64,
    pub counts_as_warning: bool,
}

/// Debounced violation state for one session
#[derive(Debug)]
pub struct ViolationTracker {
    policies: PolicyTable,
    /// At most one entry per class; presence means the condition has held
    /// continuously since `started_at`
    ongoing: HashMap<ViolationClass, OngoingViolation>,
}

impl ViolationTracker {
    pub fn new(policies: PolicyTable) -> Self {
        Self {
            policies,
            ongoing: HashMap::new(),
        }
    }

    /// Evaluate one class against the current frame's condition
    pub fn evaluate(
        &mut self,
        class: ViolationClass,
        condition: bool,
        now: DateTime<Utc>,
    ) -> Option<Firing> {
        let policy = *self.policies.policy(class);

        if !condition {
            // Condition no longer holds, re-arm the class
            self.ongoing.remove(&class);
            return None;
        }

        match self.ongoing.entry(class) {
            Entry::Vacant(slot) => {
                // First frame of a new occurrence
                let mut ongoing = OngoingViolation::new(class, now);
                let fired = match policy.trigger {
                    TriggerMode::Instant => {
                        ongoing.fired = true;
                        Some(Firing {
                            class,
                            severity: policy.severity,
                            duration_secs: 0.0,
                            counts_as_warning: policy.counts_as_warning,
                        })
                    }
                    TriggerMode::Sustained { .. } => None,
                };
                slot.insert(ongoing);
                fired
            }
            Entry::Occupied(mut slot) => {
                let ongoing = slot.get_mut();
                if ongoing.fired {
                    // Occurrence already fired; stay silently ongoing
                    return None;
                }
                match policy.trigger {
                    // Instant entries are marked fired at insert time
                    TriggerMode::Instant => None,
                    TriggerMode::Sustained { threshold_secs } => {
                        let duration_secs =
                            (now - ongoing.started_at).num_milliseconds() as f64 / 1000.0;
                        if duration_secs >= threshold_secs {
                            ongoing.fired = true;
                            Some(Firing {
                                class,
                                severity: policy.severity,
                                duration_secs,
                                counts_as_warning: policy.counts_as_warning,
                            })
                        } else {
                            None
                        }
                    }
                }
            }
        }
    }

    /// Drop ongoing state for a class without evaluating it
    ///
    /// Used when the class is unobservable this frame (no single face to
    /// measure gaze or pose from), so a stale sustained timer cannot
    /// expire while unmeasured.
    pub fn clear(&mut self, class: ViolationClass) {
        self.ongoing.remove(&class);
    }

    /// Classes currently being tracked
    pub fn ongoing_classes(&self) -> Vec<ViolationClass> {
        self.ongoing.keys().copied().collect()
    }

    /// Is this class currently tracked as ongoing?
    pub fn is_ongoing(&self, class: ViolationClass) -> bool {
        self.ongoing.contains_key(&class)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tracker() -> ViolationTracker {
        ViolationTracker::new(PolicyTable::default())
    }

    #[test]
    fn test_sustained_does_not_fire_before_threshold() {
        let mut t = tracker();
        for secs in 0..3 {
            let fired = t.evaluate(ViolationClass::NoFace, true, at(secs));
            assert!(fired.is_none(), "fired early at t={}", secs);
        }
    }

    #[test]
    fn test_sustained_fires_at_threshold() {
        let mut t = tracker();
        for secs in 0..3 {
            assert!(t.evaluate(ViolationClass::NoFace, true, at(secs)).is_none());
        }
        let fired = t.evaluate(ViolationClass::NoFace, true, at(3)).unwrap();
        assert_eq!(fired.class, ViolationClass::NoFace);
        assert_eq!(fired.severity, Severity::High);
        assert_eq!(fired.duration_secs, 3.0);
        assert!(fired.counts_as_warning);
    }

    #[test]
    fn test_sustained_fires_once_per_occurrence() {
        let mut t = tracker();
        for secs in 0..=3 {
            t.evaluate(ViolationClass::NoFace, true, at(secs));
        }
        // Condition keeps holding; no duplicate firing
        for secs in 4..10 {
            assert!(t.evaluate(ViolationClass::NoFace, true, at(secs)).is_none());
        }
    }

    #[test]
    fn test_sustained_rearms_after_false_transition() {
        let mut t = tracker();
        for secs in 0..=3 {
            t.evaluate(ViolationClass::NoFace, true, at(secs));
        }
        // Face returns, state clears
        assert!(t.evaluate(ViolationClass::NoFace, false, at(5)).is_none());
        assert!(!t.is_ongoing(ViolationClass::NoFace));

        // Fresh occurrence accrues from its own start
        assert!(t.evaluate(ViolationClass::NoFace, true, at(6)).is_none());
        assert!(t.evaluate(ViolationClass::NoFace, true, at(8)).is_none());
        let fired = t.evaluate(ViolationClass::NoFace, true, at(9)).unwrap();
        assert_eq!(fired.duration_secs, 3.0);
    }

    #[test]
    fn test_instant_fires_on_first_detection() {
        let mut t = tracker();
        let fired = t.evaluate(ViolationClass::MultipleFaces, true, at(0)).unwrap();
        assert_eq!(fired.severity, Severity::Critical);
        assert_eq!(fired.duration_secs, 0.0);
        assert!(!fired.counts_as_warning);
    }

    #[test]
    fn test_instant_does_not_refire_while_ongoing() {
        let mut t = tracker();
        assert!(t.evaluate(ViolationClass::MultipleFaces, true, at(0)).is_some());
        // Repeated true frames: no numeric threshold comparison, no re-fire
        for secs in 1..6 {
            assert!(t.evaluate(ViolationClass::MultipleFaces, true, at(secs)).is_none());
        }
        // Clears then re-fires on the next occurrence
        t.evaluate(ViolationClass::MultipleFaces, false, at(6));
        assert!(t.evaluate(ViolationClass::MultipleFaces, true, at(7)).is_some());
    }

    #[test]
    fn test_clear_prevents_stale_timer_expiry() {
        let mut t = tracker();
        assert!(t.evaluate(ViolationClass::LookingAway, true, at(0)).is_none());
        // Class unobservable; cleared rather than evaluated
        t.clear(ViolationClass::LookingAway);
        // Condition resumes well past the old start; must not fire yet
        assert!(t.evaluate(ViolationClass::LookingAway, true, at(10)).is_none());
        assert!(t.evaluate(ViolationClass::LookingAway, true, at(12)).is_none());
        assert!(t.evaluate(ViolationClass::LookingAway, true, at(13)).is_some());
    }

    #[test]
    fn test_at_most_one_entry_per_class() {
        let mut t = tracker();
        for secs in 0..20 {
            t.evaluate(ViolationClass::NoFace, secs % 3 != 0, at(secs));
            t.evaluate(ViolationClass::LookingAway, secs % 2 == 0, at(secs));
            let classes = t.ongoing_classes();
            let mut dedup = classes.clone();
            dedup.sort_by_key(|c| format!("{}", c));
            dedup.dedup();
            assert_eq!(classes.len(), dedup.len());
        }
    }

    #[test]
    fn test_classes_tracked_independently() {
        let mut t = tracker();
        t.evaluate(ViolationClass::LookingAway, true, at(0));
        t.evaluate(ViolationClass::HeadTurn, true, at(2));
        // LookingAway matures first; HeadTurn keeps its own clock
        assert!(t.evaluate(ViolationClass::LookingAway, true, at(3)).is_some());
        assert!(t.evaluate(ViolationClass::HeadTurn, true, at(3)).is_none());
        assert!(t.evaluate(ViolationClass::HeadTurn, true, at(5)).is_some());
    }
}
