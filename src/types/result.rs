//! Result of routing one observation through a session

use serde::Serialize;

use crate::types::ViolationEvent;

/// Outcome of processing one observation for one session
///
/// Computed synchronously with the evaluation that produced any events,
/// so exactly one firing maps to exactly one auto-submit decision.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    /// Events fired by this observation, in detection order
    pub events: Vec<ViolationEvent>,
    /// Session must be force-submitted now
    pub auto_submit: bool,
    pub warnings_count: u32,
    pub violation_count: u32,
}

impl ProcessResult {
    /// Status-line summary of the fired events, if any
    pub fn violation_message(&self) -> Option<String> {
        if self.events.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.events.iter().map(|e| e.message()).collect();
        Some(parts.join("; "))
    }
}
