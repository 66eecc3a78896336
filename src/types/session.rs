//! Session lifecycle state and reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ViolationEvent;

/// Lifecycle status of an exam session
///
/// Monotone: once a session leaves Active it is terminal and no further
/// mutation is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Exam in progress, frames accepted
    Active,
    /// Student submitted the exam
    Submitted,
    /// Engine force-submitted the exam on violations
    AutoSubmitted,
    /// Durable writes could not be reconciled; held for manual review
    NeedsReview,
}

impl SessionStatus {
    /// Terminal statuses accept no further frames or transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Active => "active",
            SessionStatus::Submitted => "submitted",
            SessionStatus::AutoSubmitted => "auto_submitted",
            SessionStatus::NeedsReview => "needs_review",
        };
        write!(f, "{}", name)
    }
}

/// Durable per-session record held by the event sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub warnings_count: u32,
    pub violation_count: u32,
    pub identity_verified: bool,
}

impl SessionState {
    /// Fresh Active session
    pub fn new(session_id: &str, student_id: &str, exam_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            student_id: student_id.to_string(),
            exam_id: exam_id.to_string(),
            status: SessionStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            warnings_count: 0,
            violation_count: 0,
            identity_verified: false,
        }
    }
}

/// Final report for a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamReport {
    pub session_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
    pub status: SessionStatus,
    pub total_warnings: u32,
    pub total_violations: u32,
    pub violations: Vec<ViolationEvent>,
    pub identity_verified: bool,
}

impl ExamReport {
    /// Assemble a report from a session record and its violation log
    pub fn from_session(session: &SessionState, violations: Vec<ViolationEvent>) -> Self {
        let end_time = session.end_time.unwrap_or_else(Utc::now);
        let duration_secs = (end_time - session.start_time).num_seconds();
        Self {
            session_id: session.session_id.clone(),
            student_id: session.student_id.clone(),
            exam_id: session.exam_id.clone(),
            start_time: session.start_time,
            end_time,
            duration_secs,
            status: session.status,
            total_warnings: session.warnings_count,
            total_violations: session.violation_count,
            violations,
            identity_verified: session.identity_verified,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_is_non_terminal() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Submitted.is_terminal());
        assert!(SessionStatus::AutoSubmitted.is_terminal());
        assert!(SessionStatus::NeedsReview.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::AutoSubmitted).unwrap();
        assert_eq!(json, "\"auto_submitted\"");
    }

    #[test]
    fn test_report_duration_from_times() {
        let mut session = SessionState::new("s1", "stu1", "exam1");
        session.end_time = Some(session.start_time + chrono::Duration::seconds(90));
        session.status = SessionStatus::Submitted;
        let report = ExamReport::from_session(&session, Vec::new());
        assert_eq!(report.duration_secs, 90);
        assert_eq!(report.status, SessionStatus::Submitted);
    }
}
