//! Durable event sink: audit log for violations and session transitions
//!
//! The engine is the source of truth for decisions; the sink is the
//! source of truth for audit. All operations are per-session and must
//! not require a lock shared across sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::types::{SessionState, SessionStatus, SinkError, ViolationEvent};

/// Durable store for violation events and session-status transitions
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Create a fresh Active session record
    async fn create_session(&self, student_id: &str, exam_id: &str) -> Result<SessionState, SinkError>;

    /// Current durable record for a session, if it exists
    async fn get_session_state(&self, session_id: &str) -> Result<Option<SessionState>, SinkError>;

    /// Persist one violation event, returning its id
    async fn record_violation(&self, event: &ViolationEvent) -> Result<Uuid, SinkError>;

    /// Increment the durable warning counter, returning the new count
    async fn increment_warnings(&self, session_id: &str) -> Result<u32, SinkError>;

    /// Transition session status; terminal statuses are never overwritten
    async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool, SinkError>;

    /// Mark the initial identity check as passed
    async fn set_identity_verified(&self, session_id: &str) -> Result<bool, SinkError>;

    /// All persisted violations for a session, in record order
    async fn list_violations(&self, session_id: &str) -> Result<Vec<ViolationEvent>, SinkError>;
}

/// In-process sink keeping sessions and violations in memory
///
/// Stands in for the persistence collaborator; storage engine internals
/// are outside the engine's scope.
#[derive(Default)]
pub struct MemorySink {
    sessions: RwLock<HashMap<String, SessionState>>,
    violations: RwLock<HashMap<String, Vec<ViolationEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, the shape the registry and router consume
    pub fn shared() -> Arc<dyn EventSink> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn create_session(&self, student_id: &str, exam_id: &str) -> Result<SessionState, SinkError> {
        let session_id = Uuid::new_v4().to_string();
        let state = SessionState::new(&session_id, student_id, exam_id);
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), state.clone());
        info!(session_id = %session_id, student_id, exam_id, "exam session created");
        Ok(state)
    }

    async fn get_session_state(&self, session_id: &str) -> Result<Option<SessionState>, SinkError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn record_violation(&self, event: &ViolationEvent) -> Result<Uuid, SinkError> {
        {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&event.session_id)
                .ok_or_else(|| SinkError::SessionNotFound(event.session_id.clone()))?;
            session.violation_count += 1;
        }
        self.violations
            .write()
            .await
            .entry(event.session_id.clone())
            .or_default()
            .push(event.clone());
        Ok(event.id)
    }

    async fn increment_warnings(&self, session_id: &str) -> Result<u32, SinkError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SinkError::SessionNotFound(session_id.to_string()))?;
        session.warnings_count += 1;
        Ok(session.warnings_count)
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool, SinkError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SinkError::SessionNotFound(session_id.to_string()))?;
        if session.status.is_terminal() {
            return Ok(false);
        }
        session.status = status;
        if end_time.is_some() {
            session.end_time = end_time;
        }
        info!(session_id, %status, "session status updated");
        Ok(true)
    }

    async fn set_identity_verified(&self, session_id: &str) -> Result<bool, SinkError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.identity_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_violations(&self, session_id: &str) -> Result<Vec<ViolationEvent>, SinkError> {
        Ok(self
            .violations
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
