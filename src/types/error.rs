//! Error types for the engine and its collaborators

use thiserror::Error;

use crate::types::SessionStatus;

/// Failures from the durable event sink
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("sink write failed: {0}")]
    WriteFailed(String),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the vision pipeline for one frame
///
/// Any of these means the frame is dropped without a state mutation; a
/// bad frame is never treated as a NoFace violation.
#[derive(Debug, Clone, Error)]
pub enum AnalyzeError {
    #[error("frame could not be decoded: {0}")]
    Decode(String),
    #[error("detector failed: {0}")]
    Detector(String),
}

/// Failures from the session engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("session {id} already terminal ({status})")]
    SessionTerminated { id: String, status: SessionStatus },
    #[error("durable log could not be reconciled for session {session_id}")]
    SinkUnreconciled {
        session_id: String,
        #[source]
        source: SinkError,
    },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl EngineError {
    /// True if the caller should stop sending frames for this session
    pub fn is_terminal_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownSession(_)
                | EngineError::SessionTerminated { .. }
                | EngineError::SinkUnreconciled { .. }
        )
    }
}
