//! Core types for Invigil

mod error;
mod observation;
mod result;
mod session;
mod violation;
mod wire;

pub use error::{AnalyzeError, EngineError, SinkError};
pub use observation::{FaceBox, GazeMeta, Observation, PoseMeta};
pub use result::ProcessResult;
pub use session::{ExamReport, SessionState, SessionStatus};
pub use violation::{OngoingViolation, Severity, TriggerMode, ViolationClass, ViolationEvent, ViolationPolicy};
pub use wire::{FrameMessage, FrameReply, ReplyStatus, CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR, CLOSE_SESSION_NOT_FOUND};
