//! Observation source: the vision-pipeline collaborator
//!
//! Turns one opaque frame payload into a structured Observation. A frame
//! that cannot be decoded or analyzed is an error: the caller logs and
//! drops it without touching violation state.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{AnalyzeError, Observation};

/// Produces one Observation per frame
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Analyze a decoded frame payload captured at `timestamp`
    async fn analyze(&self, frame: &[u8], timestamp: DateTime<Utc>) -> Result<Observation, AnalyzeError>;
}

/// Deterministic source replaying a scripted list of results
///
/// Used by tests and demos in place of a real CV backend. Each call pops
/// the next scripted entry; an exhausted script reports a detector error,
/// which callers treat as a dropped frame.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Observation, AnalyzeError>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an observation for the next frame
    pub fn push(&self, obs: Observation) {
        self.script.lock().unwrap().push_back(Ok(obs));
    }

    /// Queue a failure for the next frame
    pub fn push_error(&self, err: AnalyzeError) {
        self.script.lock().unwrap().push_back(Err(err));
    }
}

#[async_trait]
impl ObservationSource for ScriptedSource {
    async fn analyze(&self, _frame: &[u8], timestamp: DateTime<Utc>) -> Result<Observation, AnalyzeError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut obs)) => {
                // Scripted entries adopt the frame's capture time
                obs.timestamp = timestamp;
                Ok(obs)
            }
            Some(Err(err)) => Err(err),
            None => Err(AnalyzeError::Detector("script exhausted".to_string())),
        }
    }
}

/// Source reporting the same observation shape for every frame
///
/// Lets the server run without a CV backend wired in (smoke and load
/// testing); real deployments implement ObservationSource over their
/// vision pipeline.
#[derive(Debug, Default)]
pub struct FixedSource {
    face_count: usize,
}

impl FixedSource {
    /// Every frame shows one attentive face
    pub fn single_face() -> Self {
        Self { face_count: 1 }
    }
}

#[async_trait]
impl ObservationSource for FixedSource {
    async fn analyze(&self, _frame: &[u8], timestamp: DateTime<Utc>) -> Result<Observation, AnalyzeError> {
        Ok(Observation::faces(self.face_count, timestamp))
    }
}

// =============================================================================
// TESTS
// =============================================================================
