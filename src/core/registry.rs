//! Session registry: one aggregator per live session, serialized per entry
//!
//! The registry owns the in-memory violation state for every active
//! session. Each entry sits behind its own mutex, so frames for one
//! session are processed strictly in arrival order while unrelated
//! sessions run fully in parallel. The id -> entry map lock is held only
//! for lookup, insert and remove, never across frame processing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, warn};

use crate::config::ProctorConfig;
use crate::core::{EventSink, PolicyTable, SessionAggregator};
use crate::types::{
    EngineError, Observation, ProcessResult, SessionState, SessionStatus, SinkError, ViolationClass,
};
use crate::{SINK_RETRY_BACKOFF_MS, SINK_RETRY_LIMIT};

type Entry = Arc<Mutex<SessionEntry>>;

/// Aggregator plus the terminal marker consulted under the entry lock
///
/// `terminal` is set under the entry lock before the entry is evicted,
/// so a frame already queued on the lock observes the transition and is
/// rejected instead of processed.
struct SessionEntry {
    agg: SessionAggregator,
    terminal: Option<SessionStatus>,
}

/// Registry of live session trackers, keyed by session id
pub struct SessionRegistry {
    policies: PolicyTable,
    max_warnings: u32,
    sink: Arc<dyn EventSink>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(config: &ProctorConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            policies: PolicyTable::from_config(config),
            max_warnings: config.max_warnings,
            sink,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create the tracker entry for a session on first use
    ///
    /// Rejects unknown and already-terminal sessions without creating
    /// any state.
    pub async fn ensure(&self, session_id: &str) -> Result<(), EngineError> {
        if self.entries.read().await.contains_key(session_id) {
            return Ok(());
        }

        let state = self
            .sink
            .get_session_state(session_id)
            .await?
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        if state.status.is_terminal() {
            return Err(EngineError::SessionTerminated {
                id: session_id.to_string(),
                status: state.status,
            });
        }

        {
            let mut entries = self.entries.write().await;
            // Another connection may have raced us here; keep the first entry
            entries.entry(session_id.to_string()).or_insert_with(|| {
                let mut agg = SessionAggregator::new(
                    session_id,
                    &state.student_id,
                    self.policies,
                    self.max_warnings,
                );
                // Counters resume from the durable record after an eviction
                agg.seed_counts(state.warnings_count, state.violation_count);
                Arc::new(Mutex::new(SessionEntry {
                    agg,
                    terminal: None,
                }))
            });
        }

        // A submit can land between the state read above and the insert;
        // re-read so a terminal session never keeps a live entry
        let state = self
            .sink
            .get_session_state(session_id)
            .await?
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        if state.status.is_terminal() {
            self.mark_terminal(session_id, state.status).await;
            self.retire(session_id).await;
            return Err(EngineError::SessionTerminated {
                id: session_id.to_string(),
                status: state.status,
            });
        }
        Ok(())
    }

    /// Flag a live entry as terminal so frames queued on its lock are
    /// rejected
    async fn mark_terminal(&self, session_id: &str, status: SessionStatus) {
        let entry = self.entries.read().await.get(session_id).cloned();
        if let Some(entry) = entry {
            entry.lock().await.terminal = Some(status);
        }
    }

    /// Route one observation through its session, persist the outcome and
    /// apply any terminal transition
    ///
    /// At most one observation is in flight per session at any time; the
    /// decision is made in memory first and never recomputed, durable
    /// writes are retried behind it.
    pub async fn process(
        &self,
        session_id: &str,
        obs: &Observation,
    ) -> Result<ProcessResult, EngineError> {
        self.ensure(session_id).await?;
        let entry = self
            .entries
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;

        // Per-session serialization point; held across persistence so a
        // slow sink stalls only this session
        let mut guard = entry.lock().await;

        // The session may have gone terminal while this frame queued on
        // the lock
        if let Some(status) = guard.terminal {
            return Err(EngineError::SessionTerminated {
                id: session_id.to_string(),
                status,
            });
        }

        let result = guard.agg.process(obs);

        if let Err(source) = self.persist(session_id, &result).await {
            guard.terminal = Some(SessionStatus::NeedsReview);
            drop(guard);
            self.fail_session(session_id).await;
            return Err(EngineError::SinkUnreconciled {
                session_id: session_id.to_string(),
                source,
            });
        }

        if result.auto_submit {
            if let Err(source) = self
                .retry_write(session_id, || {
                    self.sink
                        .update_status(session_id, SessionStatus::AutoSubmitted, Some(Utc::now()))
                })
                .await
            {
                guard.terminal = Some(SessionStatus::NeedsReview);
                drop(guard);
                self.fail_session(session_id).await;
                return Err(EngineError::SinkUnreconciled {
                    session_id: session_id.to_string(),
                    source,
                });
            }
            guard.terminal = Some(SessionStatus::AutoSubmitted);
            drop(guard);
            self.retire(session_id).await;
        }

        Ok(result)
    }

    /// Persist fired events and warning increments, in firing order
    async fn persist(&self, session_id: &str, result: &ProcessResult) -> Result<(), SinkError> {
        for event in &result.events {
            self.retry_write(session_id, || self.sink.record_violation(event))
                .await?;
            if self.policies.policy(event.class).counts_as_warning {
                self.retry_write(session_id, || self.sink.increment_warnings(session_id))
                    .await?;
            }
        }
        Ok(())
    }

    /// Bounded retry with doubling backoff for one durable write
    async fn retry_write<T, F, Fut>(&self, session_id: &str, mut op: F) -> Result<T, SinkError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, SinkError>>,
    {
        let mut backoff = Duration::from_millis(SINK_RETRY_BACKOFF_MS);
        let mut last_err = None;
        for attempt in 1..=SINK_RETRY_LIMIT {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(session_id, attempt, %err, "sink write failed");
                    last_err = Some(err);
                    if attempt < SINK_RETRY_LIMIT {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SinkError::Unavailable("no attempts made".to_string())))
    }

    /// Fail a session into the terminal NeedsReview status after an
    /// unreconcilable write, then retire it
    async fn fail_session(&self, session_id: &str) {
        error!(session_id, "durable log diverged, failing session into needs_review");
        if let Err(err) = self
            .sink
            .update_status(session_id, SessionStatus::NeedsReview, Some(Utc::now()))
            .await
        {
            error!(session_id, %err, "could not record needs_review status");
        }
        self.retire(session_id).await;
    }

    /// Submit a session on the student's behalf and retire its tracker
    pub async fn submit(&self, session_id: &str) -> Result<SessionState, EngineError> {
        let entry = self.entries.read().await.get(session_id).cloned();
        match entry {
            Some(entry) => {
                // Wait out any observation in flight; the transition is
                // made under the entry lock so queued frames observe it
                let mut guard = entry.lock().await;
                if let Some(status) = guard.terminal {
                    return Err(EngineError::SessionTerminated {
                        id: session_id.to_string(),
                        status,
                    });
                }
                self.check_active(session_id).await?;
                self.sink
                    .update_status(session_id, SessionStatus::Submitted, Some(Utc::now()))
                    .await?;
                guard.terminal = Some(SessionStatus::Submitted);
                drop(guard);
                self.retire(session_id).await;
            }
            None => {
                self.check_active(session_id).await?;
                self.sink
                    .update_status(session_id, SessionStatus::Submitted, Some(Utc::now()))
                    .await?;
                // A connect racing this transition may have built an entry
                // from the stale Active record
                self.mark_terminal(session_id, SessionStatus::Submitted).await;
                self.retire(session_id).await;
            }
        }

        let state = self
            .sink
            .get_session_state(session_id)
            .await?
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        Ok(state)
    }

    /// Reject unknown or terminal sessions against the durable record
    async fn check_active(&self, session_id: &str) -> Result<(), EngineError> {
        let state = self
            .sink
            .get_session_state(session_id)
            .await?
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        if state.status.is_terminal() {
            return Err(EngineError::SessionTerminated {
                id: session_id.to_string(),
                status: state.status,
            });
        }
        Ok(())
    }

    /// Drop the tracker entry; subsequent frames for this id are rejected
    pub async fn retire(&self, session_id: &str) {
        self.entries.write().await.remove(session_id);
    }

    /// Live in-memory counters for a session, if it has a tracker
    pub async fn counters(&self, session_id: &str) -> Option<(u32, u32, Vec<ViolationClass>)> {
        let entry = self.entries.read().await.get(session_id).cloned()?;
        let guard = entry.lock().await;
        Some((
            guard.agg.warnings_count(),
            guard.agg.violation_count(),
            guard.agg.ongoing_classes(),
        ))
    }

    /// Number of sessions with a live tracker
    pub async fn sessions_active(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }
}

// =============================================================================
// TESTS
// =============================================================================
