//! In-memory session store for `--no-save` runs.
//!
//! Keeps the latest checkpoint per session so resume-within-process and
//! the final handoff still work; nothing touches disk.

use async_trait::async_trait;
use meld_application::{RunSummary, SessionStore, StoreError};
use meld_domain::{AdvisorFeedback, Plan, RunEvent, Session};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    events: Mutex<Vec<RunEvent>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn checkpoint(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn write_plan(&self, _session: &Session, _plan: &Plan) -> Result<(), StoreError> {
        Ok(())
    }

    async fn write_feedback(
        &self,
        _session: &Session,
        _feedback: &AdvisorFeedback,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn write_final(&self, _session: &Session) -> Result<(), StoreError> {
        Ok(())
    }

    async fn append_event(&self, _session_id: &str, event: &RunEvent) -> Result<(), StoreError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError> {
        let mut runs: Vec<RunSummary> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .map(|s| RunSummary {
                id: s.id.clone(),
                status: s.status,
                rounds: s.current_round,
                started_at: s.started_at,
            })
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}
