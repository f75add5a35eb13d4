//! Session store port.
//!
//! Persistence contract for round artifacts and run metadata. Writes are
//! atomic — a partially written artifact is never visible under its final
//! name — and every artifact passes through secret redaction before it
//! touches disk. Resume reads only what this port wrote.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meld_domain::{AdvisorFeedback, Plan, RunEvent, Session, SessionStatus};
use thiserror::Error;

/// Errors from the persistence layer. All of these are fatal to a run:
/// crash safety cannot be guaranteed once a write fails.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Run {0} is not resumable (status: {1:?})")]
    NotResumable(String, SessionStatus),
}

/// One row in a run listing.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub id: String,
    pub status: SessionStatus,
    pub rounds: u32,
    pub started_at: DateTime<Utc>,
}

/// Durable, crash-safe session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Commit the full session metadata snapshot. Called after every
    /// phase transition; the latest committed snapshot is what resume
    /// reconstructs from.
    async fn checkpoint(&self, session: &Session) -> Result<(), StoreError>;

    /// Persist one plan artifact.
    async fn write_plan(&self, session: &Session, plan: &Plan) -> Result<(), StoreError>;

    /// Persist one advisor feedback artifact.
    async fn write_feedback(
        &self,
        session: &Session,
        feedback: &AdvisorFeedback,
    ) -> Result<(), StoreError>;

    /// Persist the final plan of a terminal session.
    async fn write_final(&self, session: &Session) -> Result<(), StoreError>;

    /// Append one event to the run's append-only event log.
    async fn append_event(&self, session_id: &str, event: &RunEvent) -> Result<(), StoreError>;

    /// Reconstruct a session from its highest fully-committed state.
    async fn load(&self, session_id: &str) -> Result<Session, StoreError>;

    /// List known runs, newest first.
    async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError>;
}
