//! Filesystem session store.
//!
//! One directory per run id:
//!
//! ```text
//! <root>/<run-id>/
//!   session.json              — full session snapshot (resume source)
//!   task.md / context.md      — immutable inputs
//!   plan.round{N}.md          — one plan artifact per round
//!   advisor.{name}.round{N}.md
//!   final-plan.md
//!   events.jsonl              — append-only event log
//! ```
//!
//! Every non-append write goes through temp-file-then-rename, so a crash
//! mid-write never leaves a partial artifact under its final name. The
//! event log is append-only with one self-contained JSON object per line.

use crate::store::redact::redact_secrets;
use async_trait::async_trait;
use chrono::Utc;
use meld_application::{RunSummary, SessionStore, StoreError};
use meld_domain::{AdvisorFeedback, Plan, RunEvent, Session};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Session store rooted at a run directory (default `.meld/runs`).
pub struct FsSessionStore {
    root: PathBuf,
}

impl FsSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Generate a fresh run id: `YYYYMMDD-HHMMSS-<8 hex chars>`.
    pub fn next_run_id() -> String {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", timestamp, &uuid[..8])
    }

    pub fn run_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Redact, then write via temp file + atomic rename.
    fn atomic_write(path: &Path, content: &str) -> Result<(), StoreError> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::Io(std::io::Error::other("artifact path has no parent")))?;
        std::fs::create_dir_all(parent)?;

        let redacted = redact_secrets(content);
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(redacted.as_bytes())?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), "artifact committed");
        Ok(())
    }

    /// Task and context are immutable; write them only once.
    fn write_inputs(&self, session: &Session) -> Result<(), StoreError> {
        let dir = self.run_dir(&session.id);
        let task_path = dir.join("task.md");
        if !task_path.exists() {
            Self::atomic_write(&task_path, &session.task.description)?;
        }
        if let Some(context) = &session.task.context {
            let context_path = dir.join("context.md");
            if !context_path.exists() {
                Self::atomic_write(&context_path, context)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FsSessionStore {
    async fn checkpoint(&self, session: &Session) -> Result<(), StoreError> {
        self.write_inputs(session)?;
        let json = serde_json::to_string_pretty(session)?;
        Self::atomic_write(&self.run_dir(&session.id).join("session.json"), &json)
    }

    async fn write_plan(&self, session: &Session, plan: &Plan) -> Result<(), StoreError> {
        let path = self
            .run_dir(&session.id)
            .join(format!("plan.round{}.md", plan.round));
        Self::atomic_write(&path, &plan.content)
    }

    async fn write_feedback(
        &self,
        session: &Session,
        feedback: &AdvisorFeedback,
    ) -> Result<(), StoreError> {
        // Failed advisors have no artifact; their record lives in the
        // session snapshot's participation map.
        if feedback.raw.is_empty() {
            return Ok(());
        }
        let path = self.run_dir(&session.id).join(format!(
            "advisor.{}.round{}.md",
            feedback.advisor, feedback.round
        ));
        Self::atomic_write(&path, &feedback.raw)
    }

    async fn write_final(&self, session: &Session) -> Result<(), StoreError> {
        let Some(plan) = session.current_plan() else {
            return Ok(());
        };
        Self::atomic_write(&self.run_dir(&session.id).join("final-plan.md"), &plan.content)
    }

    async fn append_event(&self, session_id: &str, event: &RunEvent) -> Result<(), StoreError> {
        let dir = self.run_dir(session_id);
        std::fs::create_dir_all(&dir)?;

        // Stamp at write time; each line is independently parseable so a
        // torn final line cannot corrupt earlier history.
        let mut record = serde_json::to_value(event)?;
        if let serde_json::Value::Object(map) = &mut record {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(
                    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                ),
            );
        }
        let line = redact_secrets(&serde_json::to_string(&record)?);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("events.jsonl"))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        let path = self.run_dir(session_id).join("session.json");
        if !path.exists() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn list_runs(&self) -> Result<Vec<RunSummary>, StoreError> {
        let mut summaries = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Ok(summaries);
        };

        for entry in entries.flatten() {
            let path = entry.path().join("session.json");
            if !path.exists() {
                continue;
            }
            let Ok(json) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(session) = serde_json::from_str::<Session>(&json) else {
                continue;
            };
            summaries.push(RunSummary {
                id: session.id,
                status: session.status,
                rounds: session.current_round,
                started_at: session.started_at,
            });
        }

        summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meld_domain::{SessionConfig, SessionStatus, Task};

    fn config() -> SessionConfig {
        SessionConfig {
            max_rounds: 5,
            melder: "claude".to_string(),
            advisors: vec!["gemini".into()],
            advisor_timeout_secs: 600,
            melder_timeout_secs: 600,
            diff_threshold: 0.05,
            oscillation_window: 2,
        }
    }

    fn session(id: &str) -> Session {
        Session::new(id, Task::new("design a cache").with_context("PRD text"), config())
    }

    #[tokio::test]
    async fn test_checkpoint_then_load_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        let mut original = session("run-a");
        original.record_plan(Plan::new(0, "the initial plan")).unwrap();
        original
            .record_feedback(AdvisorFeedback::from_raw("gemini", 1, "## Risks\n- r1"))
            .unwrap();

        store.checkpoint(&original).await.unwrap();
        let loaded = store.load("run-a").await.unwrap();

        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.status, SessionStatus::InProgress);
        assert_eq!(loaded.plans, original.plans);
        assert_eq!(loaded.current_round, original.current_round);
        assert_eq!(loaded.feedback.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_artifacts_land_per_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let s = session("run-b");

        store.write_plan(&s, &Plan::new(0, "v0")).await.unwrap();
        store.write_plan(&s, &Plan::new(1, "v1")).await.unwrap();

        let v0 = std::fs::read_to_string(store.run_dir("run-b").join("plan.round0.md")).unwrap();
        let v1 = std::fs::read_to_string(store.run_dir("run-b").join("plan.round1.md")).unwrap();
        assert_eq!(v0, "v0");
        assert_eq!(v1, "v1");
    }

    #[tokio::test]
    async fn test_secrets_never_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let s = session("run-c");

        let plan = Plan::new(0, "auth with sk-abcdefghijklmnopqrstuvwxyz123456 here");
        store.write_plan(&s, &plan).await.unwrap();

        let written =
            std::fs::read_to_string(store.run_dir("run-c").join("plan.round0.md")).unwrap();
        assert!(!written.contains("sk-abcdefghijklmnop"));
        assert!(written.contains("[REDACTED_API_KEY]"));
    }

    #[tokio::test]
    async fn test_event_log_appends_stamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        store
            .append_event("run-d", &RunEvent::RoundCheckpointed { round: 1 })
            .await
            .unwrap();
        store
            .append_event("run-d", &RunEvent::RoundCheckpointed { round: 2 })
            .await
            .unwrap();

        let log =
            std::fs::read_to_string(store.run_dir("run-d").join("events.jsonl")).unwrap();
        let lines: Vec<&str> = log.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["type"], "round_checkpointed");
            assert!(value.get("timestamp").is_some());
        }
    }

    #[tokio::test]
    async fn test_failed_feedback_writes_no_artifact() {
        use meld_domain::{ErrorCategory, ProviderFailure};

        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let s = session("run-e");

        let failed = AdvisorFeedback::failed(
            "codex",
            1,
            ProviderFailure::new("codex", ErrorCategory::Timeout, "deadline"),
        );
        store.write_feedback(&s, &failed).await.unwrap();
        assert!(!store.run_dir("run-e").join("advisor.codex.round1.md").exists());
    }

    #[tokio::test]
    async fn test_load_missing_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        assert!(matches!(
            store.load("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());

        let mut older = session("run-old");
        older.started_at = Utc::now() - chrono::Duration::hours(2);
        store.checkpoint(&older).await.unwrap();
        store.checkpoint(&session("run-new")).await.unwrap();

        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, "run-new");
        assert_eq!(runs[1].id, "run-old");
    }

    #[test]
    fn test_run_id_shape() {
        let id = FsSessionStore::next_run_id();
        // YYYYMMDD-HHMMSS-xxxxxxxx
        assert_eq!(id.len(), 8 + 1 + 6 + 1 + 8);
        assert_eq!(id.matches('-').count(), 2);
    }
}
