//! Shared test doubles for the use-case tests.

use crate::ports::provider_adapter::{
    InvocationOutput, InvocationRequest, ProbeReport, ProviderAdapter,
};
use crate::ports::session_store::{RunSummary, SessionStore, StoreError};
use async_trait::async_trait;
use meld_domain::{AdvisorFeedback, ErrorCategory, Plan, ProviderFailure, RunEvent, Session};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockOutcome {
    Ok(String),
    Fail(ErrorCategory),
}

/// Scriptable provider adapter.
///
/// Consumes scripted outcomes first, then repeats the default outcome.
/// An optional artificial latency runs under the request's cancel token,
/// so paused-clock tests can measure deadline envelopes.
pub struct MockAdapter {
    name: String,
    scripted: Mutex<VecDeque<MockOutcome>>,
    default: MockOutcome,
    latency: Option<Duration>,
    count: AtomicU32,
}

impl MockAdapter {
    pub fn ok(name: &str, text: &str) -> Self {
        Self::with_default(name, MockOutcome::Ok(text.to_string()))
    }

    pub fn failing(name: &str, category: ErrorCategory) -> Self {
        Self::with_default(name, MockOutcome::Fail(category))
    }

    pub fn failing_then_ok(
        name: &str,
        category: ErrorCategory,
        failures: usize,
        text: &str,
    ) -> Self {
        let adapter = Self::with_default(name, MockOutcome::Ok(text.to_string()));
        let mut scripted = adapter.scripted.lock().unwrap();
        for _ in 0..failures {
            scripted.push_back(MockOutcome::Fail(category));
        }
        drop(scripted);
        adapter
    }

    /// Responses returned in order; the last one repeats afterwards.
    pub fn scripted(name: &str, responses: Vec<String>) -> Self {
        let default = MockOutcome::Ok(responses.last().cloned().unwrap_or_default());
        let adapter = Self::with_default(name, default);
        let mut scripted = adapter.scripted.lock().unwrap();
        for response in responses {
            scripted.push_back(MockOutcome::Ok(response));
        }
        drop(scripted);
        adapter
    }

    fn with_default(name: &str, default: MockOutcome) -> Self {
        Self {
            name: name.to_string(),
            scripted: Mutex::new(VecDeque::new()),
            default,
            latency: None,
            count: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn invocations(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<InvocationOutput, ProviderFailure> {
        self.count.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {}
                _ = request.cancel.cancelled() => {
                    return Err(ProviderFailure::new(
                        &self.name,
                        ErrorCategory::Timeout,
                        "cancelled",
                    ));
                }
            }
        }

        let outcome = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match outcome {
            MockOutcome::Ok(text) => Ok(InvocationOutput {
                text,
                elapsed: self.latency.unwrap_or(Duration::from_millis(5)),
            }),
            MockOutcome::Fail(category) => Err(ProviderFailure::new(
                &self.name,
                category,
                "scripted failure",
            )),
        }
    }

    async fn probe(&self) -> ProbeReport {
        ProbeReport {
            provider: self.name.clone(),
            cli_found: true,
            auth_ok: true,
            detail: String::new(),
        }
    }
}

/// In-memory session store capturing every commit.
#[derive(Default)]
pub struct TestStore {
    pub sessions: Mutex<HashMap<String, Session>>,
    pub plans: Mutex<Vec<(String, Plan)>>,
    pub feedback: Mutex<Vec<(String, AdvisorFeedback)>>,
    pub events: Mutex<Vec<RunEvent>>,
    pub finals: Mutex<Vec<String>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpointed(&self, id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for TestStore {
    async fn checkpoint(&self, session: &Session) -> Result<(), StoreError> {
        self.check_failure()?;
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn write_plan(&self, session: &Session, plan: &Plan) -> Result<(), StoreError> {
        self.check_failure()?;
        self.plans
            .lock()
            .unwrap()
            .push((session.id.clone(), plan.clone()));
        Ok(())
    }

    async fn write_feedback(
        &self,
        session: &Session,
        feedback: &AdvisorFeedback,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        self.feedback
            .lock()
            .unwrap()
            .push((session.id.clone(), feedback.clone()));
        Ok(())
    }

    async fn write_final(&self, session: &Session) -> Result<(), StoreError> {
        self.check_failure()?;
        self.finals.lock().unwrap().push(session.id.clone());
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
        Ok(self
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
            .collect())
    }
}
