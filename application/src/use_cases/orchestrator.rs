//! Orchestrator — the round state machine.
//!
//! Drives Init → Planning → (Feedback ⇄ Synthesis)* → terminal. One
//! control task owns the [`Session`] and is the only thing that mutates
//! it; the pool and melder return values. Every phase transition commits
//! a checkpoint before the next phase starts, so resume can tell a
//! committed phase from one that was cut short and re-execute the latter.
//!
//! Cancellation is cooperative: the token fans out to every in-flight
//! subprocess via child tokens, adapters tear their children down within
//! a bounded grace window, and only then does the orchestrator persist
//! the interrupted state.

use crate::config::RunParams;
use crate::ports::event_sink::EventSink;
use crate::ports::session_store::{SessionStore, StoreError};
use crate::use_cases::advisor_pool::{AdvisorPool, PoolError};
use crate::use_cases::melder::{Melder, MelderError};
use meld_domain::{
    ConvergenceEngine, Decision, DomainError, ErrorCategory, Plan, PlanHistory, ProviderFailure,
    RunEvent, RunOutcome, RunPhase, Session, SessionStatus,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Top-level run failures, each mapping to one actionable condition.
#[derive(Error, Debug)]
pub enum OrchestrateError {
    #[error("Melder failed: {0}")]
    Melder(#[from] MelderError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OrchestrateError {
    /// Provider category behind this failure, when there is one.
    pub fn provider_category(&self) -> Option<ErrorCategory> {
        match self {
            OrchestrateError::Melder(MelderError::Provider(ProviderFailure {
                category, ..
            })) => Some(*category),
            _ => None,
        }
    }
}

/// Composes melder, pool, engine, store and sink into the run loop.
pub struct Orchestrator {
    melder: Melder,
    pool: AdvisorPool,
    engine: ConvergenceEngine,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        melder: Melder,
        pool: AdvisorPool,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn EventSink>,
        params: RunParams,
        cancel: CancellationToken,
    ) -> Self {
        let engine = ConvergenceEngine::new(params.convergence);
        Self {
            melder,
            pool,
            engine,
            store,
            sink,
            cancel,
        }
    }

    /// Run a fresh session to a terminal state.
    pub async fn run(&self, session: Session) -> Result<Session, OrchestrateError> {
        self.emit(
            &session.id,
            RunEvent::SessionOpened {
                session_id: session.id.clone(),
                resumed: false,
            },
        )
        .await;
        self.drive(session).await
    }

    /// Reopen a persisted session and continue from its last committed
    /// phase.
    pub async fn resume(&self, session_id: &str) -> Result<Session, OrchestrateError> {
        let mut session = self.store.load(session_id).await?;
        if !matches!(
            session.status,
            SessionStatus::InProgress | SessionStatus::Interrupted
        ) {
            return Err(StoreError::NotResumable(session_id.to_string(), session.status).into());
        }
        session.status = SessionStatus::InProgress;

        info!(
            session_id,
            round = session.current_round,
            phase = ?session.phase,
            "resuming session"
        );
        self.emit(
            session_id,
            RunEvent::SessionOpened {
                session_id: session_id.to_string(),
                resumed: true,
            },
        )
        .await;
        self.drive(session).await
    }

    async fn drive(&self, mut session: Session) -> Result<Session, OrchestrateError> {
        // PLANNING — only when no committed Plan(0) exists yet.
        if session.plans.is_empty() {
            self.transition(&mut session, RunPhase::Planning, 0).await?;

            let plan = match self
                .melder
                .generate_initial_plan(&session.task, &self.cancel)
                .await
            {
                Ok(plan) => plan,
                Err(_) if self.cancel.is_cancelled() => {
                    return self.interrupt(session).await;
                }
                Err(e) => return self.fail(session, e.into()).await,
            };

            session.record_plan(plan.clone())?;
            self.store.write_plan(&session, &plan).await?;
            self.checkpoint(&session).await?;
            self.emit(
                &session.id,
                RunEvent::PlanGenerated {
                    round: 0,
                    bytes: plan.content.len(),
                },
            )
            .await;
        }

        if self.cancel.is_cancelled() {
            return self.interrupt(session).await;
        }

        let mut history = PlanHistory::new(self.engine.params().oscillation_window);
        for plan in &session.plans {
            history.push(plan.clone());
        }

        // ROUND LOOP
        loop {
            let round = session.current_round + 1;
            if round > session.max_rounds() {
                session.complete(RunOutcome::RoundsExhausted);
                break;
            }
            if self.cancel.is_cancelled() {
                return self.interrupt(session).await;
            }

            // FEEDBACK — re-executed unless this round's collection was
            // fully committed (phase advanced past it).
            let feedback_committed = session.phase == RunPhase::Synthesis
                && !session.feedback_for_round(round).is_empty();
            if !feedback_committed {
                self.transition(&mut session, RunPhase::Feedback, round).await?;

                let current = session
                    .current_plan()
                    .expect("planning committed before feedback")
                    .clone();
                let results = match self
                    .pool
                    .collect(&session.task, &current, round, &self.cancel, &self.sink)
                    .await
                {
                    Ok(results) => results,
                    Err(_) if self.cancel.is_cancelled() => {
                        return self.interrupt(session).await;
                    }
                    Err(e @ PoolError::AllAdvisorsFailed) => {
                        return self.fail(session, e.into()).await;
                    }
                };

                if self.cancel.is_cancelled() {
                    return self.interrupt(session).await;
                }

                let mut succeeded = Vec::new();
                let mut failed = Vec::new();
                for (name, feedback) in results {
                    if feedback.is_usable() {
                        succeeded.push(name);
                    } else {
                        failed.push(name);
                    }
                    self.store.write_feedback(&session, &feedback).await?;
                    session.record_feedback(feedback)?;
                }

                self.emit(
                    &session.id,
                    RunEvent::FeedbackCollected {
                        round,
                        succeeded,
                        failed,
                    },
                )
                .await;

                // Committing the Synthesis phase marks feedback complete.
                self.transition(&mut session, RunPhase::Synthesis, round).await?;
            }

            // SYNTHESIS
            let current = session
                .current_plan()
                .expect("at least Plan(0) exists")
                .clone();
            let feedback = session.feedback_for_round(round);
            let synthesis = match self
                .melder
                .synthesize(&session.task, &current, &feedback, round, &self.cancel)
                .await
            {
                Ok(synthesis) => synthesis,
                Err(_) if self.cancel.is_cancelled() => {
                    return self.interrupt(session).await;
                }
                Err(e) => return self.fail(session, e.into()).await,
            };

            let new_plan = Plan::new(round, synthesis.plan.clone());
            history.push(new_plan.clone());

            let assessment = self.engine.evaluate(
                round,
                synthesis.signal.as_ref(),
                &synthesis.decision_log,
                &current,
                &new_plan,
                &history,
            );

            session.record_plan(new_plan.clone())?;
            self.store.write_plan(&session, &new_plan).await?;
            self.emit(
                &session.id,
                RunEvent::PlanGenerated {
                    round,
                    bytes: new_plan.content.len(),
                },
            )
            .await;

            let decision = assessment.decision.clone();
            self.emit(
                &session.id,
                RunEvent::ConvergenceEvaluated {
                    round,
                    diff_ratio: assessment.diff_ratio,
                    open_items: assessment.reported.open_items,
                    decision: decision.clone(),
                },
            )
            .await;
            session.record_assessment(assessment);

            self.checkpoint(&session).await?;
            self.emit(&session.id, RunEvent::RoundCheckpointed { round })
                .await;

            match decision {
                Decision::Converge => {
                    session.complete(RunOutcome::Converged);
                    break;
                }
                Decision::NeedsHuman { .. } => {
                    session.complete(RunOutcome::NeedsHuman);
                    break;
                }
                Decision::Continue => {
                    if round >= session.max_rounds() {
                        session.complete(RunOutcome::RoundsExhausted);
                        break;
                    }
                }
            }
        }

        self.store.write_final(&session).await?;
        self.checkpoint(&session).await?;
        let outcome = session.outcome.expect("terminal session has an outcome");
        info!(session_id = %session.id, ?outcome, rounds = session.current_round, "run finished");
        self.emit(
            &session.id,
            RunEvent::RunFinished {
                outcome,
                rounds: session.current_round,
            },
        )
        .await;

        Ok(session)
    }

    /// Commit a phase change before executing the phase.
    async fn transition(
        &self,
        session: &mut Session,
        phase: RunPhase,
        round: u32,
    ) -> Result<(), OrchestrateError> {
        session.set_phase(phase);
        self.checkpoint(session).await?;
        self.emit(&session.id, RunEvent::PhaseChanged { phase, round })
            .await;
        Ok(())
    }

    async fn checkpoint(&self, session: &Session) -> Result<(), OrchestrateError> {
        self.store.checkpoint(session).await?;
        Ok(())
    }

    /// Mark the session failed and persist best-effort; the original
    /// error propagates either way.
    async fn fail(
        &self,
        mut session: Session,
        error: OrchestrateError,
    ) -> Result<Session, OrchestrateError> {
        error!(session_id = %session.id, %error, "run failed");
        session.fail();
        if let Err(persist) = self.store.checkpoint(&session).await {
            warn!("could not persist failed state: {}", persist);
        }
        self.emit(
            &session.id,
            RunEvent::Error {
                message: error.to_string(),
                category: error.provider_category(),
            },
        )
        .await;
        Err(error)
    }

    /// Persist the session in resumable form after subprocess teardown.
    async fn interrupt(&self, mut session: Session) -> Result<Session, OrchestrateError> {
        info!(session_id = %session.id, round = session.current_round, "run interrupted");
        session.interrupt();
        self.store.checkpoint(&session).await?;
        self.emit(
            &session.id,
            RunEvent::SessionInterrupted {
                round: session.current_round,
            },
        )
        .await;
        Ok(session)
    }

    /// Deliver an event to the sink and the persistent event log.
    ///
    /// The event log is observability, not crash-safety state, so an
    /// append failure degrades to a warning instead of aborting the run.
    async fn emit(&self, session_id: &str, event: RunEvent) {
        self.sink.emit(&event);
        if let Err(e) = self.store.append_event(session_id, &event).await {
            warn!("event log append failed: {}", e);
        }
    }
}
