//! Session aggregate.
//!
//! One [`Session`] is the single run-wide mutable object, owned and
//! mutated exclusively by the orchestrator. Every other component is a
//! pure function over explicit inputs, so no locking is needed beyond the
//! store's own atomic-write discipline.
//!
//! The mutation methods enforce the round invariants: rounds strictly
//! increase from 0 with no gaps, feedback only lands after the plan it
//! reviews, and `current_round` never decreases.

use crate::convergence::{ConvergenceAssessment, Decision};
use crate::core::error::DomainError;
use crate::feedback::{AdvisorFeedback, FeedbackStatus};
use crate::plan::{Plan, Task};
use crate::provider::ErrorCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Failed,
    Interrupted,
}

/// Where in the round loop a run currently is. Persisted so resume can
/// tell a committed phase from one that was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Planning,
    Feedback,
    Synthesis,
    Done,
}

/// How a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Converged,
    NeedsHuman,
    /// max_rounds reached without convergence — exhausted, not converged.
    RoundsExhausted,
}

/// Immutable snapshot of the configuration a run started with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub max_rounds: u32,
    pub melder: String,
    pub advisors: Vec<String>,
    pub advisor_timeout_secs: u64,
    pub melder_timeout_secs: u64,
    pub diff_threshold: f64,
    pub oscillation_window: usize,
}

/// Per-advisor participation over the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParticipationRecord {
    /// Rounds in which this advisor's feedback was usable.
    pub rounds_ok: Vec<u32>,
    pub failures: u32,
    pub last_error: Option<ErrorCategory>,
}

/// The aggregate root for one refinement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub task: Task,
    pub status: SessionStatus,
    pub phase: RunPhase,
    pub current_round: u32,
    pub plans: Vec<Plan>,
    pub feedback: Vec<AdvisorFeedback>,
    pub assessments: Vec<ConvergenceAssessment>,
    pub participation: BTreeMap<String, ParticipationRecord>,
    pub config: SessionConfig,
    pub outcome: Option<RunOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, task: Task, config: SessionConfig) -> Self {
        Self {
            id: id.into(),
            task,
            status: SessionStatus::InProgress,
            phase: RunPhase::Init,
            current_round: 0,
            plans: Vec::new(),
            feedback: Vec::new(),
            assessments: Vec::new(),
            participation: BTreeMap::new(),
            config,
            outcome: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// The single current plan. Exactly one exists once planning finishes.
    pub fn current_plan(&self) -> Option<&Plan> {
        self.plans.last()
    }

    pub fn plan_for_round(&self, round: u32) -> Option<&Plan> {
        self.plans.iter().find(|p| p.round == round)
    }

    pub fn max_rounds(&self) -> u32 {
        self.config.max_rounds
    }

    /// Record a new plan. Rounds must be contiguous from 0.
    pub fn record_plan(&mut self, plan: Plan) -> Result<(), DomainError> {
        let expected = self.plans.last().map(|p| p.round + 1).unwrap_or(0);
        if plan.round != expected {
            return Err(DomainError::RoundInvariant(format!(
                "plan for round {} recorded, expected round {}",
                plan.round, expected
            )));
        }
        if plan.round > 0 && plan.round < self.current_round {
            return Err(DomainError::RoundInvariant(format!(
                "plan round {} behind current round {}",
                plan.round, self.current_round
            )));
        }
        self.current_round = plan.round;
        self.plans.push(plan);
        Ok(())
    }

    /// Record one advisor's feedback for a round. The plan that feedback
    /// reviews (round N-1) must already exist.
    pub fn record_feedback(&mut self, feedback: AdvisorFeedback) -> Result<(), DomainError> {
        if feedback.round == 0 {
            return Err(DomainError::RoundInvariant(
                "feedback cannot target round 0".to_string(),
            ));
        }
        if self.plan_for_round(feedback.round - 1).is_none() {
            return Err(DomainError::RoundInvariant(format!(
                "feedback for round {} before plan {} exists",
                feedback.round,
                feedback.round - 1
            )));
        }

        let record = self.participation.entry(feedback.advisor.clone()).or_default();
        match feedback.status {
            FeedbackStatus::Ok | FeedbackStatus::Unparseable => {
                record.rounds_ok.push(feedback.round);
            }
            FeedbackStatus::Failed => {
                record.failures += 1;
                record.last_error = feedback.error.as_ref().map(|e| e.category);
            }
        }

        self.feedback.push(feedback);
        Ok(())
    }

    pub fn record_assessment(&mut self, assessment: ConvergenceAssessment) {
        self.assessments.push(assessment);
    }

    pub fn feedback_for_round(&self, round: u32) -> Vec<&AdvisorFeedback> {
        self.feedback.iter().filter(|f| f.round == round).collect()
    }

    /// Advisors with at least one usable round.
    pub fn participants(&self) -> Vec<String> {
        self.participation
            .iter()
            .filter(|(_, record)| !record.rounds_ok.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    pub fn complete(&mut self, outcome: RunOutcome) {
        self.status = SessionStatus::Completed;
        self.phase = RunPhase::Done;
        self.outcome = Some(outcome);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = SessionStatus::Failed;
        self.phase = RunPhase::Done;
        self.completed_at = Some(Utc::now());
    }

    pub fn interrupt(&mut self) {
        self.status = SessionStatus::Interrupted;
        self.completed_at = None;
    }

    /// Whether the run ended because iteration stabilized.
    pub fn converged(&self) -> bool {
        matches!(self.outcome, Some(RunOutcome::Converged))
    }

    /// Latest decision, if any round was assessed.
    pub fn last_decision(&self) -> Option<&Decision> {
        self.assessments.last().map(|a| &a.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SessionConfig {
        SessionConfig {
            max_rounds: 5,
            melder: "claude".to_string(),
            advisors: vec!["claude".into(), "gemini".into(), "codex".into()],
            advisor_timeout_secs: 600,
            melder_timeout_secs: 600,
            diff_threshold: 0.05,
            oscillation_window: 2,
        }
    }

    fn test_session() -> Session {
        Session::new("run-1", Task::new("design a cache"), test_config())
    }

    #[test]
    fn test_plans_must_be_contiguous() {
        let mut session = test_session();
        session.record_plan(Plan::new(0, "draft")).unwrap();
        assert!(session.record_plan(Plan::new(2, "skip")).is_err());
        session.record_plan(Plan::new(1, "next")).unwrap();
        assert_eq!(session.current_round, 1);
    }

    #[test]
    fn test_first_plan_must_be_round_zero() {
        let mut session = test_session();
        assert!(session.record_plan(Plan::new(1, "wrong start")).is_err());
    }

    #[test]
    fn test_feedback_requires_reviewed_plan() {
        let mut session = test_session();
        let feedback = AdvisorFeedback::from_raw("gemini", 1, "## Risks\n- none");
        assert!(session.record_feedback(feedback.clone()).is_err());

        session.record_plan(Plan::new(0, "draft")).unwrap();
        session.record_feedback(feedback).unwrap();
        assert_eq!(session.feedback_for_round(1).len(), 1);
    }

    #[test]
    fn test_participation_tracks_failures() {
        use crate::provider::{ErrorCategory, ProviderFailure};

        let mut session = test_session();
        session.record_plan(Plan::new(0, "draft")).unwrap();
        session
            .record_feedback(AdvisorFeedback::from_raw("gemini", 1, "## Risks\n- x"))
            .unwrap();
        session
            .record_feedback(AdvisorFeedback::failed(
                "codex",
                1,
                ProviderFailure::new("codex", ErrorCategory::Timeout, "deadline"),
            ))
            .unwrap();

        assert_eq!(session.participants(), vec!["gemini".to_string()]);
        let codex = &session.participation["codex"];
        assert_eq!(codex.failures, 1);
        assert_eq!(codex.last_error, Some(ErrorCategory::Timeout));
    }

    #[test]
    fn test_complete_sets_outcome() {
        let mut session = test_session();
        session.complete(RunOutcome::RoundsExhausted);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(!session.converged());
        assert!(session.completed_at.is_some());
    }
}
