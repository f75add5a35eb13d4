//! Typed observability events.
//!
//! Events are immutable, append-only records emitted by the orchestrator.
//! Consumers (console reporter, JSONL event log) must be idempotent —
//! delivery is at-least-once. Timestamps are stamped at the sink so the
//! orchestrator stays free of wall-clock concerns.

use crate::convergence::Decision;
use crate::provider::ErrorCategory;
use crate::session::{RunOutcome, RunPhase};
use serde::{Deserialize, Serialize};

/// Advisor lifecycle within a round, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorState {
    Waiting,
    Running,
    Retrying,
    Complete,
    Failed,
}

/// One event in the run's observable stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    SessionOpened {
        session_id: String,
        resumed: bool,
    },
    PhaseChanged {
        phase: RunPhase,
        round: u32,
    },
    PlanGenerated {
        round: u32,
        bytes: usize,
    },
    AdvisorStatus {
        advisor: String,
        state: AdvisorState,
    },
    FeedbackCollected {
        round: u32,
        succeeded: Vec<String>,
        failed: Vec<String>,
    },
    ConvergenceEvaluated {
        round: u32,
        diff_ratio: f64,
        open_items: u32,
        decision: Decision,
    },
    RoundCheckpointed {
        round: u32,
    },
    RunFinished {
        outcome: RunOutcome,
        rounds: u32,
    },
    SessionInterrupted {
        round: u32,
    },
    Error {
        message: String,
        category: Option<ErrorCategory>,
    },
}

impl RunEvent {
    /// Short tag used as the `type` discriminator in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::SessionOpened { .. } => "session_opened",
            RunEvent::PhaseChanged { .. } => "phase_changed",
            RunEvent::PlanGenerated { .. } => "plan_generated",
            RunEvent::AdvisorStatus { .. } => "advisor_status",
            RunEvent::FeedbackCollected { .. } => "feedback_collected",
            RunEvent::ConvergenceEvaluated { .. } => "convergence_evaluated",
            RunEvent::RoundCheckpointed { .. } => "round_checkpointed",
            RunEvent::RunFinished { .. } => "run_finished",
            RunEvent::SessionInterrupted { .. } => "session_interrupted",
            RunEvent::Error { .. } => "error",
        }
    }
}
