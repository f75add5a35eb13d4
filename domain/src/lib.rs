//! Domain layer for meld
//!
//! This crate contains the core business logic for iterative plan
//! refinement. It has no dependencies on infrastructure or presentation
//! concerns — everything here is a pure function over explicit inputs.
//!
//! # Core Concepts
//!
//! ## Melder
//!
//! The synthesizing agent. It drafts the initial plan and, each round,
//! folds advisor feedback into a revised plan together with a structured
//! convergence report.
//!
//! ## Advisors
//!
//! Independent reviewing agents. Each round every advisor reviews the
//! current plan and returns structured feedback. Advisors are equal peers;
//! none of them can replace the melder.
//!
//! ## Convergence
//!
//! Self-reported convergence is unreliable by construction, so the
//! [`ConvergenceEngine`] combines three signals in a fixed decision table:
//! the melder's own claim, an independent whitespace-insensitive text diff,
//! and an oscillation circuit-breaker over recent plan hashes.

pub mod convergence;
pub mod core;
pub mod event;
pub mod feedback;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod synthesis;

// Re-export commonly used types
pub use convergence::{ConvergenceAssessment, ConvergenceEngine, ConvergenceParams, Decision};
pub use core::error::DomainError;
pub use event::{AdvisorState, RunEvent};
pub use feedback::{AdvisorFeedback, FeedbackSections, FeedbackStatus};
pub use plan::{Plan, PlanHistory, Task};
pub use prompt::PromptTemplate;
pub use provider::{Backoff, ErrorCategory, ProviderFailure, RetryDirective};
pub use session::{
    ParticipationRecord, RunOutcome, RunPhase, Session, SessionConfig, SessionStatus,
};
pub use synthesis::{
    extract_plan, parse_synthesis_response, ConvergenceSignal, DecisionLog, ReportedStatus,
    SynthesisResponse,
};
