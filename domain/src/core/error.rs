//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("No advisors configured")]
    NoAdvisors,

    #[error("All advisors failed to respond")]
    AllAdvisorsFailed,

    #[error("Round invariant violated: {0}")]
    RoundInvariant(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
