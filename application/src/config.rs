//! Run parameters — loop control for the orchestrator.
//!
//! These are application-layer knobs, not domain policy. The convergence
//! thresholds live in [`ConvergenceParams`] and are carried here so one
//! struct travels from config loading to the orchestrator.

use meld_domain::ConvergenceParams;
use std::time::Duration;

/// Static parameters controlling a refinement run.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Maximum refinement rounds before the run is flagged exhausted.
    pub max_rounds: u32,
    /// Per-advisor deadline for one invocation attempt.
    pub advisor_timeout: Duration,
    /// Deadline for melder calls (initial plan and synthesis).
    pub melder_timeout: Duration,
    /// Convergence decision thresholds.
    pub convergence: ConvergenceParams,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            advisor_timeout: Duration::from_secs(600),
            melder_timeout: Duration::from_secs(600),
            convergence: ConvergenceParams::default(),
        }
    }
}

impl RunParams {
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_advisor_timeout(mut self, timeout: Duration) -> Self {
        self.advisor_timeout = timeout;
        self
    }

    pub fn with_melder_timeout(mut self, timeout: Duration) -> Self {
        self.melder_timeout = timeout;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceParams) -> Self {
        self.convergence = convergence;
        self
    }
}
