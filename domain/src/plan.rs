//! Plan artifacts and plan history.
//!
//! A [`Plan`] is an immutable, versioned text artifact keyed by round
//! number. Round 0 is the melder's initial draft; every synthesis round
//! produces a new `Plan`, never a mutation of an existing one.
//! [`PlanHistory`] keeps the recent window of plans for the oscillation
//! circuit-breaker.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The immutable input a run refines a plan for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// What the plan should accomplish.
    pub description: String,
    /// Optional requirements/PRD context included in every prompt.
    pub context: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A versioned plan artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Round that produced this plan (0 = initial).
    pub round: u32,
    pub content: String,
}

impl Plan {
    pub fn new(round: u32, content: impl Into<String>) -> Self {
        Self {
            round,
            content: content.into(),
        }
    }

    /// Hex digest of the whitespace-normalized content.
    ///
    /// Normalization keeps the hash aligned with the diff metric: two plans
    /// that differ only in formatting hash identically.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for line in normalized_lines(&self.content) {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Collapse internal whitespace and drop blank lines so that formatting
/// churn does not register as plan change.
pub(crate) fn normalized_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Sliding window of recent plans for oscillation detection.
///
/// Holds at most `window + 1` plans: the current one and `window` earlier
/// rounds. The A→B→A pattern is detected by comparing the current plan's
/// content hash against the hash from exactly `window` rounds prior.
#[derive(Debug, Clone, Default)]
pub struct PlanHistory {
    recent: Vec<Plan>,
    window: usize,
}

impl PlanHistory {
    /// Create a history with the given oscillation window (rounds back to
    /// compare against; 2 detects A→B→A).
    pub fn new(window: usize) -> Self {
        Self {
            recent: Vec::new(),
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record a plan, evicting anything older than the window needs.
    pub fn push(&mut self, plan: Plan) {
        self.recent.push(plan);
        let cap = self.window + 1;
        if self.recent.len() > cap {
            let excess = self.recent.len() - cap;
            self.recent.drain(..excess);
        }
    }

    pub fn latest(&self) -> Option<&Plan> {
        self.recent.last()
    }

    /// The plan from exactly `window` rounds before the latest, if the
    /// history is deep enough.
    pub fn window_peer(&self) -> Option<&Plan> {
        if self.recent.len() < self.window + 1 {
            return None;
        }
        self.recent.get(self.recent.len() - self.window - 1)
    }

    /// True when the latest plan's content hash equals the hash from
    /// exactly `window` rounds prior.
    pub fn detects_oscillation(&self) -> bool {
        match (self.latest(), self.window_peer()) {
            (Some(current), Some(peer)) => current.content_hash() == peer.content_hash(),
            _ => false,
        }
    }
}
