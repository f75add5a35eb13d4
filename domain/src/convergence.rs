//! Convergence decision procedure.
//!
//! The engine is a pure function over (round number, reported signal, the
//! two most recent plans, plan history). Signals combine in a fixed order:
//!
//! 1. Oscillation guard — current plan hash equals the hash from exactly
//!    `oscillation_window` rounds prior → `NeedsHuman`, unconditionally.
//! 2. Round 1 never converges; one full feedback cycle is the minimum.
//! 3. `open_items > 0` → `Continue`, overriding the reported status.
//! 4. Reported `Converged` with `diff_ratio` under the threshold → `Converge`.
//! 5. Everything else → `Continue` (overclaim, self-reported continuing,
//!    or parse failure).
//!
//! The diff threshold and oscillation window are policy constants with no
//! stated justification upstream, so both live in [`ConvergenceParams`]
//! rather than in the code.

use crate::plan::{normalized_lines, Plan, PlanHistory};
use crate::synthesis::{ConvergenceSignal, DecisionLog, ReportedStatus};
use serde::{Deserialize, Serialize};

/// Tunable policy constants for the decision procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceParams {
    /// Maximum diff_ratio at which a reported convergence is trusted.
    pub diff_threshold: f64,
    /// Rounds back the oscillation guard compares against (2 = A→B→A).
    pub oscillation_window: usize,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            diff_threshold: 0.05,
            oscillation_window: 2,
        }
    }
}

/// Final per-round decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Converge,
    /// Plan content is cycling; a human has to break the tie.
    NeedsHuman {
        /// The two competing plan variants (current, then its older twin).
        variants: Vec<String>,
        /// Unresolved tradeoffs drawn from the Decision Log.
        tradeoffs: Vec<String>,
    },
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Continue)
    }
}

/// The per-round convergence record kept in the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceAssessment {
    pub round: u32,
    /// The melder's reported signal (defaulted when nothing parsed).
    pub reported: ConvergenceSignal,
    /// 1 − whitespace-insensitive similarity between Plan(N-1) and Plan(N).
    pub diff_ratio: f64,
    pub decision: Decision,
    pub rationale: String,
}

/// Pure decision procedure over explicit inputs.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceEngine {
    params: ConvergenceParams,
}

impl ConvergenceEngine {
    pub fn new(params: ConvergenceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConvergenceParams {
        &self.params
    }

    /// Evaluate round `round` (N ≥ 1). `history` must already contain the
    /// current plan as its latest entry.
    pub fn evaluate(
        &self,
        round: u32,
        signal: Option<&ConvergenceSignal>,
        decision_log: &DecisionLog,
        previous: &Plan,
        current: &Plan,
        history: &PlanHistory,
    ) -> ConvergenceAssessment {
        let diff_ratio = diff_ratio(&previous.content, &current.content);
        let reported = signal.cloned().unwrap_or_default();

        // Oscillation guard runs first and cannot be overridden.
        if history.detects_oscillation() {
            // The run alternates between the current plan and the one it
            // just replaced; those are the two competing variants.
            let variants = vec![current.content.clone(), previous.content.clone()];
            return ConvergenceAssessment {
                round,
                reported,
                diff_ratio,
                decision: Decision::NeedsHuman {
                    variants,
                    tradeoffs: decision_log.unresolved(),
                },
                rationale: format!(
                    "plan content repeats the version from {} rounds ago",
                    history.window()
                ),
            };
        }

        if round <= 1 {
            return ConvergenceAssessment {
                round,
                reported,
                diff_ratio,
                decision: Decision::Continue,
                rationale: "first round never converges".to_string(),
            };
        }

        if reported.open_items > 0 {
            return ConvergenceAssessment {
                round,
                diff_ratio,
                decision: Decision::Continue,
                rationale: format!("{} open items remain", reported.open_items),
                reported,
            };
        }

        if signal.is_none() {
            return ConvergenceAssessment {
                round,
                reported,
                diff_ratio,
                decision: Decision::Continue,
                rationale: "no convergence block parsed; assuming continuing".to_string(),
            };
        }

        if reported.status == ReportedStatus::Converged {
            if diff_ratio < self.params.diff_threshold {
                return ConvergenceAssessment {
                    round,
                    reported,
                    diff_ratio,
                    decision: Decision::Converge,
                    rationale: format!(
                        "reported converged and diff_ratio {:.3} under threshold {:.3}",
                        diff_ratio, self.params.diff_threshold
                    ),
                };
            }
            return ConvergenceAssessment {
                round,
                reported,
                diff_ratio,
                decision: Decision::Continue,
                rationale: format!(
                    "convergence claimed but diff_ratio {:.3} exceeds threshold",
                    diff_ratio
                ),
            };
        }

        ConvergenceAssessment {
            round,
            reported,
            diff_ratio,
            decision: Decision::Continue,
            rationale: "melder reports continuing".to_string(),
        }
    }
}

/// 1 − normalized similarity between two texts, in [0, 1].
///
/// Similarity is `2·LCS / (a + b)` over whitespace-normalized, non-blank
/// lines — the classic sequence-matcher ratio. Identical inputs give 0,
/// disjoint inputs give 1; the measure is symmetric.
pub fn diff_ratio(old: &str, new: &str) -> f64 {
    let a = normalized_lines(old);
    let b = normalized_lines(new);

    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }

    let lcs = lcs_len(&a, &b);
    1.0 - (2.0 * lcs as f64) / ((a.len() + b.len()) as f64)
}

/// Longest common subsequence length over lines, O(a·b) time, O(b) space.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];

    for line_a in a {
        for (j, line_b) in b.iter().enumerate() {
            row[j + 1] = if line_a == line_b {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converged_signal(open_items: u32) -> ConvergenceSignal {
        ConvergenceSignal {
            status: ReportedStatus::Converged,
            changes_made: 0,
            open_items,
            deferred_items: 0,
            rationale: String::new(),
        }
    }

    fn history_of(plans: &[&Plan]) -> PlanHistory {
        let mut history = PlanHistory::new(2);
        for plan in plans {
            history.push((*plan).clone());
        }
        history
    }

    #[test]
    fn test_diff_ratio_identity_is_zero() {
        let text = "a plan\nwith steps\nand detail";
        assert_eq!(diff_ratio(text, text), 0.0);
    }

    #[test]
    fn test_diff_ratio_symmetric() {
        let a = "alpha\nbeta\ngamma";
        let b = "alpha\ndelta\ngamma\nextra";
        assert!((diff_ratio(a, b) - diff_ratio(b, a)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_diff_ratio_ignores_whitespace() {
        let a = "step  one\n\nstep two";
        let b = "step one\nstep two\n";
        assert_eq!(diff_ratio(a, b), 0.0);
    }

    #[test]
    fn test_diff_ratio_disjoint_is_one() {
        assert_eq!(diff_ratio("only a", "entirely b"), 1.0);
    }

    #[test]
    fn test_round_one_never_converges() {
        let engine = ConvergenceEngine::default();
        let p0 = Plan::new(0, "the plan");
        let p1 = Plan::new(1, "the plan");
        let history = history_of(&[&p1]);

        let assessment = engine.evaluate(
            1,
            Some(&converged_signal(0)),
            &DecisionLog::default(),
            &p0,
            &p1,
            &history,
        );
        assert_eq!(assessment.decision, Decision::Continue);
    }

    #[test]
    fn test_open_items_block_convergence() {
        let engine = ConvergenceEngine::default();
        let p1 = Plan::new(1, "the plan");
        let p2 = Plan::new(2, "the plan");
        let history = history_of(&[&p1, &p2]);

        let assessment = engine.evaluate(
            2,
            Some(&converged_signal(3)),
            &DecisionLog::default(),
            &p1,
            &p2,
            &history,
        );
        assert_eq!(assessment.decision, Decision::Continue);
        assert!(assessment.rationale.contains("3 open items"));
    }

    #[test]
    fn test_whitespace_only_change_converges() {
        let engine = ConvergenceEngine::default();
        let p2 = Plan::new(2, "1. build\n2. test\n3. ship");
        let p3 = Plan::new(3, "1.  build\n\n2. test\n3. ship\n");
        let mut history = PlanHistory::new(2);
        history.push(Plan::new(1, "draft"));
        history.push(p2.clone());
        history.push(p3.clone());

        let assessment = engine.evaluate(
            3,
            Some(&converged_signal(0)),
            &DecisionLog::default(),
            &p2,
            &p3,
            &history,
        );
        assert_eq!(assessment.decision, Decision::Converge);
        assert_eq!(assessment.diff_ratio, 0.0);
    }

    #[test]
    fn test_overclaim_detected() {
        let engine = ConvergenceEngine::default();
        let p1 = Plan::new(1, "alpha\nbeta\ngamma\ndelta");
        let p2 = Plan::new(2, "alpha\ncompletely different\nrewritten\ncontent");
        let history = history_of(&[&p1, &p2]);

        let assessment = engine.evaluate(
            2,
            Some(&converged_signal(0)),
            &DecisionLog::default(),
            &p1,
            &p2,
            &history,
        );
        assert_eq!(assessment.decision, Decision::Continue);
        assert!(assessment.rationale.contains("claimed"));
    }

    #[test]
    fn test_missing_signal_continues() {
        let engine = ConvergenceEngine::default();
        let p1 = Plan::new(1, "same");
        let p2 = Plan::new(2, "same");
        let history = history_of(&[&p1, &p2]);

        let assessment =
            engine.evaluate(2, None, &DecisionLog::default(), &p1, &p2, &history);
        assert_eq!(assessment.decision, Decision::Continue);
    }

    #[test]
    fn test_oscillation_forces_needs_human() {
        let engine = ConvergenceEngine::default();
        let p1 = Plan::new(1, "variant A");
        let p2 = Plan::new(2, "variant B");
        let p3 = Plan::new(3, "variant A");
        let history = history_of(&[&p1, &p2, &p3]);

        let log = DecisionLog {
            rejected: vec!["keep variant B ordering".to_string()],
            ..DecisionLog::default()
        };

        // Reported converged with zero open items must not mask oscillation.
        let assessment = engine.evaluate(
            3,
            Some(&converged_signal(0)),
            &log,
            &p2,
            &p3,
            &history,
        );
        match assessment.decision {
            Decision::NeedsHuman {
                ref variants,
                ref tradeoffs,
            } => {
                assert_eq!(variants.len(), 2);
                assert_eq!(variants[0], "variant A");
                assert_eq!(variants[1], "variant B");
                assert_eq!(tradeoffs, &vec!["keep variant B ordering".to_string()]);
            }
            ref other => panic!("expected NeedsHuman, got {:?}", other),
        }
    }
}
