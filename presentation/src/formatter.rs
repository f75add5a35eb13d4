//! Final document formatting.
//!
//! Renders a terminal session into the deliverable markdown document or
//! a machine-readable JSON summary. Pure functions over the session —
//! the core never calls these.

use meld_domain::{Decision, RunOutcome, Session};

/// Render the completed session as a markdown document.
pub fn format_markdown(session: &Session) -> String {
    let mut out = String::new();

    out.push_str("# Refined Plan\n\n");
    if let Some(plan) = session.current_plan() {
        out.push_str(&plan.content);
        out.push_str("\n\n");
    }

    out.push_str("---\n\n## Run Summary\n\n");
    out.push_str(&format!("- Session: `{}`\n", session.id));
    out.push_str(&format!(
        "- Outcome: {}\n",
        match session.outcome {
            Some(RunOutcome::Converged) => "converged",
            Some(RunOutcome::NeedsHuman) => "needs human decision",
            Some(RunOutcome::RoundsExhausted) => "round budget exhausted (not converged)",
            None => "incomplete",
        }
    ));
    out.push_str(&format!("- Rounds completed: {}\n", session.current_round));

    let participants = session.participants();
    out.push_str(&format!(
        "- Advisors participated: {}\n",
        if participants.is_empty() {
            "none".to_string()
        } else {
            participants.join(", ")
        }
    ));

    if !session.assessments.is_empty() {
        out.push_str("\n### Convergence Trail\n\n");
        for assessment in &session.assessments {
            out.push_str(&format!(
                "- Round {}: diff {:.1}%, {} open items - {}\n",
                assessment.round,
                assessment.diff_ratio * 100.0,
                assessment.reported.open_items,
                assessment.rationale
            ));
        }
    }

    // When oscillation stopped the run, surface what the human has to decide.
    if let Some(Decision::NeedsHuman { variants, tradeoffs }) = session.last_decision() {
        out.push_str("\n## Competing Variants\n\n");
        out.push_str(
            "The plan oscillated between two versions. Pick one or merge them by hand.\n\n",
        );
        for (i, variant) in variants.iter().enumerate() {
            out.push_str(&format!("### Variant {}\n\n{}\n\n", i + 1, variant));
        }
        if !tradeoffs.is_empty() {
            out.push_str("### Unresolved Tradeoffs\n\n");
            for tradeoff in tradeoffs {
                out.push_str(&format!("- {}\n", tradeoff));
            }
        }
    }

    out
}

/// Render a machine-readable run summary.
pub fn format_json_summary(session: &Session) -> String {
    let summary = serde_json::json!({
        "session_id": session.id,
        "status": session.status,
        "outcome": session.outcome,
        "converged": session.converged(),
        "rounds_completed": session.current_round,
        "max_rounds": session.config.max_rounds,
        "advisors_participated": session.participants(),
        "started_at": session.started_at.to_rfc3339(),
        "completed_at": session.completed_at.map(|t| t.to_rfc3339()),
        "final_plan": session.current_plan().map(|p| &p.content),
    });
    serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meld_domain::{
        ConvergenceAssessment, ConvergenceSignal, Plan, RunOutcome, SessionConfig, Task,
    };

    fn completed_session() -> Session {
        let mut session = Session::new(
            "run-1",
            Task::new("design a cache"),
            SessionConfig {
                max_rounds: 5,
                melder: "claude".into(),
                advisors: vec!["gemini".into()],
                advisor_timeout_secs: 600,
                melder_timeout_secs: 600,
                diff_threshold: 0.05,
                oscillation_window: 2,
            },
        );
        session.record_plan(Plan::new(0, "the plan body")).unwrap();
        session.complete(RunOutcome::Converged);
        session
    }

    #[test]
    fn test_markdown_contains_plan_and_outcome() {
        let doc = format_markdown(&completed_session());
        assert!(doc.contains("the plan body"));
        assert!(doc.contains("Outcome: converged"));
        assert!(doc.contains("`run-1`"));
    }

    #[test]
    fn test_exhausted_flagged_as_unconverged() {
        let mut session = completed_session();
        session.outcome = Some(RunOutcome::RoundsExhausted);
        let doc = format_markdown(&session);
        assert!(doc.contains("not converged"));
    }

    #[test]
    fn test_needs_human_renders_variants() {
        let mut session = completed_session();
        session.record_assessment(ConvergenceAssessment {
            round: 3,
            reported: ConvergenceSignal::default(),
            diff_ratio: 0.4,
            decision: Decision::NeedsHuman {
                variants: vec!["variant A".into(), "variant B".into()],
                tradeoffs: vec!["caching vs freshness".into()],
            },
            rationale: "oscillation".into(),
        });
        session.outcome = Some(RunOutcome::NeedsHuman);

        let doc = format_markdown(&session);
        assert!(doc.contains("Variant 1"));
        assert!(doc.contains("variant B"));
        assert!(doc.contains("caching vs freshness"));
    }

    #[test]
    fn test_json_summary_is_valid() {
        let json = format_json_summary(&completed_session());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], "run-1");
        assert_eq!(value["converged"], true);
        assert_eq!(value["final_plan"], "the plan body");
    }
}
