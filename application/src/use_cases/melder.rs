//! Melder — plan generation and feedback synthesis.
//!
//! The melder wraps exactly one adapter and holds one call in flight at a
//! time. Its adapter failures are fatal to the run: advisors are
//! interchangeable, the melder is not.

use crate::ports::provider_adapter::{InvocationRequest, ProviderAdapter};
use crate::use_cases::retry::invoke_with_retry;
use meld_domain::{
    parse_synthesis_response, extract_plan, AdvisorFeedback, Plan, PromptTemplate,
    ProviderFailure, SynthesisResponse, Task,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Melder-level failures. All fatal — no advisor substitutes for the melder.
#[derive(Error, Debug)]
pub enum MelderError {
    #[error("Melder provider failed: {0}")]
    Provider(#[from] ProviderFailure),

    #[error("Melder returned an empty plan")]
    EmptyPlan,
}

/// The synthesizing agent.
pub struct Melder {
    adapter: Arc<dyn ProviderAdapter>,
    timeout: Duration,
}

impl Melder {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, timeout: Duration) -> Self {
        Self { adapter, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.adapter.name()
    }

    /// Produce Plan(0) from the task alone.
    pub async fn generate_initial_plan(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<Plan, MelderError> {
        let prompt = PromptTemplate::initial_plan(task);
        let request = InvocationRequest::new(prompt, self.timeout, cancel.child_token());

        let output = invoke_with_retry(self.adapter.as_ref(), request, &|_| {}).await?;
        let content = extract_plan(&output.text);
        if content.trim().is_empty() {
            return Err(MelderError::EmptyPlan);
        }

        info!(bytes = content.len(), "initial plan generated");
        Ok(Plan::new(0, content))
    }

    /// Fold one round of advisor feedback into a revised plan.
    ///
    /// Only usable feedback reaches the prompt; failed advisors are
    /// excluded here and surface solely in participation metadata.
    pub async fn synthesize(
        &self,
        task: &Task,
        current: &Plan,
        feedback: &[&AdvisorFeedback],
        round: u32,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResponse, MelderError> {
        let usable: Vec<&AdvisorFeedback> = feedback
            .iter()
            .copied()
            .filter(|f| f.is_usable())
            .collect();

        let prompt = PromptTemplate::synthesis(task, &current.content, &usable, round);
        let request = InvocationRequest::new(prompt, self.timeout, cancel.child_token());

        let output = invoke_with_retry(self.adapter.as_ref(), request, &|_| {}).await?;
        let response = parse_synthesis_response(&output.text);
        if response.plan.trim().is_empty() {
            return Err(MelderError::EmptyPlan);
        }

        info!(
            round,
            bytes = response.plan.len(),
            parsed_signal = response.signal.is_some(),
            "synthesis complete"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::MockAdapter;
    use meld_domain::{ErrorCategory, ReportedStatus};

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_plan_extracts_plan_section() {
        let adapter = MockAdapter::ok(
            "claude",
            "## Plan\n1. first step\n2. second step\n",
        );
        let melder = Melder::new(Arc::new(adapter), Duration::from_secs(60));

        let plan = melder
            .generate_initial_plan(&Task::new("do the thing"), &cancel())
            .await
            .unwrap();

        assert_eq!(plan.round, 0);
        assert!(plan.content.starts_with("1. first step"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_melder_failure_is_fatal() {
        let adapter = MockAdapter::failing("claude", ErrorCategory::AuthFailed);
        let melder = Melder::new(Arc::new(adapter), Duration::from_secs(60));

        let result = melder
            .generate_initial_plan(&Task::new("do the thing"), &cancel())
            .await;

        match result {
            Err(MelderError::Provider(failure)) => {
                assert_eq!(failure.category, ErrorCategory::AuthFailed)
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_parses_signal_and_excludes_failed_feedback() {
        let response = r#"## Decision Log
- ACCEPTED: tighten step 2 - concrete

## Updated Plan
1. first step
2. tightened second step

## Convergence Assessment
```json
{"STATUS": "CONVERGED", "CHANGES_MADE": 1, "OPEN_ITEMS": 0, "RATIONALE": "stable"}
```
"#;
        let adapter = MockAdapter::ok("claude", response);
        let melder = Melder::new(Arc::new(adapter), Duration::from_secs(60));

        let ok = AdvisorFeedback::from_raw("gemini", 1, "## Risks\n- step 2 vague");
        let failed = AdvisorFeedback::failed(
            "codex",
            1,
            ProviderFailure::new("codex", ErrorCategory::Timeout, "deadline"),
        );

        let result = melder
            .synthesize(
                &Task::new("task"),
                &Plan::new(0, "1. first step\n2. second step"),
                &[&ok, &failed],
                1,
                &cancel(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.signal.as_ref().unwrap().status,
            ReportedStatus::Converged
        );
        assert!(result.plan.contains("tightened"));
        assert_eq!(result.decision_log.accepted.len(), 1);
    }
}
