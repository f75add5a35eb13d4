//! Advisor pool — concurrent fan-out/fan-in feedback collection.
//!
//! Every configured advisor is invoked concurrently with an identical
//! prompt, each under its own deadline so one slow advisor cannot starve
//! the others. The pool is a join barrier, never a race-to-first: it
//! resolves only when every member has succeeded, failed classified, or
//! been forcibly timed out. Completion order is irrelevant — results
//! merge commutatively into a map keyed by advisor name.

use crate::ports::event_sink::EventSink;
use crate::ports::provider_adapter::{InvocationRequest, ProviderAdapter};
use crate::use_cases::retry::invoke_with_retry;
use meld_domain::{
    AdvisorFeedback, FeedbackStatus, Plan, PromptTemplate, RunEvent, Task,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pool-level failures.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Not a single advisor produced usable output this round.
    #[error("All advisors failed to respond")]
    AllAdvisorsFailed,
}

/// Fan-out invoker over the configured advisors.
pub struct AdvisorPool {
    advisors: Vec<Arc<dyn ProviderAdapter>>,
    timeout: Duration,
}

impl AdvisorPool {
    pub fn new(advisors: Vec<Arc<dyn ProviderAdapter>>, timeout: Duration) -> Self {
        Self { advisors, timeout }
    }

    pub fn advisor_names(&self) -> Vec<String> {
        self.advisors.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    /// Collect one round of feedback on `plan`.
    ///
    /// Returns advisor→feedback for every configured advisor, including
    /// failed ones (category recorded, excluded from synthesis). Errors
    /// only when nothing succeeded.
    pub async fn collect(
        &self,
        task: &Task,
        plan: &Plan,
        round: u32,
        cancel: &CancellationToken,
        sink: &Arc<dyn EventSink>,
    ) -> Result<BTreeMap<String, AdvisorFeedback>, PoolError> {
        let prompt = PromptTemplate::advisor_review(task, &plan.content);

        let mut join_set = JoinSet::new();
        for advisor in &self.advisors {
            let advisor = Arc::clone(advisor);
            let sink = Arc::clone(sink);
            let request = InvocationRequest::new(prompt.clone(), self.timeout, cancel.child_token());

            join_set.spawn(async move {
                let name = advisor.name().to_string();
                let started = tokio::time::Instant::now();

                let on_state = {
                    let sink = Arc::clone(&sink);
                    let name = name.clone();
                    move |state| {
                        sink.emit(&RunEvent::AdvisorStatus {
                            advisor: name.clone(),
                            state,
                        });
                    }
                };

                let result = invoke_with_retry(advisor.as_ref(), request, &on_state).await;
                let elapsed = started.elapsed().as_secs_f64();

                let feedback = match result {
                    Ok(output) => {
                        info!(advisor = %name, elapsed, "advisor feedback received");
                        AdvisorFeedback::from_raw(&name, round, output.text)
                            .with_elapsed(elapsed)
                    }
                    Err(failure) => {
                        warn!(advisor = %name, category = %failure.category, "advisor failed");
                        AdvisorFeedback::failed(&name, round, failure).with_elapsed(elapsed)
                    }
                };
                (name, feedback)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, feedback)) => {
                    results.insert(name, feedback);
                }
                Err(e) => {
                    // A panicked advisor task is unrecoverable for that
                    // member only; the barrier still holds for the rest.
                    warn!("advisor task join error: {}", e);
                }
            }
        }

        if results.values().all(|f| f.status == FeedbackStatus::Failed) {
            return Err(PoolError::AllAdvisorsFailed);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::event_sink::NullSink;
    use crate::use_cases::test_support::MockAdapter;
    use meld_domain::ErrorCategory;

    const FEEDBACK: &str = "## Summary\nlooks fine\n\n## Risks\n- none noted\n";

    fn sink() -> Arc<dyn EventSink> {
        Arc::new(NullSink)
    }

    fn pool_of(adapters: Vec<MockAdapter>, timeout: Duration) -> AdvisorPool {
        AdvisorPool::new(
            adapters
                .into_iter()
                .map(|a| Arc::new(a) as Arc<dyn ProviderAdapter>)
                .collect(),
            timeout,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_yields_partial_results() {
        let deadline = Duration::from_secs(60);
        let pool = pool_of(
            vec![
                MockAdapter::ok("claude", FEEDBACK).with_latency(Duration::from_secs(1)),
                MockAdapter::ok("gemini", FEEDBACK).with_latency(Duration::from_secs(2)),
                MockAdapter::failing("codex", ErrorCategory::Timeout)
                    .with_latency(deadline),
            ],
            deadline,
        );

        let started = tokio::time::Instant::now();
        let results = pool
            .collect(
                &Task::new("task"),
                &Plan::new(0, "plan"),
                1,
                &CancellationToken::new(),
                &sink(),
            )
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 3);
        assert!(results["claude"].is_usable());
        assert!(results["gemini"].is_usable());

        let failed = &results["codex"];
        assert_eq!(failed.status, FeedbackStatus::Failed);
        assert_eq!(
            failed.error.as_ref().unwrap().category,
            ErrorCategory::Timeout
        );

        // Timeout policy is one retry without backoff: the envelope is the
        // deadline plus one retry window.
        assert!(elapsed <= deadline * 2 + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_is_an_error_not_empty_success() {
        let pool = pool_of(
            vec![
                MockAdapter::failing("claude", ErrorCategory::AuthFailed),
                MockAdapter::failing("gemini", ErrorCategory::CliNotFound),
            ],
            Duration::from_secs(60),
        );

        let result = pool
            .collect(
                &Task::new("task"),
                &Plan::new(0, "plan"),
                1,
                &CancellationToken::new(),
                &sink(),
            )
            .await;

        assert!(matches!(result, Err(PoolError::AllAdvisorsFailed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_counts_as_participation() {
        let pool = pool_of(
            vec![
                MockAdapter::ok("claude", "free prose, no sections"),
                MockAdapter::failing("gemini", ErrorCategory::NetworkError),
            ],
            Duration::from_secs(60),
        );

        let results = pool
            .collect(
                &Task::new("task"),
                &Plan::new(0, "plan"),
                1,
                &CancellationToken::new(),
                &sink(),
            )
            .await
            .unwrap();

        assert_eq!(results["claude"].status, FeedbackStatus::Unparseable);
        assert_eq!(results["claude"].raw, "free prose, no sections");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_advisor_does_not_starve_fast_ones() {
        let pool = pool_of(
            vec![
                MockAdapter::ok("fast", FEEDBACK).with_latency(Duration::from_secs(1)),
                MockAdapter::ok("slow", FEEDBACK).with_latency(Duration::from_secs(30)),
            ],
            Duration::from_secs(60),
        );

        let started = tokio::time::Instant::now();
        let results = pool
            .collect(
                &Task::new("task"),
                &Plan::new(0, "plan"),
                1,
                &CancellationToken::new(),
                &sink(),
            )
            .await
            .unwrap();

        // Join barrier: total time is the slowest member, not the sum.
        assert!(started.elapsed() < Duration::from_secs(32));
        assert_eq!(results.len(), 2);
    }
}
