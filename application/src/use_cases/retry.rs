//! Retry executor.
//!
//! Wraps one adapter invocation in the category-driven retry policy from
//! the domain. The pool and the melder both go through this function, so
//! retry behavior is uniform across every external call in a run.

use crate::ports::provider_adapter::{InvocationOutput, InvocationRequest, ProviderAdapter};
use meld_domain::{AdvisorState, ProviderFailure, RetryDirective};
use tracing::{debug, warn};

/// Invoke an adapter, retrying per the policy for the observed category.
///
/// `on_state` fires on each lifecycle change (running / retrying /
/// complete / failed) so callers can forward advisor status events.
pub async fn invoke_with_retry(
    adapter: &dyn ProviderAdapter,
    request: InvocationRequest,
    on_state: &(dyn Fn(AdvisorState) + Send + Sync),
) -> Result<InvocationOutput, ProviderFailure> {
    on_state(AdvisorState::Running);

    let mut last_failure = match adapter.invoke(request.clone()).await {
        Ok(output) => {
            on_state(AdvisorState::Complete);
            return Ok(output);
        }
        Err(failure) => failure,
    };

    let directive = RetryDirective::for_category(last_failure.category);
    for attempt in 1..=directive.max_retries {
        if request.cancel.is_cancelled() {
            break;
        }

        let delay = directive.delay_before(attempt);
        debug!(
            provider = adapter.name(),
            category = %last_failure.category,
            attempt,
            delay_secs = delay.as_secs_f64(),
            "retrying provider invocation"
        );
        on_state(AdvisorState::Retrying);

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = request.cancel.cancelled() => break,
            }
        }

        match adapter.invoke(request.clone()).await {
            Ok(output) => {
                on_state(AdvisorState::Complete);
                return Ok(output);
            }
            Err(failure) => {
                // A different category mid-retry does not extend the
                // budget; the original directive stands.
                last_failure = failure;
            }
        }
    }

    warn!(
        provider = adapter.name(),
        category = %last_failure.category,
        "provider failed after retries"
    );
    on_state(AdvisorState::Failed);
    Err(last_failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::MockAdapter;
    use meld_domain::ErrorCategory;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn request() -> InvocationRequest {
        InvocationRequest::new(
            "prompt",
            Duration::from_secs(10),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retried_exactly_once() {
        let adapter = MockAdapter::failing("slow", ErrorCategory::Timeout);
        let result = invoke_with_retry(&adapter, request(), &|_| {}).await;

        assert_eq!(result.unwrap_err().category, ErrorCategory::Timeout);
        assert_eq!(adapter.invocations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retried_three_times() {
        let adapter = MockAdapter::failing("busy", ErrorCategory::RateLimited);
        let result = invoke_with_retry(&adapter, request(), &|_| {}).await;

        assert!(result.is_err());
        assert_eq!(adapter.invocations(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_fails_fast() {
        let adapter = MockAdapter::failing("locked", ErrorCategory::AuthFailed);
        let result = invoke_with_retry(&adapter, request(), &|_| {}).await;

        assert!(result.is_err());
        assert_eq!(adapter.invocations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_transient_failure() {
        let adapter = MockAdapter::failing_then_ok("flaky", ErrorCategory::NetworkError, 1, "ok");
        let result = invoke_with_retry(&adapter, request(), &|_| {}).await;

        assert_eq!(result.unwrap().text, "ok");
        assert_eq!(adapter.invocations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_states_reported_in_order() {
        use std::sync::Mutex;
        let states = Mutex::new(Vec::new());
        let adapter = MockAdapter::failing_then_ok("flaky", ErrorCategory::Timeout, 1, "ok");

        invoke_with_retry(&adapter, request(), &|state| {
            states.lock().unwrap().push(state);
        })
        .await
        .unwrap();

        assert_eq!(
            *states.lock().unwrap(),
            vec![
                AdvisorState::Running,
                AdvisorState::Retrying,
                AdvisorState::Complete
            ]
        );
    }
}
