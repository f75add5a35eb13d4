//! Provider failure classification and retry policy.
//!
//! Every external tool invocation either succeeds or yields a
//! [`ProviderFailure`] with a definite [`ErrorCategory`]. The retry policy
//! is a pure function of that category — the advisor pool and the melder
//! consult the same table, so a timeout is retried identically no matter
//! which component hit it.
//!
//! | Category | Retries | Backoff |
//! |----------|---------|---------|
//! | `Timeout` | 1 | none |
//! | `RateLimited` | 3 | exponential |
//! | `NetworkError` | 3 | linear |
//! | `CliNotFound` / `AuthFailed` / `ParseError` | 0 | fail fast |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Categorized failure modes for provider invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The provider CLI is not installed or not on PATH.
    CliNotFound,
    /// The CLI rejected the invocation for credential reasons.
    AuthFailed,
    /// The invocation exceeded its deadline.
    Timeout,
    /// The upstream service throttled the request.
    RateLimited,
    /// Transport-level failure between the CLI and its service.
    NetworkError,
    /// The CLI produced output that could not be interpreted.
    ParseError,
}

impl ErrorCategory {
    /// Whether the retry policy allows another attempt for this category.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::RateLimited | ErrorCategory::NetworkError
        )
    }

    /// One actionable hint per terminal condition, shown to the user
    /// instead of a raw error dump.
    pub fn user_hint(&self) -> &'static str {
        match self {
            ErrorCategory::CliNotFound => {
                "provider CLI not found — install it and make sure it is on PATH"
            }
            ErrorCategory::AuthFailed => {
                "authentication failed — re-run the provider's login/auth command"
            }
            ErrorCategory::Timeout => "the provider timed out — raise --timeout or retry later",
            ErrorCategory::RateLimited => "rate limited — wait a moment and retry",
            ErrorCategory::NetworkError => "network error — check connectivity and retry",
            ErrorCategory::ParseError => "the provider returned unusable output",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::CliNotFound => "cli_not_found",
            ErrorCategory::AuthFailed => "auth_failed",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::ParseError => "parse_error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from a provider adapter.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{provider}: {message} ({category})")]
pub struct ProviderFailure {
    /// Provider name (e.g. "claude", "gemini").
    pub provider: String,
    /// Failure category driving the retry policy.
    pub category: ErrorCategory,
    /// Human-readable detail, typically derived from stderr.
    pub message: String,
}

impl ProviderFailure {
    pub fn new(
        provider: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            category,
            message: message.into(),
        }
    }

    pub fn timeout(provider: impl Into<String>, deadline: Duration) -> Self {
        Self::new(
            provider,
            ErrorCategory::Timeout,
            format!("timed out after {}s", deadline.as_secs()),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// `base * attempt` between attempts.
    Linear(Duration),
    /// `base * 2^(attempt-1)` between attempts.
    Exponential(Duration),
}

/// Retry behavior for one error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDirective {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryDirective {
    /// The fixed policy table. Pure function of category.
    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Timeout => Self {
                max_retries: 1,
                backoff: Backoff::None,
            },
            ErrorCategory::RateLimited => Self {
                max_retries: 3,
                backoff: Backoff::Exponential(Duration::from_secs(1)),
            },
            ErrorCategory::NetworkError => Self {
                max_retries: 3,
                backoff: Backoff::Linear(Duration::from_secs(3)),
            },
            ErrorCategory::CliNotFound | ErrorCategory::AuthFailed | ErrorCategory::ParseError => {
                Self {
                    max_retries: 0,
                    backoff: Backoff::None,
                }
            }
        }
    }

    /// Delay to sleep before retry `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Linear(base) => base * attempt,
            Backoff::Exponential(base) => base * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::RateLimited.is_retryable());
        assert!(ErrorCategory::NetworkError.is_retryable());
        assert!(!ErrorCategory::CliNotFound.is_retryable());
        assert!(!ErrorCategory::AuthFailed.is_retryable());
        assert!(!ErrorCategory::ParseError.is_retryable());
    }

    #[test]
    fn test_timeout_retries_once_without_backoff() {
        let directive = RetryDirective::for_category(ErrorCategory::Timeout);
        assert_eq!(directive.max_retries, 1);
        assert_eq!(directive.delay_before(1), Duration::ZERO);
    }

    #[test]
    fn test_rate_limited_backs_off_exponentially() {
        let directive = RetryDirective::for_category(ErrorCategory::RateLimited);
        assert_eq!(directive.max_retries, 3);
        assert_eq!(directive.delay_before(1), Duration::from_secs(1));
        assert_eq!(directive.delay_before(2), Duration::from_secs(2));
        assert_eq!(directive.delay_before(3), Duration::from_secs(4));
    }

    #[test]
    fn test_network_error_backs_off_linearly() {
        let directive = RetryDirective::for_category(ErrorCategory::NetworkError);
        assert_eq!(directive.max_retries, 3);
        assert_eq!(directive.delay_before(1), Duration::from_secs(3));
        assert_eq!(directive.delay_before(2), Duration::from_secs(6));
        assert_eq!(directive.delay_before(3), Duration::from_secs(9));
    }

    #[test]
    fn test_fatal_categories_never_retry() {
        for category in [
            ErrorCategory::CliNotFound,
            ErrorCategory::AuthFailed,
            ErrorCategory::ParseError,
        ] {
            assert_eq!(RetryDirective::for_category(category).max_retries, 0);
        }
    }

    #[test]
    fn test_failure_display_includes_category() {
        let failure = ProviderFailure::new("claude", ErrorCategory::AuthFailed, "not logged in");
        assert_eq!(
            failure.to_string(),
            "claude: not logged in (auth_failed)"
        );
    }
}
