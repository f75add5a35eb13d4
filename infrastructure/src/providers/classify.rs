//! stderr classification.
//!
//! Each provider carries its own regex [`PatternSet`]; anything the
//! provider-specific patterns miss falls through to a shared keyword
//! scan. Unmatched stderr classifies as a network error so the retry
//! policy gets a chance — a wrong fail-fast is worse than a wasted retry.

use meld_domain::{ErrorCategory, ProviderFailure};
use regex::RegexSet;

/// Compiled per-provider stderr patterns.
pub struct PatternSet {
    auth: RegexSet,
    rate_limit: RegexSet,
    network: RegexSet,
}

impl PatternSet {
    /// Compile a pattern set. Patterns are case-insensitive.
    ///
    /// Panics on invalid regex — pattern literals are compiled once at
    /// adapter construction, so a bad pattern is a programming error.
    pub fn new(auth: &[&str], rate_limit: &[&str], network: &[&str]) -> Self {
        let compile = |patterns: &[&str]| {
            RegexSet::new(patterns.iter().map(|p| format!("(?i){}", p)))
                .expect("invalid classifier pattern")
        };
        Self {
            auth: compile(auth),
            rate_limit: compile(rate_limit),
            network: compile(network),
        }
    }

    /// Classify stderr into a provider failure.
    pub fn classify(&self, provider: &str, stderr: &str) -> ProviderFailure {
        if self.auth.is_match(stderr) {
            return ProviderFailure::new(
                provider,
                ErrorCategory::AuthFailed,
                "authentication failed",
            );
        }
        if self.rate_limit.is_match(stderr) {
            return ProviderFailure::new(provider, ErrorCategory::RateLimited, "rate limited");
        }
        if self.network.is_match(stderr) {
            return ProviderFailure::new(provider, ErrorCategory::NetworkError, "network error");
        }
        fallback_classify(provider, stderr)
    }
}

/// Keyword fallback shared by every provider.
pub fn fallback_classify(provider: &str, stderr: &str) -> ProviderFailure {
    let lower = stderr.to_lowercase();

    if ["auth", "unauthorized", "api key", "logged in"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return ProviderFailure::new(provider, ErrorCategory::AuthFailed, "authentication failed");
    }
    if ["rate limit", "quota", "too many requests"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return ProviderFailure::new(provider, ErrorCategory::RateLimited, "rate limited");
    }
    if ["network", "connection", "timed out", "unreachable"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return ProviderFailure::new(provider, ErrorCategory::NetworkError, "network error");
    }

    // Truncate — stderr dumps can be enormous
    let mut message = stderr.trim().to_string();
    if message.len() > 500 {
        message.truncate(500);
    }
    if message.is_empty() {
        message = "provider exited with an error and empty stderr".to_string();
    }
    ProviderFailure::new(provider, ErrorCategory::NetworkError, message)
}
