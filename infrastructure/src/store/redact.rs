//! Secret redaction.
//!
//! Applied to every artifact immediately before it is written — plans,
//! feedback, metadata, and the event log alike. Redaction is a pre-write
//! transform: secret material never reaches disk verbatim, so there is
//! nothing to scrub after the fact.

use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                Regex::new(r"sk-[a-zA-Z0-9]{20,}").unwrap(),
                "[REDACTED_API_KEY]",
            ),
            (
                Regex::new(r#"(?i)api[_-]?key['"]?\s*[:=]\s*['"]?[a-zA-Z0-9_-]{20,}"#).unwrap(),
                "[REDACTED_API_KEY]",
            ),
            (
                Regex::new(r#"(?i)token['"]?\s*[:=]\s*['"]?[a-zA-Z0-9_-]{20,}"#).unwrap(),
                "[REDACTED_TOKEN]",
            ),
            (
                Regex::new(r#"(?i)password['"]?\s*[:=]\s*['"]?[^\s'"]{8,}"#).unwrap(),
                "[REDACTED_PASSWORD]",
            ),
        ]
    })
}

/// Replace recognized secret patterns in `content`.
pub fn redact_secrets(content: &str) -> String {
    let mut redacted = content.to_string();
    for (pattern, replacement) in patterns() {
        redacted = pattern.replace_all(&redacted, *replacement).into_owned();
    }
    redacted
}
