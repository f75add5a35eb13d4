//! Advisor feedback and its section parser.
//!
//! Raw advisor output is kept verbatim; parsing into sections is best
//! effort. An advisor whose output has no recognizable structure is still a
//! participant — its feedback is flagged [`FeedbackStatus::Unparseable`] and
//! the raw text flows into synthesis unchanged.

use crate::provider::ProviderFailure;
use serde::{Deserialize, Serialize};

/// Outcome of one advisor invocation within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    /// Invocation succeeded and sections were recognized.
    Ok,
    /// Invocation succeeded but no structure was found; raw text kept.
    Unparseable,
    /// Invocation failed after retries; excluded from synthesis.
    Failed,
}

/// Structured sections extracted from advisor output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSections {
    pub summary: String,
    pub risks: Vec<String>,
    pub improvements: Vec<String>,
    pub missing_requirements: Vec<String>,
    pub questions: Vec<String>,
}

impl FeedbackSections {
    /// True when nothing at all was recognized.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.risks.is_empty()
            && self.improvements.is_empty()
            && self.missing_requirements.is_empty()
            && self.questions.is_empty()
    }
}

/// Feedback from one advisor for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorFeedback {
    pub advisor: String,
    pub round: u32,
    /// Verbatim output (empty when the invocation failed).
    pub raw: String,
    pub sections: Option<FeedbackSections>,
    pub status: FeedbackStatus,
    pub error: Option<ProviderFailure>,
    /// Wall-clock seconds the invocation took, retries included.
    pub elapsed_secs: f64,
}

impl AdvisorFeedback {
    /// Build feedback from successful raw output, parsing sections.
    pub fn from_raw(advisor: impl Into<String>, round: u32, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let sections = parse_sections(&raw);
        let status = if sections.is_some() {
            FeedbackStatus::Ok
        } else {
            FeedbackStatus::Unparseable
        };
        Self {
            advisor: advisor.into(),
            round,
            raw,
            sections,
            status,
            error: None,
            elapsed_secs: 0.0,
        }
    }

    /// Build a failure record for an advisor that never produced output.
    pub fn failed(advisor: impl Into<String>, round: u32, error: ProviderFailure) -> Self {
        Self {
            advisor: advisor.into(),
            round,
            raw: String::new(),
            sections: None,
            status: FeedbackStatus::Failed,
            error: Some(error),
            elapsed_secs: 0.0,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = elapsed_secs;
        self
    }

    /// Whether this feedback should flow into synthesis.
    pub fn is_usable(&self) -> bool {
        self.status != FeedbackStatus::Failed
    }
}

/// Parse markdown-ish advisor output into sections.
///
/// Recognizes headings (`#`/`##`/`###` or `**Bold**` lines) whose text
/// contains a known keyword, and collects list items under each. Returns
/// `None` when no heading matched anything.
pub fn parse_sections(raw: &str) -> Option<FeedbackSections> {
    #[derive(Clone, Copy, PartialEq)]
    enum Bucket {
        None,
        Summary,
        Risks,
        Improvements,
        Missing,
        Questions,
    }

    fn classify(heading: &str) -> Bucket {
        let lower = heading.to_lowercase();
        if lower.contains("summary") || lower.contains("assessment") || lower.contains("overview") {
            Bucket::Summary
        } else if lower.contains("risk") || lower.contains("concern") || lower.contains("issue") {
            Bucket::Risks
        } else if lower.contains("improvement") || lower.contains("suggestion") {
            Bucket::Improvements
        } else if lower.contains("missing") || lower.contains("addition") || lower.contains("gap") {
            Bucket::Missing
        } else if lower.contains("question") {
            Bucket::Questions
        } else {
            Bucket::None
        }
    }

    fn heading_text(line: &str) -> Option<&str> {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix('#') {
            return Some(rest.trim_start_matches('#').trim());
        }
        // Bold-line headings like "**Risks:**"
        if trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with(|c| c == '*' || c == ':') {
            return Some(trimmed.trim_matches(|c| c == '*' || c == ':').trim());
        }
        None
    }

    fn strip_bullet(line: &str) -> Option<&str> {
        let trimmed = line.trim();
        for prefix in ["- ", "* ", "+ "] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                return Some(rest.trim());
            }
        }
        // Numbered items: "1. text"
        let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            if let Some(rest) = trimmed[digits..].strip_prefix(". ") {
                return Some(rest.trim());
            }
        }
        None
    }

    let mut sections = FeedbackSections::default();
    let mut bucket = Bucket::None;
    let mut matched_any = false;

    for line in raw.lines() {
        if let Some(heading) = heading_text(line) {
            bucket = classify(heading);
            if bucket != Bucket::None {
                matched_any = true;
            }
            continue;
        }

        match bucket {
            Bucket::None => {}
            Bucket::Summary => {
                let text = line.trim();
                if !text.is_empty() {
                    if !sections.summary.is_empty() {
                        sections.summary.push(' ');
                    }
                    sections.summary.push_str(text);
                }
            }
            _ => {
                if let Some(item) = strip_bullet(line) {
                    if item.is_empty() {
                        continue;
                    }
                    let target = match bucket {
                        Bucket::Risks => &mut sections.risks,
                        Bucket::Improvements => &mut sections.improvements,
                        Bucket::Missing => &mut sections.missing_requirements,
                        Bucket::Questions => &mut sections.questions,
                        _ => unreachable!(),
                    };
                    target.push(item.to_string());
                }
            }
        }
    }

    if matched_any && !sections.is_empty() {
        Some(sections)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ErrorCategory;

    const STRUCTURED: &str = "\
## Summary
Solid plan overall, two gaps.

## Risks
- No rollback story
- Migration window unbounded

## Improvements
1. Add a canary stage
2. Pin the schema version

## Missing Requirements
- Audit logging

## Questions
- Who owns the feature flag?
";

    #[test]
    fn test_parse_structured_feedback() {
        let sections = parse_sections(STRUCTURED).expect("should parse");
        assert_eq!(sections.summary, "Solid plan overall, two gaps.");
        assert_eq!(sections.risks.len(), 2);
        assert_eq!(sections.improvements.len(), 2);
        assert_eq!(sections.missing_requirements, vec!["Audit logging"]);
        assert_eq!(sections.questions.len(), 1);
    }

    #[test]
    fn test_parse_bold_headings() {
        let raw = "**Concerns:**\n- Race condition in step 3\n";
        let sections = parse_sections(raw).expect("should parse");
        assert_eq!(sections.risks, vec!["Race condition in step 3"]);
    }

    #[test]
    fn test_unstructured_text_yields_none() {
        assert!(parse_sections("just some prose with no headings").is_none());
    }

    #[test]
    fn test_from_raw_flags_unparseable() {
        let feedback = AdvisorFeedback::from_raw("gemini", 1, "free-form prose");
        assert_eq!(feedback.status, FeedbackStatus::Unparseable);
        assert_eq!(feedback.raw, "free-form prose");
        assert!(feedback.is_usable());
    }

    #[test]
    fn test_failed_feedback_excluded_from_synthesis() {
        let feedback = AdvisorFeedback::failed(
            "codex",
            2,
            ProviderFailure::new("codex", ErrorCategory::AuthFailed, "401"),
        );
        assert_eq!(feedback.status, FeedbackStatus::Failed);
        assert!(!feedback.is_usable());
        assert_eq!(
            feedback.error.as_ref().unwrap().category,
            ErrorCategory::AuthFailed
        );
    }
}
