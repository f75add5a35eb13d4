//! Melder response parsing.
//!
//! A synthesis response carries up to three parts: an updated plan, a
//! Decision Log, and a convergence block. The fenced `json` code-block
//! form of the convergence block is authoritative; a plain-text
//! `STATUS: CONVERGED` marker is accepted as fallback. When neither parses,
//! [`ReportedStatus::Continuing`] — the conservative default.
//!
//! The Decision Log is stored verbatim and has no effect on control flow;
//! it only surfaces in the final document and in the oscillation report.

use serde::{Deserialize, Serialize};

/// The melder's self-reported refinement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedStatus {
    #[default]
    Continuing,
    Converged,
}

/// Parsed convergence block from a synthesis response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConvergenceSignal {
    pub status: ReportedStatus,
    pub changes_made: u32,
    pub open_items: u32,
    pub deferred_items: u32,
    pub rationale: String,
}

/// Accepted / rejected / deferred items, stored verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecisionLog {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub deferred: Vec<String>,
    /// The full Decision Log section as written.
    pub raw: String,
}

impl DecisionLog {
    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Unresolved tradeoffs for the oscillation report: everything the
    /// melder explicitly rejected or deferred.
    pub fn unresolved(&self) -> Vec<String> {
        self.rejected
            .iter()
            .chain(self.deferred.iter())
            .cloned()
            .collect()
    }
}

/// Everything extracted from one synthesis response.
#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    /// The revised plan text.
    pub plan: String,
    /// `None` when no convergence block parsed (treated as Continuing).
    pub signal: Option<ConvergenceSignal>,
    pub decision_log: DecisionLog,
    /// The untouched response, persisted for audit.
    pub raw: String,
}

/// Parse a raw melder response into its parts.
pub fn parse_synthesis_response(raw: &str) -> SynthesisResponse {
    SynthesisResponse {
        plan: extract_plan(raw),
        signal: extract_signal(raw),
        decision_log: extract_decision_log(raw),
        raw: raw.to_string(),
    }
}

/// Extract the plan body. Falls back to the whole response (minus any
/// convergence fence) when no plan heading is present.
pub fn extract_plan(raw: &str) -> String {
    for marker in ["updated plan", "revised plan", "plan"] {
        if let Some(section) = extract_section(raw, marker) {
            if !section.trim().is_empty() {
                return section.trim().to_string();
            }
        }
    }
    strip_fenced_json(raw).trim().to_string()
}

/// Extract the Decision Log section and classify its entries.
pub fn extract_decision_log(raw: &str) -> DecisionLog {
    let Some(section) = extract_section(raw, "decision log") else {
        return DecisionLog::default();
    };

    let mut log = DecisionLog {
        raw: section.trim().to_string(),
        ..DecisionLog::default()
    };

    for line in section.lines() {
        let item = line.trim().trim_start_matches(['-', '*']).trim();
        let upper = item.to_uppercase();
        let entry = |keyword: &str| {
            upper
                .starts_with(keyword)
                .then(|| item[keyword.len()..].trim_start_matches(':').trim().to_string())
        };
        if let Some(rest) = entry("ACCEPTED") {
            log.accepted.push(rest);
        } else if let Some(rest) = entry("REJECTED") {
            log.rejected.push(rest);
        } else if let Some(rest) = entry("DEFERRED") {
            log.deferred.push(rest);
        }
    }

    log
}

/// Extract the convergence signal: fenced JSON first, text marker fallback.
pub fn extract_signal(raw: &str) -> Option<ConvergenceSignal> {
    if let Some(signal) = extract_fenced_signal(raw) {
        return Some(signal);
    }

    // Plain-text fallback markers
    let upper = raw.to_uppercase();
    if upper.contains("STATUS: CONVERGED") {
        return Some(ConvergenceSignal {
            status: ReportedStatus::Converged,
            ..ConvergenceSignal::default()
        });
    }
    if upper.contains("STATUS: CONTINUING") {
        return Some(ConvergenceSignal::default());
    }

    None
}

fn extract_fenced_signal(raw: &str) -> Option<ConvergenceSignal> {
    let (_, body, _) = find_fenced_json(raw)?;
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    let object = value.as_object()?;

    // Keys are conventionally SCREAMING_SNAKE but accept lowercase too.
    let get = |key: &str| {
        object
            .get(key)
            .or_else(|| object.get(key.to_lowercase().as_str()))
    };

    let status = match get("STATUS").and_then(|v| v.as_str()) {
        Some(s) if s.eq_ignore_ascii_case("CONVERGED") => ReportedStatus::Converged,
        Some(_) => ReportedStatus::Continuing,
        // A fence without STATUS is not a convergence block
        None => return None,
    };

    let count = |key: &str| get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    Some(ConvergenceSignal {
        status,
        changes_made: count("CHANGES_MADE"),
        open_items: count("OPEN_ITEMS"),
        deferred_items: count("DEFERRED_ITEMS"),
        rationale: get("RATIONALE")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// Locate a ```json fence. Returns (start of fence, body, end of fence).
fn find_fenced_json(raw: &str) -> Option<(usize, &str, usize)> {
    let open = raw.find("```json")?;
    let body_start = open + "```json".len();
    let close_rel = raw[body_start..].find("```")?;
    let body = &raw[body_start..body_start + close_rel];
    let end = body_start + close_rel + 3;
    Some((open, body, end))
}

fn strip_fenced_json(raw: &str) -> String {
    match find_fenced_json(raw) {
        Some((start, _, end)) => {
            let mut out = String::with_capacity(raw.len());
            out.push_str(&raw[..start]);
            out.push_str(&raw[end..]);
            out
        }
        None => raw.to_string(),
    }
}

/// Pull the body of a markdown section whose heading contains `marker`
/// (case-insensitive), up to the next heading of the same-or-higher level.
fn extract_section(raw: &str, marker: &str) -> Option<String> {
    let mut body = String::new();
    let mut capturing = false;
    let mut capture_level = 0usize;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|&c| c == '#').count();
        if level > 0 {
            let heading = trimmed[level..].trim().to_lowercase();
            if capturing && level <= capture_level {
                break;
            }
            if !capturing && heading.starts_with(marker) {
                capturing = true;
                capture_level = level;
                continue;
            }
        }
        if capturing {
            body.push_str(line);
            body.push('\n');
        }
    }

    capturing.then_some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"## Decision Log
- ACCEPTED: add canary stage - low cost, catches regressions
- REJECTED: rewrite in Go - out of scope
- DEFERRED: multi-region failover - needs capacity data

## Updated Plan
1. Ship behind a flag
2. Canary to 5% of traffic

## Convergence Assessment
```json
{
    "STATUS": "CONTINUING",
    "CHANGES_MADE": 3,
    "OPEN_ITEMS": 2,
    "DEFERRED_ITEMS": 1,
    "RATIONALE": "capacity question unresolved"
}
```
"#;

    #[test]
    fn test_full_response_parses() {
        let parsed = parse_synthesis_response(RESPONSE);
        assert!(parsed.plan.starts_with("1. Ship behind a flag"));
        assert!(parsed.plan.contains("Canary"));
        assert!(!parsed.plan.contains("Decision Log"));

        let signal = parsed.signal.expect("signal should parse");
        assert_eq!(signal.status, ReportedStatus::Continuing);
        assert_eq!(signal.changes_made, 3);
        assert_eq!(signal.open_items, 2);
        assert_eq!(signal.deferred_items, 1);

        assert_eq!(parsed.decision_log.accepted.len(), 1);
        assert_eq!(parsed.decision_log.rejected.len(), 1);
        assert_eq!(parsed.decision_log.deferred.len(), 1);
    }

    #[test]
    fn test_plain_text_status_fallback() {
        let signal = extract_signal("revised plan here\n\nSTATUS: CONVERGED\n").unwrap();
        assert_eq!(signal.status, ReportedStatus::Converged);
        assert_eq!(signal.open_items, 0);
    }

    #[test]
    fn test_no_signal_returns_none() {
        assert!(extract_signal("plan text with no markers at all").is_none());
    }

    #[test]
    fn test_malformed_fence_falls_back_to_text_marker() {
        let raw = "```json\n{not valid json\n```\nSTATUS: CONTINUING";
        let signal = extract_signal(raw).unwrap();
        assert_eq!(signal.status, ReportedStatus::Continuing);
    }

    #[test]
    fn test_plan_falls_back_to_whole_output() {
        let raw = "Here is everything rewritten from scratch.";
        assert_eq!(extract_plan(raw), raw);
    }

    #[test]
    fn test_unresolved_pulls_rejected_and_deferred() {
        let log = extract_decision_log(RESPONSE);
        let unresolved = log.unresolved();
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved[0].contains("rewrite in Go"));
        assert!(unresolved[1].contains("multi-region failover"));
    }

    #[test]
    fn test_decision_log_kept_verbatim() {
        let log = extract_decision_log(RESPONSE);
        assert!(log.raw.contains("ACCEPTED: add canary stage"));
    }
}
