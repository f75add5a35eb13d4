//! Claude CLI adapter.
//!
//! Invokes `claude` in prompt mode with hardcoded flags for consistent
//! behavior: read-only plan mode, plain text output.
//!
//! ```text
//! claude -p "<prompt>" --permission-mode plan --model <model> --output-format text
//! ```

use crate::providers::adapter::CliAdapter;
use crate::providers::classify::PatternSet;

pub const DEFAULT_MODEL: &str = "opus";

pub fn adapter(model: &str) -> CliAdapter {
    let model = model.to_string();
    CliAdapter::new(
        "claude",
        "claude",
        Box::new(move |prompt: &str| {
            vec![
                "-p".to_string(),
                prompt.to_string(),
                "--permission-mode".to_string(),
                "plan".to_string(),
                "--model".to_string(),
                model.clone(),
                "--output-format".to_string(),
                "text".to_string(),
            ]
        }),
        patterns(),
    )
}

fn patterns() -> PatternSet {
    PatternSet::new(
        &[
            "not logged in",
            "authentication required",
            "unauthorized",
            r"invalid.*api.?key",
            r"please run.*auth",
        ],
        &[r"rate.?limit", r"quota.?exceeded", "too many requests", "429"],
        &[
            r"connection.?refused",
            r"network.?unreachable",
            r"dns.*failed",
            "could not resolve",
            "ECONNREFUSED",
        ],
    )
}
