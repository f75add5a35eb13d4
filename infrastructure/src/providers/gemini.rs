//! Gemini CLI adapter.
//!
//! ```text
//! gemini -p "<prompt>" -m <model> --sandbox
//! ```
//!
//! `--sandbox` keeps the invocation read-only.

use crate::providers::adapter::CliAdapter;
use crate::providers::classify::PatternSet;

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

pub fn adapter(model: &str) -> CliAdapter {
    let model = model.to_string();
    CliAdapter::new(
        "gemini",
        "gemini",
        Box::new(move |prompt: &str| {
            vec![
                "-p".to_string(),
                prompt.to_string(),
                "-m".to_string(),
                model.clone(),
                "--sandbox".to_string(),
            ]
        }),
        patterns(),
    )
}

fn patterns() -> PatternSet {
    PatternSet::new(
        &[
            "not authenticated",
            r"invalid.*credentials",
            "unauthorized",
            "UNAUTHENTICATED",
            r"api.?key.*invalid",
            r"permission.?denied",
        ],
        &[
            r"rate.?limit",
            r"quota.?exceeded",
            r"resource.?exhausted",
            "429",
        ],
        &[
            r"connection.*refused",
            r"network.*error",
            "UNAVAILABLE",
            "could not resolve",
            r"deadline.?exceeded",
        ],
    )
}
