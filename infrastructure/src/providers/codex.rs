//! OpenAI Codex CLI adapter.
//!
//! Prefers the `codex` binary, falling back to `chatgpt` when codex is
//! not installed. The fallback takes a different argument shape:
//!
//! ```text
//! codex exec "<prompt>" --sandbox read-only --model <model>
//! chatgpt "<prompt>" --model <model>
//! ```

use crate::providers::adapter::CliAdapter;
use crate::providers::classify::PatternSet;

pub const DEFAULT_MODEL: &str = "gpt-5.2";

pub fn adapter(model: &str) -> CliAdapter {
    // Binary preference resolved once at construction.
    let binary = if which::which("codex").is_ok() {
        "codex"
    } else {
        "chatgpt"
    };

    let model = model.to_string();
    let use_exec = binary == "codex";
    CliAdapter::new(
        "codex",
        binary,
        Box::new(move |prompt: &str| {
            if use_exec {
                vec![
                    "exec".to_string(),
                    prompt.to_string(),
                    "--sandbox".to_string(),
                    "read-only".to_string(),
                    "--model".to_string(),
                    model.clone(),
                ]
            } else {
                vec![
                    prompt.to_string(),
                    "--model".to_string(),
                    model.clone(),
                ]
            }
        }),
        patterns(),
    )
}

fn patterns() -> PatternSet {
    PatternSet::new(
        &[
            r"invalid.*api.?key",
            "unauthorized",
            r"authentication.*failed",
            "OPENAI_API_KEY.*not set",
            "401",
        ],
        &[
            r"rate.?limit",
            "too many requests",
            "429",
            r"quota.*exceeded",
            r"insufficient.*quota",
        ],
        &[
            r"connection.*refused",
            r"network.*error",
            "ECONNREFUSED",
            "could not resolve",
        ],
    )
}
