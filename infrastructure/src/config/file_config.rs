//! File configuration schema.
//!
//! Everything here deserializes from `meld.toml` (or the global config)
//! with full defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [run]
//! max_rounds = 5
//! advisor_timeout_secs = 600
//!
//! [providers]
//! melder = "claude"
//! advisors = ["claude", "gemini", "codex"]
//!
//! [providers.gemini]
//! model = "gemini-2.5-pro"
//!
//! [convergence]
//! diff_threshold = 0.05
//! oscillation_window = 2
//! ```

use meld_application::RunParams;
use meld_domain::{ConvergenceParams, SessionConfig, Task};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers;

/// Root of the file configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub run: RunConfig,
    pub providers: ProvidersConfig,
    pub convergence: ConvergenceConfig,
}

/// Round-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_rounds: u32,
    pub advisor_timeout_secs: u64,
    pub melder_timeout_secs: u64,
    pub run_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            advisor_timeout_secs: 600,
            melder_timeout_secs: 600,
            run_dir: ".meld/runs".to_string(),
        }
    }
}

/// Which providers play which role, and per-provider model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider that drafts and synthesizes the plan.
    pub melder: String,
    /// Providers reviewing each round. Order is cosmetic.
    pub advisors: Vec<String>,
    pub claude: ProviderSettings,
    pub gemini: ProviderSettings,
    pub codex: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            melder: "claude".to_string(),
            advisors: vec![
                "claude".to_string(),
                "gemini".to_string(),
                "codex".to_string(),
            ],
            claude: ProviderSettings {
                model: providers::claude::DEFAULT_MODEL.to_string(),
            },
            gemini: ProviderSettings {
                model: providers::gemini::DEFAULT_MODEL.to_string(),
            },
            codex: ProviderSettings {
                model: providers::codex::DEFAULT_MODEL.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderSettings {
    pub model: String,
}

/// Convergence policy constants, exposed rather than hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub diff_threshold: f64,
    pub oscillation_window: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        let params = ConvergenceParams::default();
        Self {
            diff_threshold: params.diff_threshold,
            oscillation_window: params.oscillation_window,
        }
    }
}

impl FileConfig {
    pub fn convergence_params(&self) -> ConvergenceParams {
        ConvergenceParams {
            diff_threshold: self.convergence.diff_threshold,
            oscillation_window: self.convergence.oscillation_window,
        }
    }

    pub fn run_params(&self) -> RunParams {
        RunParams::default()
            .with_max_rounds(self.run.max_rounds)
            .with_advisor_timeout(Duration::from_secs(self.run.advisor_timeout_secs))
            .with_melder_timeout(Duration::from_secs(self.run.melder_timeout_secs))
            .with_convergence(self.convergence_params())
    }

    /// The immutable config snapshot a new session records.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_rounds: self.run.max_rounds,
            melder: self.providers.melder.clone(),
            advisors: self.providers.advisors.clone(),
            advisor_timeout_secs: self.run.advisor_timeout_secs,
            melder_timeout_secs: self.run.melder_timeout_secs,
            diff_threshold: self.convergence.diff_threshold,
            oscillation_window: self.convergence.oscillation_window,
        }
    }

    /// Build a fresh session from this configuration.
    pub fn new_session(&self, id: impl Into<String>, task: Task) -> meld_domain::Session {
        meld_domain::Session::new(id, task, self.session_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileConfig::default();
        assert_eq!(config.run.max_rounds, 5);
        assert_eq!(config.providers.melder, "claude");
        assert_eq!(config.providers.advisors.len(), 3);
        assert_eq!(config.convergence.diff_threshold, 0.05);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            [run]
            max_rounds = 7

            [providers.gemini]
            model = "gemini-3.0-flash"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.max_rounds, 7);
        assert_eq!(config.run.advisor_timeout_secs, 600);
        assert_eq!(config.providers.gemini.model, "gemini-3.0-flash");
        assert_eq!(config.providers.melder, "claude");
    }

    #[test]
    fn test_run_params_conversion() {
        let config = FileConfig::default();
        let params = config.run_params();
        assert_eq!(params.max_rounds, 5);
        assert_eq!(params.advisor_timeout, Duration::from_secs(600));
        assert_eq!(params.convergence.oscillation_window, 2);
    }
}
