//! Provider adapters and the registry.
//!
//! Adding a provider is one module plus one `build_adapter` arm. Nothing
//! outside this module knows which concrete providers exist — the
//! orchestrator sees only `dyn ProviderAdapter`.

pub mod adapter;
pub mod claude;
pub mod classify;
pub mod codex;
pub mod gemini;
pub mod process;

pub use adapter::CliAdapter;

use crate::config::file_config::ProvidersConfig;
use meld_application::ProviderAdapter;
use std::sync::Arc;

/// Names this build knows how to construct.
pub fn registry_names() -> &'static [&'static str] {
    &["claude", "gemini", "codex"]
}

/// Build one adapter by registry name, with the configured model.
pub fn build_adapter(name: &str, config: &ProvidersConfig) -> Option<Arc<dyn ProviderAdapter>> {
    match name {
        "claude" => Some(Arc::new(claude::adapter(&config.claude.model))),
        "gemini" => Some(Arc::new(gemini::adapter(&config.gemini.model))),
        "codex" => Some(Arc::new(codex::adapter(&config.codex.model))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_every_known_name() {
        let config = ProvidersConfig::default();
        for name in registry_names() {
            let adapter = build_adapter(name, &config).expect("known provider");
            assert_eq!(adapter.name(), *name);
        }
    }

    #[test]
    fn test_unknown_provider_is_none() {
        assert!(build_adapter("copilot", &ProvidersConfig::default()).is_none());
    }
}
