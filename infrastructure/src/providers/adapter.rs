//! Generic CLI-backed provider adapter.
//!
//! One [`CliAdapter`] wraps one external tool. Per-provider quirks —
//! binary name, argument shape, stderr patterns — are injected at
//! construction by the provider modules, so the adapter itself never
//! branches on provider identity.

use crate::providers::classify::PatternSet;
use crate::providers::process::{run_cli, CliRunError};
use async_trait::async_trait;
use meld_application::{InvocationOutput, InvocationRequest, ProbeReport, ProviderAdapter};
use meld_domain::{ErrorCategory, ProviderFailure};
use std::time::Duration;
use tracing::debug;

/// Builds the argv for one invocation of the wrapped tool.
pub type ArgBuilder = Box<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Adapter over a single non-interactive CLI tool.
pub struct CliAdapter {
    name: String,
    binary: String,
    build_args: ArgBuilder,
    patterns: PatternSet,
}

impl CliAdapter {
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<String>,
        build_args: ArgBuilder,
        patterns: PatternSet,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            build_args,
            patterns,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn is_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

#[async_trait]
impl ProviderAdapter for CliAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<InvocationOutput, ProviderFailure> {
        if !self.is_installed() {
            return Err(ProviderFailure::new(
                &self.name,
                ErrorCategory::CliNotFound,
                format!("'{}' not found on PATH", self.binary),
            ));
        }

        let args = (self.build_args)(&request.prompt);
        debug!(provider = %self.name, binary = %self.binary, "invoking provider CLI");

        let output = match run_cli(&self.binary, &args, request.deadline, &request.cancel).await {
            Ok(output) => output,
            Err(CliRunError::Spawn(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderFailure::new(
                    &self.name,
                    ErrorCategory::CliNotFound,
                    format!("'{}' not found on PATH", self.binary),
                ));
            }
            Err(CliRunError::Spawn(e)) => {
                return Err(ProviderFailure::new(
                    &self.name,
                    ErrorCategory::NetworkError,
                    format!("failed to spawn '{}': {}", self.binary, e),
                ));
            }
            Err(CliRunError::Timeout { deadline }) => {
                return Err(ProviderFailure::timeout(&self.name, deadline));
            }
            Err(CliRunError::Cancelled) => {
                return Err(ProviderFailure::new(
                    &self.name,
                    ErrorCategory::Timeout,
                    "invocation cancelled",
                ));
            }
        };

        if !output.success() {
            return Err(self.patterns.classify(&self.name, &output.stderr));
        }

        let text = output.stdout.trim().to_string();
        if text.is_empty() {
            return Err(ProviderFailure::new(
                &self.name,
                ErrorCategory::ParseError,
                "provider produced no output",
            ));
        }

        Ok(InvocationOutput {
            text,
            elapsed: output.elapsed,
        })
    }

    async fn probe(&self) -> ProbeReport {
        if !self.is_installed() {
            return ProbeReport {
                provider: self.name.clone(),
                cli_found: false,
                auth_ok: false,
                detail: format!("'{}' not found on PATH", self.binary),
            };
        }

        // `--version` is the cheapest call that proves the binary runs.
        let result = run_cli(
            &self.binary,
            &["--version".to_string()],
            Duration::from_secs(15),
            &tokio_util::sync::CancellationToken::new(),
        )
        .await;

        match result {
            Ok(output) if output.success() => ProbeReport {
                provider: self.name.clone(),
                cli_found: true,
                auth_ok: true,
                detail: output.stdout.trim().to_string(),
            },
            Ok(output) => ProbeReport {
                provider: self.name.clone(),
                cli_found: true,
                auth_ok: false,
                detail: output.stderr.trim().to_string(),
            },
            Err(_) => ProbeReport {
                provider: self.name.clone(),
                cli_found: true,
                auth_ok: false,
                detail: "version check did not complete".to_string(),
            },
        }
    }
}
