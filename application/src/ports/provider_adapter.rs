//! Provider adapter port.
//!
//! One adapter wraps one external reviewing/synthesizing CLI behind a
//! uniform contract: prompt in, classified result out. The orchestrator
//! and pool never branch on provider identity — adding a provider means
//! one adapter plus one registry entry in the infrastructure layer.

use async_trait::async_trait;
use meld_domain::ProviderFailure;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A single non-interactive invocation of an external tool.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub prompt: String,
    /// Hard per-invocation deadline. The spawned process is terminated
    /// when it expires; no process outlives the request.
    pub deadline: Duration,
    /// Cancelling this token tears the subprocess down mid-flight.
    pub cancel: CancellationToken,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>, deadline: Duration, cancel: CancellationToken) -> Self {
        Self {
            prompt: prompt.into(),
            deadline,
            cancel,
        }
    }
}

/// Successful invocation output.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    pub text: String,
    pub elapsed: Duration,
}

/// Result of a read-only preflight probe, gathered outside the round loop.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub provider: String,
    pub cli_found: bool,
    pub auth_ok: bool,
    pub detail: String,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        self.cli_found && self.auth_ok
    }
}

/// Uniform contract over one external CLI tool.
///
/// Implementations must guarantee the spawned process is terminated on
/// deadline expiry or cancellation — graceful signal, bounded wait, then
/// force. Failures come back classified, never as raw I/O errors.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name used in artifacts and participation maps.
    fn name(&self) -> &str;

    /// Run the tool once. Retries are the caller's concern.
    async fn invoke(&self, request: InvocationRequest)
        -> Result<InvocationOutput, ProviderFailure>;

    /// Read-only existence/auth check. Never called inside the round loop.
    async fn probe(&self) -> ProbeReport;
}
