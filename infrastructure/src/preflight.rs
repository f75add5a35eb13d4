//! Preflight probes.
//!
//! Read-only existence/auth checks against every configured adapter, run
//! concurrently and only ever outside the round loop.

use meld_application::{ProbeReport, ProviderAdapter};
use std::sync::Arc;

/// Probe every adapter concurrently.
pub async fn run_preflight(adapters: &[Arc<dyn ProviderAdapter>]) -> Vec<ProbeReport> {
    let probes = adapters.iter().map(|adapter| {
        let adapter = Arc::clone(adapter);
        async move { adapter.probe().await }
    });
    futures::future::join_all(probes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::adapter::CliAdapter;
    use crate::providers::classify::PatternSet;

    #[tokio::test]
    async fn test_probe_reports_missing_cli() {
        let ghost: Arc<dyn ProviderAdapter> = Arc::new(CliAdapter::new(
            "ghost",
            "definitely-not-a-real-binary-name",
            Box::new(|_| vec![]),
            PatternSet::new(&[], &[], &[]),
        ));

        let reports = run_preflight(&[ghost]).await;
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].cli_found);
        assert!(!reports[0].is_healthy());
    }

    #[tokio::test]
    async fn test_probe_reports_working_cli() {
        // `sh --version`... not universal; use a binary that accepts it.
        let sh: Arc<dyn ProviderAdapter> = Arc::new(CliAdapter::new(
            "shell",
            "true",
            Box::new(|_| vec![]),
            PatternSet::new(&[], &[], &[]),
        ));

        let reports = run_preflight(&[sh]).await;
        assert!(reports[0].cli_found);
    }
}
