//! Doctor report rendering.
//!
//! Turns preflight probe results into per-provider status with one
//! actionable hint each: missing tool gets an install hint, failed auth
//! gets a re-auth hint.

use colored::Colorize;
use meld_application::ProbeReport;

/// Render the doctor report. Returns the text and whether everything is
/// healthy.
pub fn render_doctor_report(reports: &[ProbeReport]) -> (String, bool) {
    let mut out = String::new();
    let mut all_ok = true;

    out.push_str("Checking provider environment...\n\n");

    for report in reports {
        if report.is_healthy() {
            out.push_str(&format!("{} {}\n", "v".green(), report.provider.bold()));
            if !report.detail.is_empty() {
                out.push_str(&format!("  └─ {}\n", report.detail));
            } else {
                out.push_str("  └─ ready\n");
            }
        } else if !report.cli_found {
            all_ok = false;
            out.push_str(&format!("{} {}\n", "x".red(), report.provider.bold()));
            out.push_str(&format!("  └─ {}\n", report.detail));
            out.push_str(&format!(
                "     install the {} CLI and ensure it is on PATH\n",
                report.provider
            ));
        } else {
            all_ok = false;
            out.push_str(&format!("{} {}\n", "x".red(), report.provider.bold()));
            out.push_str(&format!(
                "  └─ auth check failed: {}\n",
                if report.detail.is_empty() {
                    "no detail"
                } else {
                    report.detail.as_str()
                }
            ));
            out.push_str(&format!(
                "     re-run '{} auth' or configure its API key\n",
                report.provider
            ));
        }
        out.push('\n');
    }

    if all_ok {
        out.push_str("All providers ready.\n");
    } else {
        out.push_str("Some providers need attention.\n");
        out.push_str("meld still runs with the providers that are available.\n");
    }

    (out, all_ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_report() {
        let reports = vec![ProbeReport {
            provider: "claude".into(),
            cli_found: true,
            auth_ok: true,
            detail: "1.2.3".into(),
        }];
        let (text, ok) = render_doctor_report(&reports);
        assert!(ok);
        assert!(text.contains("All providers ready"));
    }

    #[test]
    fn test_missing_cli_gets_install_hint() {
        let reports = vec![ProbeReport {
            provider: "gemini".into(),
            cli_found: false,
            auth_ok: false,
            detail: "'gemini' not found on PATH".into(),
        }];
        let (text, ok) = render_doctor_report(&reports);
        assert!(!ok);
        assert!(text.contains("install the gemini CLI"));
    }

    #[test]
    fn test_auth_failure_gets_reauth_hint() {
        let reports = vec![ProbeReport {
            provider: "codex".into(),
            cli_found: true,
            auth_ok: false,
            detail: "401".into(),
        }];
        let (text, _) = render_doctor_report(&reports);
        assert!(text.contains("re-run 'codex auth'"));
    }
}
