//! Console event reporter.
//!
//! Renders the orchestrator's event stream as status lines and per-advisor
//! spinners. Events arrive at-least-once, so rendering is idempotent:
//! repeating an event re-finishes a bar or re-prints a line, nothing more.

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use meld_application::EventSink;
use meld_domain::{AdvisorState, Decision, RunEvent, RunOutcome, RunPhase};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Event-driven progress display for a refinement run.
pub struct ConsoleReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap()
    }

    fn println(&self, line: String) {
        // Route through MultiProgress so lines don't tear active bars
        let _ = self.multi.println(line);
    }

    fn advisor_bar(&self, advisor: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap();
        bars.entry(advisor.to_string())
            .or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.set_prefix(advisor.to_string());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            })
            .clone()
    }

    fn finish_advisor(&self, advisor: &str, message: String) {
        if let Some(pb) = self.bars.lock().unwrap().remove(advisor) {
            pb.finish_with_message(message);
        } else {
            self.println(format!("  {}", message));
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleReporter {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::SessionOpened {
                session_id,
                resumed,
            } => {
                let verb = if *resumed { "Resuming" } else { "Starting" };
                self.println(format!("{} run {}", verb.cyan().bold(), session_id));
            }
            RunEvent::PhaseChanged { phase, round } => match phase {
                RunPhase::Planning => {
                    self.println(format!("{} Generating initial plan...", "->".cyan()));
                }
                RunPhase::Feedback => {
                    self.println(format!(
                        "\n{} {} Collecting advisor feedback...",
                        "->".cyan(),
                        format!("Round {}:", round).bold()
                    ));
                }
                RunPhase::Synthesis => {
                    self.println(format!("{} Synthesizing feedback...", "->".cyan()));
                }
                _ => {}
            },
            RunEvent::PlanGenerated { round, bytes } => {
                self.println(format!(
                    "  plan v{} written ({} bytes)",
                    round,
                    bytes
                ));
            }
            RunEvent::AdvisorStatus { advisor, state } => match state {
                AdvisorState::Running => {
                    self.advisor_bar(advisor).set_message("thinking...");
                }
                AdvisorState::Retrying => {
                    self.advisor_bar(advisor)
                        .set_message("retrying...".yellow().to_string());
                }
                AdvisorState::Complete => {
                    self.finish_advisor(advisor, format!("{} {}", "v".green(), advisor));
                }
                AdvisorState::Failed => {
                    self.finish_advisor(advisor, format!("{} {} (failed)", "x".red(), advisor));
                }
                AdvisorState::Waiting => {}
            },
            RunEvent::FeedbackCollected {
                succeeded, failed, ..
            } => {
                self.println(format!(
                    "  feedback from: {}{}",
                    succeeded.join(", "),
                    if failed.is_empty() {
                        String::new()
                    } else {
                        format!(" ({} failed)", failed.join(", ").red())
                    }
                ));
            }
            RunEvent::ConvergenceEvaluated {
                diff_ratio,
                open_items,
                decision,
                ..
            } => {
                let verdict = match decision {
                    Decision::Converge => "converged".green().to_string(),
                    Decision::Continue => "continuing".yellow().to_string(),
                    Decision::NeedsHuman { .. } => "needs human decision".red().bold().to_string(),
                };
                self.println(format!(
                    "  {} (diff {:.1}%, {} open items)",
                    verdict,
                    diff_ratio * 100.0,
                    open_items
                ));
            }
            RunEvent::RoundCheckpointed { .. } => {}
            RunEvent::RunFinished { outcome, rounds } => {
                let line = match outcome {
                    RunOutcome::Converged => {
                        format!("{} Plan converged after {} rounds", "OK".green().bold(), rounds)
                    }
                    RunOutcome::NeedsHuman => format!(
                        "{} Plan oscillating after {} rounds - human decision needed",
                        "!!".red().bold(),
                        rounds
                    ),
                    RunOutcome::RoundsExhausted => format!(
                        "{} Round budget exhausted after {} rounds without convergence",
                        "!!".yellow().bold(),
                        rounds
                    ),
                };
                self.println(format!("\n{}", line));
            }
            RunEvent::SessionInterrupted { round } => {
                self.println(format!(
                    "\n{} Interrupted during round {} - state saved",
                    "!!".yellow().bold(),
                    round
                ));
            }
            RunEvent::Error { message, .. } => {
                self.println(format!("{} {}", "error:".red().bold(), message));
            }
        }
    }
}
