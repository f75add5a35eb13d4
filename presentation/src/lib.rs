//! Presentation layer for meld
//!
//! Consumers of the core's event stream and session handoff: the console
//! reporter, the final document formatter, doctor output, and the clap
//! CLI definition. Nothing here participates in the round loop.

pub mod cli;
pub mod console;
pub mod doctor;
pub mod formatter;

pub use cli::{Cli, Command};
pub use console::ConsoleReporter;
pub use doctor::render_doctor_report;
pub use formatter::{format_json_summary, format_markdown};
