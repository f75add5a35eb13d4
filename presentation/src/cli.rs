//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for meld
#[derive(Parser, Debug)]
#[command(name = "meld")]
#[command(author, version, about = "Multi-model planning convergence CLI")]
#[command(long_about = r#"
meld refines a plan through rounds of multi-model review: one melder
drafts and revises, independent advisors critique each revision, and a
convergence engine decides when iteration has stabilized.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./meld.toml         Project-level config
3. ~/.config/meld/config.toml   Global config

Examples:
  meld "Add user authentication with OAuth2 support"
  meld --file task.txt --context requirements.md
  meld --rounds 7 "Design event-driven order processing"
  meld --resume 20260807-105217-ab12cd34
  meld doctor
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Task description (or read it via --file / stdin)
    pub task: Option<String>,

    /// Read the task from a file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Include requirements/PRD context from a file
    #[arg(long, value_name = "PATH")]
    pub context: Option<PathBuf>,

    /// Maximum refinement rounds
    #[arg(short, long, value_name = "N")]
    pub rounds: Option<u32>,

    /// Per-advisor timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the final plan to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write a JSON run summary to a file
    #[arg(long, value_name = "PATH")]
    pub json_output: Option<PathBuf>,

    /// Directory for run artifacts
    #[arg(long, value_name = "PATH")]
    pub run_dir: Option<String>,

    /// Resume an interrupted run by id
    #[arg(long, value_name = "RUN_ID")]
    pub resume: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Don't write any artifacts to disk
    #[arg(long)]
    pub no_save: bool,

    /// Skip the provider preflight checks
    #[arg(long)]
    pub skip_preflight: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Diagnose provider CLI availability and authentication
    Doctor,
}
