//! CLI entrypoint for meld
//!
//! Wires the layers together with dependency injection: config loading,
//! adapter construction, store selection, signal handling, and final
//! output rendering all happen here — the core never sees any of it.

use anyhow::{bail, Context, Result};
use clap::Parser;
use meld_application::{
    AdvisorPool, EventSink, Melder, NullSink, OrchestrateError, Orchestrator, ProviderAdapter,
    SessionStore,
};
use meld_domain::{SessionStatus, Task};
use meld_infrastructure::{
    build_adapter, run_preflight, ConfigLoader, FileConfig, FsSessionStore, MemorySessionStore,
};
use meld_presentation::{
    format_json_summary, format_markdown, render_doctor_report, Cli, Command, ConsoleReporter,
};
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration and apply CLI overrides
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };
    if let Some(rounds) = cli.rounds {
        config.run.max_rounds = rounds;
    }
    if let Some(timeout) = cli.timeout {
        config.run.advisor_timeout_secs = timeout;
        config.run.melder_timeout_secs = timeout;
    }
    if let Some(run_dir) = &cli.run_dir {
        config.run.run_dir = run_dir.clone();
    }

    // Doctor mode: probe everything and report
    if matches!(cli.command, Some(Command::Doctor)) {
        let mut adapters = configured_adapters(&config)?;
        if !adapters.iter().any(|a| a.name() == config.providers.melder) {
            if let Some(melder) = build_adapter(&config.providers.melder, &config.providers) {
                adapters.push(melder);
            }
        }
        let reports = run_preflight(&adapters).await;
        let (text, all_ok) = render_doctor_report(&reports);
        println!("{}", text);
        std::process::exit(if all_ok { 0 } else { 1 });
    }

    run(cli, config).await
}

async fn run(cli: Cli, config: FileConfig) -> Result<()> {
    // === Dependency Injection ===
    let melder_adapter = build_adapter(&config.providers.melder, &config.providers)
        .with_context(|| format!("unknown melder provider '{}'", config.providers.melder))?;
    let mut advisor_adapters = configured_adapters(&config)?;

    // Preflight: drop unhealthy advisors, insist on a healthy melder
    if !cli.skip_preflight {
        let mut probe_set = advisor_adapters.clone();
        if !probe_set.iter().any(|a| a.name() == config.providers.melder) {
            probe_set.push(Arc::clone(&melder_adapter));
        }
        let reports = run_preflight(&probe_set).await;
        for report in &reports {
            if !report.is_healthy() {
                warn!(provider = %report.provider, detail = %report.detail, "provider excluded by preflight");
            }
            if report.provider == config.providers.melder && !report.is_healthy() {
                let (text, _) = render_doctor_report(&reports);
                eprintln!("{}", text);
                bail!(
                    "melder provider '{}' is not usable - see report above",
                    config.providers.melder
                );
            }
        }
        let healthy: Vec<String> = reports
            .iter()
            .filter(|r| r.is_healthy())
            .map(|r| r.provider.clone())
            .collect();
        advisor_adapters.retain(|a| healthy.iter().any(|h| h == a.name()));
        if advisor_adapters.is_empty() {
            bail!("no advisor CLIs available - run 'meld doctor' for help");
        }
    }

    let params = config.run_params();
    let melder = Melder::new(melder_adapter, params.melder_timeout);
    let pool = AdvisorPool::new(advisor_adapters, params.advisor_timeout);

    let store: Arc<dyn SessionStore> = if cli.no_save {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(FsSessionStore::new(&config.run.run_dir))
    };

    let sink: Arc<dyn EventSink> = if cli.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(ConsoleReporter::new())
    };

    // Ctrl-C cancels every in-flight subprocess, then the orchestrator
    // persists the interrupted session.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let orchestrator = Orchestrator::new(
        melder,
        pool,
        Arc::clone(&store),
        sink,
        params,
        cancel,
    );

    // Run or resume
    let session = if let Some(resume_id) = &cli.resume {
        orchestrator.resume(resume_id).await
    } else {
        let task = read_task(&cli)?;
        let session = config.new_session(FsSessionStore::next_run_id(), task);
        orchestrator.run(session).await
    };

    let session = match session {
        Ok(session) => session,
        Err(error) => {
            eprintln!("error: {}", error);
            if let Some(category) = error.provider_category() {
                eprintln!("hint: {}", category.user_hint());
            } else if let OrchestrateError::Store(store_error) = &error {
                eprintln!("hint: artifacts could not be written safely: {}", store_error);
            }
            std::process::exit(1);
        }
    };

    if session.status == SessionStatus::Interrupted {
        if !cli.no_save {
            eprintln!("hint: resume with 'meld --resume {}'", session.id);
        }
        std::process::exit(130);
    }

    // Final handoff to the formatter
    let document = format_markdown(&session);
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("could not write {}", path.display()))?;
            info!(path = %path.display(), "plan written");
        }
        None => println!("\n{}", document),
    }
    if let Some(path) = &cli.json_output {
        std::fs::write(path, format_json_summary(&session))
            .with_context(|| format!("could not write {}", path.display()))?;
    }

    Ok(())
}

/// Build adapters for every configured advisor, deduplicated.
fn configured_adapters(config: &FileConfig) -> Result<Vec<Arc<dyn ProviderAdapter>>> {
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
    for name in &config.providers.advisors {
        if adapters.iter().any(|a| a.name() == name) {
            continue;
        }
        let adapter = build_adapter(name, &config.providers)
            .with_context(|| format!("unknown advisor provider '{}'", name))?;
        adapters.push(adapter);
    }
    if adapters.is_empty() {
        bail!("no advisors configured");
    }
    Ok(adapters)
}

/// Task text from the positional argument, --file, or piped stdin.
fn read_task(cli: &Cli) -> Result<Task> {
    let description = if let Some(task) = &cli.task {
        task.clone()
    } else if let Some(path) = &cli.file {
        std::fs::read_to_string(path)
            .with_context(|| format!("could not read task file {}", path.display()))?
            .trim()
            .to_string()
    } else if !std::io::stdin().is_terminal() {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer.trim().to_string()
    } else {
        bail!("no task provided - pass it as an argument, via --file, or pipe it on stdin");
    };

    if description.is_empty() {
        bail!("task is empty");
    }

    let mut task = Task::new(description);
    if let Some(path) = &cli.context {
        let context = std::fs::read_to_string(path)
            .with_context(|| format!("could not read context file {}", path.display()))?;
        task = task.with_context(context);
    }
    Ok(task)
}
