//! Subprocess execution with deadline and cancellation guarantees.
//!
//! Every provider invocation runs through [`run_cli`]. The contract: the
//! spawned process never outlives the call. On deadline expiry or
//! cancellation the child receives a graceful signal (SIGTERM on unix),
//! gets a bounded grace window to exit, and is then force-killed.
//! `kill_on_drop` is set as a backstop against the runtime tearing the
//! future down mid-flight.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How long a signalled child may linger before it is force-killed.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Captured output of a completed child process.
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Ways a child process can fail to produce output.
#[derive(Debug)]
pub enum CliRunError {
    /// The binary could not be spawned at all.
    Spawn(std::io::Error),
    /// Deadline expired; the child has been terminated.
    Timeout { deadline: Duration },
    /// The cancel token fired; the child has been terminated.
    Cancelled,
}

/// Run a non-interactive CLI to completion under a deadline and a cancel
/// token. stdin is closed so no tool can block waiting for input.
pub async fn run_cli(
    program: &str,
    args: &[String],
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<CliOutput, CliRunError> {
    let started = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(CliRunError::Spawn)?;

    debug!(program, pid = child.id(), "spawned provider process");

    // Drain pipes concurrently with wait() so a chatty child cannot
    // deadlock on a full pipe. Lines are traced as they arrive, which is
    // what surfaces incremental output to observers.
    let stdout_task = spawn_reader(child.stdout.take(), program.to_string(), "stdout");
    let stderr_task = spawn_reader(child.stderr.take(), program.to_string(), "stderr");

    let status = tokio::select! {
        status = child.wait() => status.map_err(CliRunError::Spawn)?,
        _ = tokio::time::sleep(deadline) => {
            warn!(program, "deadline expired, terminating child");
            terminate(&mut child).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(CliRunError::Timeout { deadline });
        }
        _ = cancel.cancelled() => {
            debug!(program, "cancelled, terminating child");
            terminate(&mut child).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(CliRunError::Cancelled);
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: status.code().unwrap_or(-1),
        elapsed: started.elapsed(),
    })
}

fn spawn_reader<R>(
    pipe: Option<R>,
    program: String,
    label: &'static str,
) -> tokio::task::JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let Some(pipe) = pipe else {
            return collected;
        };
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(program = %program, stream = label, line = %line);
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

/// Graceful signal, bounded wait, then force.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    match tokio::time::timeout(TEARDOWN_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            warn!("child ignored SIGTERM, force killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}
