//! Captured child-process execution shared by the terraform and az drivers.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Maximum number of stderr lines carried into error messages.
pub const STDERR_TAIL_LINES: usize = 20;

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// Returns `Ok(None)` if `cancel` fires first. Cancellation interrupts the child
/// (SIGINT, falling back to SIGTERM) so it can persist state and release locks,
/// then waits up to `grace` for it to exit. Only a child still running after
/// `grace` is killed.
pub async fn run_captured(
    mut command: Command,
    cancel: Option<&CancellationToken>,
    grace: Duration,
) -> std::io::Result<Option<CommandOutput>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn()?;
    let pid = child.id();
    let wait = child.wait_with_output();
    tokio::pin!(wait);

    let output = match cancel {
        Some(token) => {
            tokio::select! {
                result = &mut wait => result?,
                _ = token.cancelled() => {
                    let interrupted = pid.is_some_and(interrupt);
                    if !interrupted {
                        warn!(pid, "could not interrupt child, it will be killed");
                        return Ok(None);
                    }
                    match tokio::time::timeout(grace, &mut wait).await {
                        Ok(result) => debug!(
                            pid,
                            exit_code = result.ok().and_then(|o| o.status.code()),
                            "child exited after interrupt"
                        ),
                        Err(_) => warn!(
                            pid,
                            grace_secs = grace.as_secs_f64(),
                            "child ignored interrupt, killing it"
                        ),
                    }
                    // Dropping `wait` kills a child that is still running.
                    return Ok(None);
                }
            }
        }
        None => wait.await?,
    };

    Ok(Some(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }))
}

/// Ask the child to stop the way Ctrl-C would. Returns whether a signal was delivered.
#[cfg(unix)]
fn interrupt(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) only signals the process. The child is not reaped until
    // `wait_with_output` completes, so `pid` still names it.
    unsafe { libc::kill(pid, libc::SIGINT) == 0 || libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn interrupt(_pid: u32) -> bool {
    false
}

/// Last `max_lines` non-empty lines of `text`, joined with newlines.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
