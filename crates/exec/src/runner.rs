use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code reported when the process did not run to a normal exit.
pub const INTERNAL_EXIT_CODE: i32 = -1;

/// Outcome of one subprocess invocation. Built even when nothing could be launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubprocessResult {
    /// Exit code was 0.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, or [`INTERNAL_EXIT_CODE`].
    pub exit_code: i32,
    /// Killed because the runner's deadline passed.
    #[serde(default)]
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl SubprocessResult {
    fn internal(stderr: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: INTERNAL_EXIT_CODE,
            timed_out: false,
            duration_ms: elapsed_ms(started),
        }
    }

    /// One-line description of a failed run, including captured stderr.
    pub fn failure_summary(&self, what: &str) -> String {
        let stderr = self.stderr.trim();
        if self.timed_out {
            return format!("{what} timed out: {stderr}");
        }
        if stderr.is_empty() {
            format!("{what} exited with code {}", self.exit_code)
        } else {
            format!("{what} exited with code {}: {stderr}", self.exit_code)
        }
    }
}

/// Runs external programs without a shell and captures their output.
///
/// `run` never fails: launch errors, wait errors and timeouts all come back as
/// an unsuccessful [`SubprocessResult`] with [`INTERNAL_EXIT_CODE`].
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and report `timed_out` once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `command[0]` with `command[1..]` as arguments.
    pub async fn run(&self, command: &[String], working_dir: Option<&Path>) -> SubprocessResult {
        let started = Instant::now();
        let Some((program, args)) = command.split_first() else {
            return SubprocessResult::internal("empty command", started);
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        debug!(program = %program, ?args, cwd = ?working_dir, "spawning subprocess");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "failed to start subprocess");
                return SubprocessResult::internal(format!("failed to start {program}: {e}"), started);
            }
        };

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(program = %program, timeout_secs = limit.as_secs(), "subprocess timed out");
                    let mut result = SubprocessResult::internal(
                        format!("{program} did not finish within {}s", limit.as_secs()),
                        started,
                    );
                    result.timed_out = true;
                    return result;
                }
            },
            None => child.wait_with_output().await,
        };

        match waited {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(INTERNAL_EXIT_CODE);
                let result = SubprocessResult {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code,
                    timed_out: false,
                    duration_ms: elapsed_ms(started),
                };
                info!(
                    program = %program,
                    exit_code,
                    success = result.success,
                    duration_ms = result.duration_ms,
                    "subprocess finished"
                );
                result
            }
            Err(e) => {
                warn!(program = %program, error = %e, "waiting for subprocess failed");
                SubprocessResult::internal(format!("failed waiting for {program}: {e}"), started)
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
