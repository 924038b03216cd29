//! External process execution for pipeline stages.
//!
//! Runs one command with a wall-clock timeout and captures both output
//! streams in full. Every stage gets exactly one attempt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Number of stderr characters included in log lines.
const LOG_EXCERPT_CHARS: usize = 500;

/// A fully specified process invocation.
#[derive(Debug, Clone)]
pub struct StageCommand {
    /// Program name (resolved via `PATH`) or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Wall-clock limit for the process.
    pub timeout: Duration,
    /// Variables added to the inherited environment.
    pub env: HashMap<String, String>,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
}

impl StageCommand {
    /// A command with no environment overlay and a 60 second timeout.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(60),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Outcome of one process invocation.
#[derive(Debug)]
pub enum StageResult {
    /// The process exited on its own.
    Completed {
        /// Exit code; `-1` if the process was terminated by a signal.
        exit_code: i32,
        /// Captured stdout (lossy UTF-8).
        stdout: String,
        /// Captured stderr (lossy UTF-8).
        stderr: String,
        /// Wall-clock duration.
        elapsed: Duration,
    },
    /// The process exceeded its timeout and was killed.
    TimedOut {
        /// The limit that was exceeded.
        timeout: Duration,
    },
    /// The process could not be started or awaited.
    LaunchError {
        /// Underlying IO error.
        error: std::io::Error,
    },
}

/// Runs stage commands.
#[derive(Debug, Clone, Default)]
pub struct StageRunner;

impl StageRunner {
    /// Create a runner.
    pub fn new() -> Self {
        Self
    }

    /// Run `command` to completion or until its timeout expires.
    pub async fn run(&self, command: &StageCommand) -> StageResult {
        let start = Instant::now();

        info!(
            command = %command.program,
            args = ?command.args.iter().map(|a| excerpt(a, 120)).collect::<Vec<_>>(),
            timeout_s = command.timeout.as_secs(),
            "Running stage command"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(command = %command.program, error = %e, "Failed to start stage command");
                return StageResult::LaunchError { error: e };
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(command.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let elapsed = start.elapsed();
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let exit_code = output.status.code().unwrap_or(-1);

                if !stderr.is_empty() {
                    debug!(command = %command.program, stderr = %excerpt(&stderr, LOG_EXCERPT_CHARS), "Stage stderr output");
                }

                if exit_code == 0 {
                    info!(
                        command = %command.program,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Stage command completed"
                    );
                } else {
                    error!(
                        command = %command.program,
                        exit_code,
                        elapsed_ms = elapsed.as_millis() as u64,
                        stderr = %excerpt(&stderr, LOG_EXCERPT_CHARS),
                        "Stage command failed"
                    );
                }

                StageResult::Completed {
                    exit_code,
                    stdout,
                    stderr,
                    elapsed,
                }
            }
            Ok(Err(e)) => {
                error!(command = %command.program, error = %e, "Failed to collect stage output");
                StageResult::LaunchError { error: e }
            }
            Err(_) => {
                error!(
                    command = %command.program,
                    timeout_s = command.timeout.as_secs(),
                    "Stage command timed out, killed"
                );
                StageResult::TimedOut {
                    timeout: command.timeout,
                }
            }
        }
    }

    /// Whether `program` can be found, either as a path or on `PATH`.
    pub fn is_available(program: &str) -> bool {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return candidate.is_file();
        }

        match std::env::var_os("PATH") {
            Some(paths) => std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()),
            None => {
                warn!("PATH is not set, cannot resolve '{}'", program);
                false
            }
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
