//! Native host command execution.
//!
//! Executes commands directly on the host system using `tokio::process::Command`.

use super::{CommandExecutor, ExecutionCommand, ExecutionResult, ExecutorError, ShellConfig};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Executes commands directly on the host system
#[derive(Debug, Clone, Default)]
pub struct HostExecutor {
    shell: ShellConfig,
}

impl HostExecutor {
    /// Create a new host executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host executor with custom interpreters
    pub fn with_shell(shell: ShellConfig) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl CommandExecutor for HostExecutor {
    async fn execute(&self, cmd: ExecutionCommand) -> Result<ExecutionResult, ExecutorError> {
        debug!("Executing command on host: {} {:?}", cmd.program, cmd.args);

        let start = Instant::now();

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if cmd.stdin.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExecutorError::Unavailable(cmd.program.clone()),
            _ => ExecutorError::IoError(e),
        })?;

        if let (Some(input), Some(mut stdin)) = (cmd.stdin.as_deref(), child.stdin.take()) {
            // A child that exits before draining stdin is not an error here;
            // its exit status tells the story.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        // stdout and stderr are drained concurrently; dropping the wait on
        // timeout drops the child, which kills it.
        let output = if let Some(timeout) = cmd.timeout {
            match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Command timed out after {:?}: {}", timeout, cmd.program);
                    return Err(ExecutorError::Timeout(timeout));
                }
            }
        } else {
            child.wait_with_output().await?
        };

        let duration = start.elapsed();

        // No exit code means the process was killed by a signal
        let Some(exit_code) = output.status.code() else {
            return Err(ExecutorError::ExecutionFailed(format!(
                "{} terminated by signal ({})",
                cmd.program, output.status
            )));
        };

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            duration,
        })
    }

    fn shell_config(&self) -> ShellConfig {
        self.shell.clone()
    }

    async fn health_check(&self) -> Result<(), ExecutorError> {
        which::which(&self.shell.shell_program)
            .map(|_| ())
            .map_err(|_| ExecutorError::Unavailable(self.shell.shell_program.clone()))
    }

    fn executor_type(&self) -> &'static str {
        "host"
    }
}
