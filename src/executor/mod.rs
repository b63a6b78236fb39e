//! # Process Actuator
//!
//! Command execution used by shell steps. The engine only talks to the
//! [`CommandExecutor`] trait; [`HostExecutor`] is the implementation that
//! spawns real processes.
//!
//! ## Core Components
//!
//! - **[`CommandExecutor`]**: Async trait every process backend implements
//! - **[`HostExecutor`]**: Direct host process execution via `tokio::process::Command`
//! - **[`ExecutionCommand`]**: Program, arguments, stdin payload, and timeout
//! - **[`ExecutionResult`]**: Captured stdout, stderr, exit code, and duration
//! - **[`ShellConfig`]**: Which interpreters back plain and elevated shell steps
//!
//! ## Timeout Handling
//!
//! Processes are spawned with `kill_on_drop`, so a command that exceeds its
//! timeout is killed when the pending wait is dropped, and a cancelled task
//! never leaves its interpreter running.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use autoflow::executor::{CommandExecutor, HostExecutor};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = HostExecutor::new();
//!
//!     let result = executor
//!         .run_shell("echo hello", false, Some(Duration::from_secs(5)))
//!         .await?;
//!     println!("Output: {}", result.stdout);
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interpreter configuration for shell steps.
pub mod config;

/// Host-based command execution.
///
/// Implements [`HostExecutor`] for direct process execution on the
/// host system using `tokio::process::Command`.
pub mod host;

pub use config::ShellConfig;
pub use host::HostExecutor;

/// Result of command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
    /// Exit code (0 = success, non-zero = failure)
    pub exit_code: i32,
    /// Duration of command execution
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the command executed successfully (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Command to execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionCommand {
    /// Program name or path to execute
    pub program: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Standard input to provide to the command
    pub stdin: Option<String>,
    /// Maximum execution time (None = no timeout)
    pub timeout: Option<Duration>,
}

impl ExecutionCommand {
    /// Create a new command with just program and args
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
            timeout: None,
        }
    }

    /// Start `interpreter` and feed it `script` followed by `exit`
    pub fn interpreter(interpreter: impl Into<String>, script: &str) -> Self {
        Self::new(interpreter, Vec::new()).with_stdin(format!("{script}\nexit\n"))
    }

    /// Set standard input
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Errors during command execution
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Interpreter or program is not installed
    #[error("Program unavailable: {0}")]
    Unavailable(String),

    /// Command execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Command execution timed out
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Process execution backend
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command and return the captured result
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails to spawn or times out.
    /// A non-zero exit is reported through [`ExecutionResult::exit_code`].
    async fn execute(&self, command: ExecutionCommand) -> Result<ExecutionResult, ExecutorError>;

    /// Interpreters used by [`CommandExecutor::run_shell`]
    fn shell_config(&self) -> ShellConfig {
        ShellConfig::default()
    }

    /// Run `script` through the plain or elevated interpreter
    async fn run_shell(
        &self,
        script: &str,
        elevated: bool,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecutorError> {
        let mut command =
            ExecutionCommand::interpreter(self.shell_config().interpreter(elevated), script);
        command.timeout = timeout;
        self.execute(command).await
    }

    /// Check if the executor is available and healthy
    async fn health_check(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Get executor type name for logging
    fn executor_type(&self) -> &'static str;
}
