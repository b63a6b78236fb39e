//! # Script Execution Integration
//!
//! Ties script parsing, conversion and the task executor together behind a
//! single entry point.
//!
//! - **[`ScriptManager`]**: loads scripts and drives their tasks to completion
//! - **[`AutoflowConfig`]**: unified configuration, loadable from TOML
//! - **[`ScriptReport`]**: per-script summary of task outcomes
//!
//! ```text
//! script file ──parse──▶ TaskScript ──to_tasks──▶ [Task] ──submit──▶ TaskExecutor
//!                                                                       │
//!                                          ScriptReport ◀──outcomes─────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use autoflow::{AutoflowConfig, ScriptManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ScriptManager::with_host(AutoflowConfig::default());
//!     let report = manager.load_and_execute("flows/login.yaml").await?;
//!     println!("{} tasks completed", report.completed);
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::executor::{HostExecutor, ShellConfig};
use crate::script::{ScriptError, TaskScript, load_script};
use crate::task::{
    Actuators, ExecutorConfig, ExpressionEvaluator, LiteralEvaluator, TaskContext, TaskExecutor,
    TaskId, TaskOutcome,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Which condition evaluator tasks are run with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    /// `"true"` (and `"1"` for groups) only
    #[default]
    Literal,
    /// Boolean expressions over the script's variables
    Expression,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoflowConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub evaluator: EvaluatorKind,
    #[serde(default)]
    pub shell: ShellConfig,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl AutoflowConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Summary of one script run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptReport {
    pub script_name: String,
    pub submitted: usize,
    pub completed: usize,
    pub failed: Vec<(TaskId, String)>,
    pub rejected: Vec<(TaskId, String)>,
    pub cancelled: Vec<TaskId>,
    pub duration: Duration,
}

impl ScriptReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty() && self.cancelled.is_empty()
    }

    pub fn unsuccessful(&self) -> usize {
        self.failed.len() + self.rejected.len() + self.cancelled.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptRunError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Script '{}' finished with {} unsuccessful task(s)", .0.script_name, .0.unsuccessful())]
    Failed(Box<ScriptReport>),
}

/// Loads scripts and runs their tasks on a shared executor
pub struct ScriptManager {
    executor: TaskExecutor,
    expressions: Option<ExpressionEvaluator>,
}

impl ScriptManager {
    /// Create a manager over the given actuators. Must be called inside a
    /// tokio runtime.
    pub fn new(config: AutoflowConfig, actuators: Actuators) -> Self {
        let (context, expressions) = match config.evaluator {
            EvaluatorKind::Literal => (
                TaskContext::new(actuators).with_evaluator(Arc::new(LiteralEvaluator)),
                None,
            ),
            EvaluatorKind::Expression => {
                let evaluator = ExpressionEvaluator::default();
                (
                    TaskContext::new(actuators).with_evaluator(Arc::new(evaluator.clone())),
                    Some(evaluator),
                )
            }
        };

        Self {
            executor: TaskExecutor::new(config.executor, context),
            expressions,
        }
    }

    /// Host process execution only; UI steps fail or time out
    pub fn with_host(config: AutoflowConfig) -> Self {
        let process = Arc::new(HostExecutor::with_shell(config.shell.clone()));
        Self::new(config, Actuators::host_only().with_process(process))
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub async fn parse_script(&self, path: impl AsRef<Path>) -> Result<TaskScript, ScriptError> {
        load_script(path).await
    }

    pub async fn load_and_execute(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ScriptReport, ScriptRunError> {
        let path = path.as_ref();
        info!("Loading script {}", path.display());
        let script = self.parse_script(path).await?;
        self.execute_script(&script).await
    }

    /// Submit every task in script order and wait for all of them
    pub async fn execute_script(&self, script: &TaskScript) -> Result<ScriptReport, ScriptRunError> {
        let start = Instant::now();
        if let Some(expressions) = &self.expressions {
            expressions.set_variables(script.variables.clone());
        }

        let tasks = script.to_tasks();
        let mut report = ScriptReport {
            script_name: script_name(script),
            submitted: tasks.len(),
            ..Default::default()
        };
        info!(
            "Executing script '{}' ({} tasks)",
            report.script_name,
            tasks.len()
        );

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let task_id = task.id.clone();
            match self.executor.submit(task).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!("Task {} rejected: {}", task_id, e);
                    report.rejected.push((task_id, e.to_string()));
                }
            }
        }

        for handle in handles {
            let task_id = handle.id().clone();
            match handle.wait().await {
                TaskOutcome::Completed => report.completed += 1,
                TaskOutcome::Failed(e) => report.failed.push((task_id, e.to_string())),
                TaskOutcome::Cancelled => report.cancelled.push(task_id),
            }
        }
        report.duration = start.elapsed();

        if report.is_success() {
            info!(
                "Script '{}' completed {} tasks in {:?}",
                report.script_name, report.completed, report.duration
            );
            Ok(report)
        } else {
            warn!(
                "Script '{}' finished with {} unsuccessful task(s)",
                report.script_name,
                report.unsuccessful()
            );
            Err(ScriptRunError::Failed(Box::new(report)))
        }
    }

    pub async fn cancel(&self, id: &TaskId) -> bool {
        self.executor.cancel(id).await
    }

    pub async fn cancel_all(&self) -> usize {
        let cancelled = self.executor.cancel_all().await;
        if cancelled > 0 {
            info!("Cancelled {} task(s)", cancelled);
        }
        cancelled
    }

    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}

fn script_name(script: &TaskScript) -> String {
    [&script.metadata.name, &script.app.name]
        .into_iter()
        .find(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| "unnamed".to_string())
}
