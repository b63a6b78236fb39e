//! # Autoflow
//!
//! A UI-automation task engine. Declarative scripts describe groups of steps
//! (click, input, swipe, wait, shell, plus conditions and loops); they are
//! converted into a tree of tasks and run on a priority-ordered executor with
//! a bounded worker pool.
//!
//! ## Architecture Overview
//!
//! - **[`script`]**: script model, JSON/YAML/TOML parsers and step conversion
//! - **[`task`]**: task variants, the execution context and the executor
//! - **[`actuator`]**: UI and OCR backend interfaces the tasks drive
//! - **[`executor`]**: process execution used by shell steps
//! - **[`integration`]**: [`ScriptManager`] and [`AutoflowConfig`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoflow::{AutoflowConfig, ScriptManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = ScriptManager::with_host(AutoflowConfig::default());
//!     let report = manager.load_and_execute("flows/daily.yaml").await?;
//!     println!("{} tasks completed", report.completed);
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Actuator capability interfaces.
///
/// UI tree access, gestures, text entry and OCR, implemented by platform
/// backends and handed to tasks explicitly.
pub mod actuator;

/// Command execution abstraction for shell steps.
pub mod executor;

/// Task model, control flow and the priority executor.
pub mod task;

/// Automation script model, parsing and conversion.
pub mod script;

/// High-level script execution and configuration.
pub mod integration;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use task::{
    Actuators, Task, TaskContext, TaskError, TaskExecutor, TaskHandle, TaskId, TaskKind,
    TaskOutcome, TaskResult, TaskState,
};

pub use script::{ScriptError, ScriptParserFactory, TaskScript};

pub use integration::{AutoflowConfig, EvaluatorKind, ScriptManager, ScriptReport, ScriptRunError};
