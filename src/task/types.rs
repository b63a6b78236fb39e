use crate::task::actions::{ClickTask, InputTask, ShellTask, SwipeTask, WaitTask};
use crate::task::context::TaskContext;
use crate::task::control::{ConditionTask, GroupWrapperTask, LoopTask};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Scheduling priorities; higher values are dequeued first
pub mod priority {
    pub const LOW: i32 = 0;
    /// Default for wait steps
    pub const WAIT: i32 = 1;
    pub const NORMAL: i32 = 5;
    pub const HIGH: i32 = 10;
}

/// Unique identifier for tasks
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `<prefix>_<uuid>` identifier
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}_{}", prefix, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Atomic or composite unit of automation work
#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub priority: i32,
    /// When set, the dispatch loop waits for this task before dequeuing the next one
    pub blocking: bool,
    pub description: String,
    pub kind: TaskKind,
}

/// Every task variant the engine can execute
#[derive(Clone, Debug)]
pub enum TaskKind {
    Click(ClickTask),
    Input(InputTask),
    Swipe(SwipeTask),
    Wait(WaitTask),
    Shell(ShellTask),
    Condition(ConditionTask),
    Loop(LoopTask),
    GroupWrapper(GroupWrapperTask),
}

impl TaskKind {
    /// Short lowercase name used for id prefixes and logging
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Click(_) => "click",
            TaskKind::Input(_) => "input",
            TaskKind::Swipe(_) => "swipe",
            TaskKind::Wait(_) => "wait",
            TaskKind::Shell(_) => "shell",
            TaskKind::Condition(_) => "condition",
            TaskKind::Loop(_) => "loop",
            TaskKind::GroupWrapper(_) => "group",
        }
    }

    fn default_priority(&self) -> i32 {
        match self {
            TaskKind::Wait(_) => priority::WAIT,
            _ => priority::NORMAL,
        }
    }

    fn default_blocking(&self) -> bool {
        !matches!(self, TaskKind::Wait(_))
    }

    /// Direct children of composite tasks
    pub fn children(&self) -> Vec<&Task> {
        match self {
            TaskKind::Condition(c) => c.then_tasks.iter().chain(c.else_tasks.iter()).collect(),
            TaskKind::Loop(l) => l.tasks.iter().collect(),
            TaskKind::GroupWrapper(g) => g.tasks.iter().collect(),
            _ => Vec::new(),
        }
    }
}

impl Task {
    /// Create a task with the kind's default priority and blocking flag
    pub fn new(id: impl Into<TaskId>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            priority: kind.default_priority(),
            blocking: kind.default_blocking(),
            description: String::new(),
            kind,
        }
    }

    /// Create a task with a generated id
    pub fn generated(kind: TaskKind) -> Self {
        let id = TaskId::generate(kind.name());
        Self::new(id, kind)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Run the task's action.
    ///
    /// Composite tasks await their children sequentially through this same
    /// entry point, so the future is boxed.
    pub fn execute<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            match &self.kind {
                TaskKind::Click(t) => t.execute(&self.id, ctx).await,
                TaskKind::Input(t) => t.execute(&self.id, ctx).await,
                TaskKind::Swipe(t) => t.execute(&self.id, ctx).await,
                TaskKind::Wait(t) => t.execute(&self.id, ctx).await,
                TaskKind::Shell(t) => t.execute(&self.id, ctx).await,
                TaskKind::Condition(t) => t.execute(&self.id, ctx).await,
                TaskKind::Loop(t) => t.execute(&self.id, ctx).await,
                TaskKind::GroupWrapper(t) => t.execute(&self.id, ctx).await,
            }
        })
    }

    /// Total number of tasks in this subtree, including self
    pub fn tree_size(&self) -> usize {
        1 + self
            .kind
            .children()
            .iter()
            .map(|child| child.tree_size())
            .sum::<usize>()
    }

    /// Indented one-line-per-task rendering of the subtree
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!(
            "[{}] {} (priority {}, {})",
            self.kind_name(),
            self.id,
            self.priority,
            if self.blocking { "blocking" } else { "non-blocking" }
        ));
        if !self.description.is_empty() {
            out.push_str(&format!(" - {}", self.description));
        }
        out.push('\n');
        for child in self.kind.children() {
            child.write_outline(out, depth + 1);
        }
    }
}

/// Outcome of submitting a task to the executor.
///
/// Success means "accepted for scheduling", not "finished"; completion is
/// reported through [`TaskHandle`](crate::task::TaskHandle) and task events.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub is_success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn accepted(task_id: TaskId, data: Option<serde_json::Value>) -> Self {
        let message = format!("Task {} added to queue", task_id);
        Self {
            task_id,
            is_success: true,
            message,
            data,
        }
    }

    pub fn rejected(task_id: TaskId, error: &TaskError) -> Self {
        Self {
            task_id,
            is_success: false,
            message: error.to_string(),
            data: None,
        }
    }
}

/// Lifecycle of a submitted task
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    Queued,
    Dispatched,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Terminal result of a task run
#[derive(Clone, Debug)]
pub enum TaskOutcome {
    Completed,
    Failed(TaskError),
    Cancelled,
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Completed => TaskState::Completed,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
}

/// Task execution and scheduling errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("{0} actuator not available")]
    ActuatorUnavailable(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Target is not editable: {0}")]
    TargetNotEditable(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Command failed with exit code {exit_code}: {stderr}")]
    ProcessFailure { exit_code: i32, stderr: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Task with id {0} already exists")]
    DuplicateTaskId(TaskId),

    #[error("Executor has been shut down")]
    ExecutorShutdown,

    #[error("Task cancelled")]
    Cancelled,
}
