//! Composite tasks: conditional branch, loop and repeating group.
//!
//! Children always run sequentially on the composite's own worker, so they
//! inherit its cancellation token. A failing child fails the parent.

use crate::task::condition::ConditionSite;
use crate::task::context::TaskContext;
use crate::task::types::{Task, TaskError, TaskId};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Pause per iteration of a loop with no upper bound, so it never hogs a worker
pub const UNBOUNDED_YIELD: Duration = Duration::from_millis(100);

async fn run_sequence(tasks: &[Task], ctx: &TaskContext) -> Result<(), TaskError> {
    for task in tasks {
        ctx.checkpoint()?;
        task.execute(ctx).await?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ConditionTask {
    pub condition: String,
    pub then_tasks: Vec<Task>,
    pub else_tasks: Vec<Task>,
}

impl ConditionTask {
    pub fn new(condition: impl Into<String>, then_tasks: Vec<Task>, else_tasks: Vec<Task>) -> Self {
        Self {
            condition: condition.into(),
            then_tasks,
            else_tasks,
        }
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        let holds = ctx.evaluate(&self.condition, ConditionSite::Branch);
        debug!(
            "Condition {} '{}' evaluated to {}",
            id, self.condition, holds
        );
        let branch = if holds {
            &self.then_tasks
        } else {
            &self.else_tasks
        };
        run_sequence(branch, ctx).await
    }
}

#[derive(Debug, Clone)]
pub struct LoopTask {
    /// Iteration count; zero or negative means unbounded
    pub times: i32,
    pub condition: Option<String>,
    pub tasks: Vec<Task>,
}

impl LoopTask {
    pub fn new(times: i32, tasks: Vec<Task>) -> Self {
        Self {
            times,
            condition: None,
            tasks,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.times <= 0
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        let mut count = 0;
        loop {
            if !self.is_unbounded() && count >= self.times {
                break;
            }
            if let Some(condition) = &self.condition {
                if !ctx.evaluate(condition, ConditionSite::Loop) {
                    break;
                }
            }

            run_sequence(&self.tasks, ctx).await?;
            count += 1;

            if self.is_unbounded() {
                ctx.sleep(UNBOUNDED_YIELD).await?;
            }
        }
        debug!("Loop {} finished after {} iterations", id, count);
        Ok(())
    }
}

/// Runs a task group's converted steps, gated and repeated
#[derive(Debug, Clone)]
pub struct GroupWrapperTask {
    pub name: String,
    pub tasks: Vec<Task>,
    pub condition: Option<String>,
    /// 1 runs once, zero or negative is unbounded, larger values repeat exactly
    pub repeat: i32,
    /// Pause after every child and between iterations
    pub interval: Duration,
    /// Advisory only; exceeding it is logged
    pub timeout: Duration,
}

impl GroupWrapperTask {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tasks,
            condition: None,
            repeat: 1,
            interval: Duration::ZERO,
            timeout: Duration::from_millis(30_000),
        }
    }

    pub fn with_condition(mut self, condition: Option<String>) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_repeat(mut self, repeat: i32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn condition_holds(&self, ctx: &TaskContext) -> bool {
        self.condition
            .as_deref()
            .is_none_or(|c| ctx.evaluate(c, ConditionSite::Group))
    }

    pub async fn execute(&self, id: &TaskId, ctx: &TaskContext) -> Result<(), TaskError> {
        if !self.condition_holds(ctx) {
            debug!("Group '{}' skipped: condition not met", self.name);
            return Ok(());
        }

        let start = Instant::now();
        let mut warned = false;
        let mut count = 0;
        loop {
            for task in &self.tasks {
                ctx.checkpoint()?;
                task.execute(ctx).await?;
                if !self.interval.is_zero() {
                    ctx.sleep(self.interval).await?;
                }
            }
            count += 1;

            if !warned && start.elapsed() > self.timeout {
                warn!(
                    "Group '{}' ({}) has run for {:?}, past its {:?} timeout",
                    self.name,
                    id,
                    start.elapsed(),
                    self.timeout
                );
                warned = true;
            }

            let more = (self.repeat <= 0 || count < self.repeat) && self.condition_holds(ctx);
            if !more {
                break;
            }

            if !self.interval.is_zero() {
                ctx.sleep(self.interval).await?;
            } else if self.repeat <= 0 {
                ctx.sleep(UNBOUNDED_YIELD).await?;
            }
        }

        debug!("Group '{}' finished after {} iterations", self.name, count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::actions::{ClickTask, ShellTask};
    use crate::task::condition::ExpressionEvaluator;
    use crate::task::testing::{RecordingExecutor, process_context};
    use crate::task::types::TaskKind;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn shell(command: &str) -> Task {
        Task::new(command, TaskKind::Shell(ShellTask::new(command)))
    }

    fn starts(process: &RecordingExecutor) -> Vec<String> {
        process
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("start:"))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_routes_branches() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());
        let id = TaskId::new("cond");

        for (condition, expected) in [
            ("TRUE", "start:yes"),
            (" true ", "start:yes"),
            ("false", "start:no"),
            ("1", "start:no"),
        ] {
            let task = ConditionTask::new(condition, vec![shell("yes")], vec![shell("no")]);
            task.execute(&id, &ctx).await.unwrap();
            assert_eq!(starts(&process).last().map(String::as_str), Some(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_child_failure_fails_parent() {
        let process = Arc::new(RecordingExecutor {
            exit_code: 1,
            ..Default::default()
        });
        let ctx = process_context(process);

        let task = ConditionTask::new("true", vec![shell("bad")], vec![]);
        assert!(matches!(
            task.execute(&TaskId::new("c"), &ctx).await,
            Err(TaskError::ProcessFailure { .. })
        ));
    }

    fn unreachable_click() -> Task {
        Task::new(
            "click_submit",
            TaskKind::Click(ClickTask::by_text("Submit").with_timeout(Duration::from_secs(2))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_click_timeout_aborts_remaining_steps() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let group =
            GroupWrapperTask::new("g", vec![unreachable_click(), shell("after")]).with_repeat(3);
        let start = Instant::now();
        let result = group.execute(&TaskId::new("group_g"), &ctx).await;

        match result {
            Err(TaskError::Timeout { timeout, .. }) => assert_eq!(timeout, Duration::from_secs(2)),
            other => panic!("unexpected result: {:?}", other),
        }
        // No later sibling and no second iteration
        assert!(process.entries().is_empty());
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_click_timeout_aborts_remaining_iterations() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let task = LoopTask::new(3, vec![unreachable_click(), shell("after")]);
        assert!(matches!(
            task.execute(&TaskId::new("loop"), &ctx).await,
            Err(TaskError::Timeout { .. })
        ));
        assert!(process.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_failing_child_stops_sequence() {
        let process = Arc::new(RecordingExecutor {
            exit_code: 2,
            ..Default::default()
        });
        let ctx = process_context(process.clone());

        let group = GroupWrapperTask::new("g", vec![shell("first"), shell("second")])
            .with_repeat(0)
            .with_interval(Duration::from_millis(50));
        assert!(matches!(
            group.execute(&TaskId::new("group_g"), &ctx).await,
            Err(TaskError::ProcessFailure { exit_code: 2, .. })
        ));
        assert_eq!(starts(&process), vec!["start:first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_exact_times() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let task = LoopTask::new(3, vec![shell("a"), shell("b")]);
        task.execute(&TaskId::new("loop"), &ctx).await.unwrap();

        assert_eq!(
            starts(&process),
            vec!["start:a", "start:b", "start:a", "start:b", "start:a", "start:b"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_false_condition_runs_nothing() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let task = LoopTask::new(5, vec![shell("a")]).with_condition("false");
        task.execute(&TaskId::new("loop"), &ctx).await.unwrap();
        assert!(process.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_with_expression_condition() {
        let process = Arc::new(RecordingExecutor::default());
        let evaluator = ExpressionEvaluator::new(HashMap::from([(
            "retries".to_string(),
            serde_json::json!(2),
        )]));
        let ctx = process_context(process.clone()).with_evaluator(Arc::new(evaluator));

        let task = LoopTask::new(2, vec![shell("a")]).with_condition("retries > 1");
        task.execute(&TaskId::new("loop"), &ctx).await.unwrap();
        assert_eq!(starts(&process).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_loop_yields_and_cancels() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());
        let token = ctx.cancellation_token().clone();

        let task = Task::new("forever", TaskKind::Loop(LoopTask::new(-1, vec![shell("tick")])));
        let handle = tokio::spawn(async move { task.execute(&ctx).await });

        tokio::time::sleep(Duration::from_millis(1050)).await;
        token.cancel();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(TaskError::Cancelled)));
        let ticks = starts(&process).len();
        assert!((5..=12).contains(&ticks), "unexpected tick count {}", ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_repeats_with_interval() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let group = GroupWrapperTask::new("g", vec![shell("a")])
            .with_repeat(3)
            .with_interval(Duration::from_millis(100));
        let start = Instant::now();
        group.execute(&TaskId::new("group_g"), &ctx).await.unwrap();

        assert_eq!(starts(&process).len(), 3);
        // One interval after each child plus one between each iteration
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_group_condition_gate() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());

        let skipped = GroupWrapperTask::new("off", vec![shell("a")])
            .with_condition(Some("false".to_string()));
        skipped.execute(&TaskId::new("group_off"), &ctx).await.unwrap();
        assert!(process.entries().is_empty());

        let gated = GroupWrapperTask::new("on", vec![shell("b")])
            .with_condition(Some("1".to_string()))
            .with_repeat(2);
        gated.execute(&TaskId::new("group_on"), &ctx).await.unwrap();
        assert_eq!(starts(&process), vec!["start:b", "start:b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_group_without_interval_yields() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());
        let token = ctx.cancellation_token().clone();

        let group = GroupWrapperTask::new("spin", vec![shell("a")]).with_repeat(0);
        let handle =
            tokio::spawn(async move { group.execute(&TaskId::new("group_spin"), &ctx).await });

        tokio::time::sleep(Duration::from_millis(450)).await;
        token.cancel();

        assert!(matches!(handle.await.unwrap(), Err(TaskError::Cancelled)));
        let runs = starts(&process).len();
        assert!((3..=6).contains(&runs), "unexpected run count {}", runs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_group_sleeps_interval_between_iterations() {
        let process = Arc::new(RecordingExecutor::default());
        let ctx = process_context(process.clone());
        let token = ctx.cancellation_token().clone();

        let group = GroupWrapperTask::new("poll", vec![shell("a")])
            .with_repeat(0)
            .with_interval(Duration::from_millis(200));
        let handle =
            tokio::spawn(async move { group.execute(&TaskId::new("group_poll"), &ctx).await });

        tokio::time::sleep(Duration::from_millis(1050)).await;
        token.cancel();

        assert!(matches!(handle.await.unwrap(), Err(TaskError::Cancelled)));
        // 400 ms per iteration: the child interval plus the between-iteration interval
        let runs = starts(&process).len();
        assert!((2..=3).contains(&runs), "unexpected run count {}", runs);
    }
}
