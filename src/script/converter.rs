//! Step to task conversion.

use crate::actuator::Point;
use crate::script::model::{ScriptConfig, Step};
use crate::script::variables::{Variables, substitute, substitute_opt};
use crate::task::{
    ClickTask, ConditionTask, InputTask, LoopTask, ShellTask, SwipeTask, Task, TaskKind, WaitTask,
};
use std::time::Duration;
use tracing::warn;

/// Reasons a step is dropped during conversion
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("{0} step has no target id, text or content description")]
    MissingTarget(&'static str),
    #[error("shell step has an empty command")]
    EmptyCommand,
    #[error("swipe step has zero duration")]
    InvalidSwipe,
}

/// Turns one script step into executable tasks
pub trait TaskConverter: Send + Sync {
    /// Convert a step. Steps that cannot be converted yield an empty list.
    fn convert(&self, step: &Step, variables: &Variables) -> Vec<Task>;
}

/// Converter applying `${var}` substitution and the script's timing defaults
#[derive(Debug, Clone, Default)]
pub struct DefaultTaskConverter {
    config: ScriptConfig,
}

impl DefaultTaskConverter {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Convert a step, reporting why it was rejected
    pub fn try_convert(&self, step: &Step, vars: &Variables) -> Result<Task, ConversionError> {
        let sub = |s: &str| substitute(s, vars);
        let sub_opt = |s: &Option<String>| substitute_opt(s.as_deref(), vars);
        let has_value = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.is_empty());

        let (kind, description) = match step {
            Step::Click {
                target_id,
                text,
                content_description,
                wait_after,
                timeout,
                use_ocr,
                description,
            } => {
                let click = ClickTask {
                    target_id: sub_opt(target_id),
                    text: sub_opt(text),
                    content_description: sub_opt(content_description),
                    wait_after: self.config.wait_after(*wait_after),
                    timeout: self.config.timeout(*timeout),
                    use_ocr: *use_ocr,
                };
                if click.target().is_none() {
                    return Err(ConversionError::MissingTarget("click"));
                }
                (TaskKind::Click(click), description)
            }
            Step::Input {
                target_id,
                text,
                input,
                append,
                wait_after,
                description,
            } => {
                let task = InputTask {
                    target_id: sub_opt(target_id),
                    text: sub_opt(text),
                    input: sub(input),
                    append: *append,
                    wait_after: self.config.wait_after(*wait_after),
                };
                if !has_value(&task.target_id) && !has_value(&task.text) {
                    return Err(ConversionError::MissingTarget("input"));
                }
                (TaskKind::Input(task), description)
            }
            Step::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                duration,
                wait_after,
                description,
            } => {
                let duration = self.config.swipe_duration(*duration);
                if duration.is_zero() {
                    return Err(ConversionError::InvalidSwipe);
                }
                let swipe = SwipeTask::new(
                    Point::new(*start_x, *start_y),
                    Point::new(*end_x, *end_y),
                    duration,
                )
                .with_wait_after(self.config.wait_after(*wait_after));
                (TaskKind::Swipe(swipe), description)
            }
            Step::Wait {
                milliseconds,
                description,
            } => (
                TaskKind::Wait(WaitTask::new(Duration::from_millis(*milliseconds))),
                description,
            ),
            Step::Condition {
                condition,
                then,
                otherwise,
                description,
            } => {
                let then_tasks = self.convert_all(then, vars);
                let else_tasks = self.convert_all(otherwise, vars);
                let task = ConditionTask::new(sub(condition), then_tasks, else_tasks);
                (TaskKind::Condition(task), description)
            }
            Step::Loop {
                times,
                while_condition,
                steps,
                description,
            } => {
                let body = self.convert_all(steps, vars);
                let mut task = LoopTask::new(*times, body);
                task.condition = sub_opt(while_condition);
                (TaskKind::Loop(task), description)
            }
            Step::Shell {
                command,
                use_root,
                timeout,
                description,
            } => {
                let command = sub(command);
                if command.trim().is_empty() {
                    return Err(ConversionError::EmptyCommand);
                }
                let shell = ShellTask::new(command)
                    .as_root(*use_root)
                    .with_timeout(self.config.timeout(*timeout));
                (TaskKind::Shell(shell), description)
            }
        };

        Ok(Task::generated(kind).with_description(sub(description)))
    }

    fn convert_all(&self, steps: &[Step], vars: &Variables) -> Vec<Task> {
        steps
            .iter()
            .flat_map(|step| self.convert(step, vars))
            .collect()
    }
}

impl TaskConverter for DefaultTaskConverter {
    fn convert(&self, step: &Step, variables: &Variables) -> Vec<Task> {
        match self.try_convert(step, variables) {
            Ok(task) => vec![task],
            Err(e) => {
                warn!("Dropping {} step: {}", step.type_name(), e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::priority;
    use serde_json::json;
    use std::collections::HashMap;

    fn vars() -> Variables {
        HashMap::from([
            ("user".to_string(), json!("alice")),
            ("retries".to_string(), json!(2)),
        ])
    }

    fn step(value: serde_json::Value) -> Step {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_input_substitution() {
        let converter = DefaultTaskConverter::default();
        let tasks = converter.convert(
            &step(json!({"type": "input", "targetId": "name", "input": "hello ${user}"})),
            &vars(),
        );
        assert_eq!(tasks.len(), 1);
        match &tasks[0].kind {
            TaskKind::Input(input) => {
                assert_eq!(input.input, "hello alice");
                assert_eq!(input.target_id.as_deref(), Some("name"));
                assert_eq!(input.wait_after, Duration::from_millis(500));
            }
            other => panic!("unexpected kind {}", other.name()),
        }
        assert!(tasks[0].id.as_str().starts_with("input_"));
    }

    #[test]
    fn test_config_defaults_fill_missing_timings() {
        let converter = DefaultTaskConverter::new(ScriptConfig {
            default_wait_after: 100,
            default_timeout: 2000,
            default_swipe_duration: 300,
            default_retry_count: 1,
        });

        let click = converter
            .try_convert(&step(json!({"type": "click", "text": "OK"})), &vars())
            .unwrap();
        match click.kind {
            TaskKind::Click(c) => {
                assert_eq!(c.wait_after, Duration::from_millis(100));
                assert_eq!(c.timeout, Duration::from_millis(2000));
            }
            other => panic!("unexpected kind {}", other.name()),
        }

        let swipe = converter
            .try_convert(
                &step(json!({"type": "swipe", "startX": 1, "startY": 2, "endX": 3, "endY": 4, "waitAfter": 0})),
                &vars(),
            )
            .unwrap();
        match swipe.kind {
            TaskKind::Swipe(s) => {
                assert_eq!(s.duration, Duration::from_millis(300));
                assert_eq!(s.wait_after, Duration::ZERO);
                assert_eq!(s.end, Point::new(3, 4));
            }
            other => panic!("unexpected kind {}", other.name()),
        }
    }

    #[test]
    fn test_wait_gets_low_priority() {
        let converter = DefaultTaskConverter::default();
        let task = converter
            .try_convert(&step(json!({"type": "wait", "milliseconds": 10})), &vars())
            .unwrap();
        assert_eq!(task.priority, priority::WAIT);
        assert!(!task.blocking);
    }

    #[test]
    fn test_invalid_steps_are_dropped() {
        let converter = DefaultTaskConverter::default();

        assert_eq!(
            converter.try_convert(&step(json!({"type": "click", "text": ""})), &vars()).unwrap_err(),
            ConversionError::MissingTarget("click")
        );
        assert_eq!(
            converter
                .try_convert(&step(json!({"type": "input", "input": "x"})), &vars())
                .unwrap_err(),
            ConversionError::MissingTarget("input")
        );
        assert_eq!(
            converter
                .try_convert(&step(json!({"type": "shell", "command": "  "})), &vars())
                .unwrap_err(),
            ConversionError::EmptyCommand
        );
        assert_eq!(
            converter
                .try_convert(
                    &step(json!({"type": "swipe", "startX": 0, "startY": 0, "endX": 1, "endY": 1, "duration": 0})),
                    &vars()
                )
                .unwrap_err(),
            ConversionError::InvalidSwipe
        );

        assert!(converter
            .convert(&step(json!({"type": "shell", "command": ""})), &vars())
            .is_empty());
    }

    #[test]
    fn test_condition_converts_children() {
        let converter = DefaultTaskConverter::default();
        let tasks = converter.convert(
            &step(json!({
                "type": "condition",
                "condition": "${user} == 'alice'",
                "then": [{"type": "click", "text": "Hi ${user}"}, {"type": "shell", "command": ""}],
                "else": [{"type": "wait", "milliseconds": 5}]
            })),
            &vars(),
        );
        match &tasks[0].kind {
            TaskKind::Condition(c) => {
                assert_eq!(c.condition, "alice == 'alice'");
                // The empty shell step is dropped, its sibling survives
                assert_eq!(c.then_tasks.len(), 1);
                assert_eq!(c.else_tasks.len(), 1);
                match &c.then_tasks[0].kind {
                    TaskKind::Click(click) => assert_eq!(click.text.as_deref(), Some("Hi alice")),
                    other => panic!("unexpected kind {}", other.name()),
                }
            }
            other => panic!("unexpected kind {}", other.name()),
        }
    }

    #[test]
    fn test_loop_converts_body_once() {
        let converter = DefaultTaskConverter::default();
        let tasks = converter.convert(
            &step(json!({
                "type": "loop",
                "times": 3,
                "while": "${retries} > 0",
                "steps": [{"type": "shell", "command": "echo ${user}", "useRoot": true}],
                "description": "retry for ${user}"
            })),
            &vars(),
        );
        assert_eq!(tasks[0].description, "retry for alice");
        match &tasks[0].kind {
            TaskKind::Loop(l) => {
                assert_eq!(l.times, 3);
                assert_eq!(l.condition.as_deref(), Some("2 > 0"));
                assert_eq!(l.tasks.len(), 1);
                match &l.tasks[0].kind {
                    TaskKind::Shell(s) => {
                        assert_eq!(s.command, "echo alice");
                        assert!(s.use_root);
                        assert_eq!(s.timeout, Duration::from_millis(10_000));
                    }
                    other => panic!("unexpected kind {}", other.name()),
                }
            }
            other => panic!("unexpected kind {}", other.name()),
        }
    }
}
