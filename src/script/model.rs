use crate::script::converter::{DefaultTaskConverter, TaskConverter};
use crate::script::variables::Variables;
use crate::task::{GroupWrapperTask, Task, TaskKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Parsed automation script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScript {
    #[serde(default)]
    pub app: AppInfo,
    #[serde(default)]
    pub metadata: ScriptMetadata,
    #[serde(default)]
    pub config: ScriptConfig,
    #[serde(default)]
    pub tasks: Vec<TaskGroup>,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppInfo {
    pub package_name: String,
    pub name: String,
    pub main_activity: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub created_at: String,
}

impl Default for ScriptMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: "1.0".to_string(),
            description: String::new(),
            author: String::new(),
            created_at: String::new(),
        }
    }
}

/// Script-wide timing defaults, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    pub default_wait_after: u64,
    pub default_timeout: u64,
    pub default_swipe_duration: u64,
    /// Carried for script compatibility; clicks retry until their timeout instead
    pub default_retry_count: u32,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            default_wait_after: 500,
            default_timeout: 10_000,
            default_swipe_duration: 500,
            default_retry_count: 3,
        }
    }
}

impl ScriptConfig {
    pub fn wait_after(&self, step_value: Option<u64>) -> Duration {
        Duration::from_millis(step_value.unwrap_or(self.default_wait_after))
    }

    pub fn timeout(&self, step_value: Option<u64>) -> Duration {
        Duration::from_millis(step_value.unwrap_or(self.default_timeout))
    }

    pub fn swipe_duration(&self, step_value: Option<u64>) -> Duration {
        Duration::from_millis(step_value.unwrap_or(self.default_swipe_duration))
    }
}

/// Named group of steps with an optional gate and repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub condition: Option<String>,
    /// 1 runs once, zero or negative repeats until the condition fails
    #[serde(default = "default_repeat")]
    pub repeat: i32,
    #[serde(default)]
    pub interval: u64,
    #[serde(default = "default_group_timeout")]
    pub timeout: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_repeat() -> i32 {
    1
}

fn default_group_timeout() -> u64 {
    30_000
}

fn default_loop_times() -> i32 {
    -1
}

impl TaskGroup {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            steps,
            condition: None,
            repeat: 1,
            interval: 0,
            timeout: default_group_timeout(),
        }
    }

    /// Whether the group runs through a wrapper rather than inline
    pub fn needs_wrapper(&self) -> bool {
        self.condition.is_some() || self.repeat != 1
    }
}

/// One script step, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    #[serde(rename_all = "camelCase")]
    Click {
        #[serde(default)]
        target_id: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content_description: Option<String>,
        #[serde(default)]
        wait_after: Option<u64>,
        #[serde(default)]
        timeout: Option<u64>,
        #[serde(default)]
        use_ocr: bool,
        #[serde(default)]
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    Input {
        #[serde(default)]
        target_id: Option<String>,
        #[serde(default)]
        text: Option<String>,
        input: String,
        #[serde(default)]
        append: bool,
        #[serde(default)]
        wait_after: Option<u64>,
        #[serde(default)]
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    Swipe {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        #[serde(default)]
        duration: Option<u64>,
        #[serde(default)]
        wait_after: Option<u64>,
        #[serde(default)]
        description: String,
    },
    Wait {
        milliseconds: u64,
        #[serde(default)]
        description: String,
    },
    Condition {
        condition: String,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
        #[serde(default)]
        description: String,
    },
    Loop {
        #[serde(default = "default_loop_times")]
        times: i32,
        #[serde(default, rename = "while")]
        while_condition: Option<String>,
        #[serde(default)]
        steps: Vec<Step>,
        #[serde(default)]
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    Shell {
        command: String,
        #[serde(default)]
        use_root: bool,
        #[serde(default)]
        timeout: Option<u64>,
        #[serde(default)]
        description: String,
    },
}

impl Step {
    pub fn type_name(&self) -> &'static str {
        match self {
            Step::Click { .. } => "click",
            Step::Input { .. } => "input",
            Step::Swipe { .. } => "swipe",
            Step::Wait { .. } => "wait",
            Step::Condition { .. } => "condition",
            Step::Loop { .. } => "loop",
            Step::Shell { .. } => "shell",
        }
    }
}

impl TaskScript {
    /// Convert with a [`DefaultTaskConverter`] built from this script's config
    pub fn to_tasks(&self) -> Vec<Task> {
        self.to_tasks_with(&DefaultTaskConverter::new(self.config.clone()))
    }

    /// Flatten enabled groups into executable tasks, in script order
    pub fn to_tasks_with(&self, converter: &dyn TaskConverter) -> Vec<Task> {
        let mut tasks = Vec::new();
        for group in &self.tasks {
            if !group.enabled {
                debug!("Skipping disabled group '{}'", group.name);
                continue;
            }

            let group_tasks: Vec<Task> = group
                .steps
                .iter()
                .flat_map(|step| converter.convert(step, &self.variables))
                .collect();

            if group.needs_wrapper() {
                let wrapper = GroupWrapperTask::new(group.name.clone(), group_tasks)
                    .with_condition(group.condition.clone())
                    .with_repeat(group.repeat)
                    .with_interval(Duration::from_millis(group.interval))
                    .with_timeout(Duration::from_millis(group.timeout));
                tasks.push(
                    Task::new(format!("group_{}", group.name), TaskKind::GroupWrapper(wrapper))
                        .with_description(group.description.clone()),
                );
            } else {
                tasks.extend(group_tasks);
            }
        }
        tasks
    }

    /// Number of steps across enabled groups, including nested ones
    pub fn step_count(&self) -> usize {
        fn count(steps: &[Step]) -> usize {
            steps
                .iter()
                .map(|step| {
                    1 + match step {
                        Step::Condition {
                            then, otherwise, ..
                        } => count(then) + count(otherwise),
                        Step::Loop { steps, .. } => count(steps),
                        _ => 0,
                    }
                })
                .sum()
        }
        self.tasks
            .iter()
            .filter(|g| g.enabled)
            .map(|g| count(&g.steps))
            .sum()
    }
}
