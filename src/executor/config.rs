//! Shell interpreter configuration.

use serde::{Deserialize, Serialize};

/// Interpreters that back plain and elevated shell steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    /// Interpreter for regular shell steps (default: "sh")
    #[serde(default = "default_shell_program")]
    pub shell_program: String,

    /// Interpreter for steps with `useRoot` set (default: "su")
    #[serde(default = "default_root_program")]
    pub root_program: String,
}

fn default_shell_program() -> String {
    "sh".to_string()
}

fn default_root_program() -> String {
    "su".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell_program: default_shell_program(),
            root_program: default_root_program(),
        }
    }
}

impl ShellConfig {
    /// Interpreter to launch for a step
    pub fn interpreter(&self, elevated: bool) -> &str {
        if elevated {
            &self.root_program
        } else {
            &self.shell_program
        }
    }

    pub fn with_shell_program(mut self, program: impl Into<String>) -> Self {
        self.shell_program = program.into();
        self
    }

    pub fn with_root_program(mut self, program: impl Into<String>) -> Self {
        self.root_program = program.into();
        self
    }
}
