//! # Automation Scripts
//!
//! Declarative scripts (JSON, YAML or TOML) describing groups of UI steps,
//! and their conversion into executable [`Task`](crate::task::Task) trees.
//!
//! ```no_run
//! use autoflow::script::ScriptParserFactory;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let content = std::fs::read_to_string("flows/login.yaml")?;
//! let script = ScriptParserFactory::for_file("flows/login.yaml")?.parse(&content)?;
//! let tasks = script.to_tasks();
//! println!("{} tasks", tasks.len());
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod model;
pub mod parser;
pub mod variables;

pub use converter::{ConversionError, DefaultTaskConverter, TaskConverter};
pub use model::{AppInfo, ScriptConfig, ScriptMetadata, Step, TaskGroup, TaskScript};
pub use parser::{
    JsonScriptParser, ScriptParser, ScriptParserFactory, TomlScriptParser, YamlScriptParser,
};
pub use variables::{Variables, substitute};

use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Unsupported script format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} script: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Script file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    pub fn parse(format: &'static str, error: impl Display) -> Self {
        ScriptError::Parse {
            format,
            message: error.to_string(),
        }
    }
}

/// Read and parse a script file, choosing the parser by extension
pub async fn load_script(path: impl AsRef<Path>) -> Result<TaskScript, ScriptError> {
    let path = path.as_ref();
    let parser = ScriptParserFactory::for_file(path)?;
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScriptError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parser.parse(&content)
}
