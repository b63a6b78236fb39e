//! Environment constants and path utilities.
//!
//! Centralizes the directory and file names autoflow looks for so the
//! discovery code and tests agree on them.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const AUTOFLOW_DIR_NAME: &str = ".autoflow";

/// Configuration file name inside [`AUTOFLOW_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file name in a project root
pub const LOCAL_CONFIG_FILE_NAME: &str = "autoflow.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/autoflow/config.toml";

/// Default `tracing` filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "autoflow=info";

/// Test-related constants
pub mod test {
    /// Default test directory path for temporary operations
    pub const DEFAULT_TEST_DIR: &str = "/tmp";
}

/// Build the .autoflow directory path from a root directory
pub fn autoflow_dir_path(root: &Path) -> PathBuf {
    root.join(AUTOFLOW_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    autoflow_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the `.autoflow/config.toml` path in a project directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    autoflow_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the `autoflow.toml` path in a project directory
pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}
