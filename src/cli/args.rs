//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `run`: Execute an automation script (JSON, YAML or TOML)
//! - `validate`: Parse a script and print the task tree it converts to
//! - `show-config`: Show configuration discovery information

use crate::script::{ScriptError, ScriptParserFactory};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    Validate(ValidateConfig),
    ShowConfig,
}

#[derive(Debug)]
pub struct RunConfig {
    pub script: PathBuf,
    pub config_override: Option<PathBuf>,
    pub verbose: bool,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct ValidateConfig {
    pub script: PathBuf,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "autoflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs declarative UI automation scripts on a prioritized task executor")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute an automation script
    Run {
        /// Path to the script (.json, .yaml, .yml or .toml)
        script: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
        /// Show what would be executed without running
        #[arg(short = 'n', long = "dry-run")]
        dry_run: bool,
    },
    /// Parse a script and print its task tree
    Validate {
        /// Path to the script
        script: PathBuf,
        /// Also print each group's settings
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                script,
                config,
                verbose,
                dry_run,
            }) => {
                Self::check_script_format(script).map_err(|e| e.to_string())?;
                Ok(ExecutionMode::Run(RunConfig {
                    script: script.clone(),
                    config_override: config.clone(),
                    verbose: *verbose,
                    dry_run: *dry_run,
                }))
            }
            Some(Commands::Validate { script, verbose }) => {
                Self::check_script_format(script).map_err(|e| e.to_string())?;
                Ok(ExecutionMode::Validate(ValidateConfig {
                    script: script.clone(),
                    verbose: *verbose,
                }))
            }
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err(
                "No command specified. Use 'autoflow --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    /// Reject scripts no parser handles before doing any work
    ///
    /// Note: Extension matching is case-insensitive
    fn check_script_format(path: &Path) -> Result<(), ScriptError> {
        ScriptParserFactory::for_file(path).map(|_| ())
    }
}
