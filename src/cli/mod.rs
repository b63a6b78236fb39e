//! CLI-specific functionality for autoflow
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, ExecutionMode, RunConfig, ValidateConfig};
pub use config::ConfigDiscovery;
