//! CLI module for the stackweave tool.
//!
//! This module provides the command-line interface for planning and running
//! commands over a project's stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, RunArgs};
pub use output::OutputFormatter;
