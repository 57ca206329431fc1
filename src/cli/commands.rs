//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::Command;

/// Stackweave - dependency-ordered stack orchestration.
#[derive(Parser, Debug)]
#[command(name = "stackweave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the project file.
    #[arg(short, long, global = true, env = "STACKWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the project file.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the batches a command would run.
    Plan {
        /// Stacks to target (all stacks if empty).
        stacks: Vec<String>,

        /// Command to plan.
        #[arg(long, value_enum, default_value = "launch")]
        command: Command,
    },

    /// Resolve and print stack configuration, with placeholders for values
    /// that cannot be resolved yet.
    Render {
        /// Stacks to render (all stacks if empty).
        stacks: Vec<String>,
    },

    /// Create stacks.
    Create(RunArgs),

    /// Update existing stacks.
    Update(RunArgs),

    /// Create or update stacks according to their disposition.
    Launch(RunArgs),

    /// Delete stacks, dependents first.
    Delete(RunArgs),

    /// Show provider status of stacks.
    Describe(RunArgs),
}

/// Arguments shared by executing commands.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Stacks to target (all stacks if empty).
    pub stacks: Vec<String>,

    /// Maximum stacks running at once within a batch (zero or less means
    /// unbounded). Overrides the project file.
    #[arg(long, allow_negative_numbers = true)]
    pub max_concurrency: Option<i64>,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
