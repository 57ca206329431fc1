//! Stackweave CLI entrypoint.
//!
//! This is the main entrypoint for the stackweave command-line tool.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stackweave::cli::{Cli, Commands, OutputFormat, OutputFormatter, RunArgs};
use stackweave::config::{
    ConfigLoader, ConfigParser, ConfigValidator, ProjectFile, find_config_file,
};
use stackweave::error::{GraphError, Result};
use stackweave::planner::{Command, ExecutionPlan, PlanExecutor, StackActions};
use stackweave::provider::{
    LocalProvisioner, LockFile, Provisioner, WaitPolicy, generate_holder_id,
};
use stackweave::resolver::ResolveContext;
use stackweave::stack::StackSet;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.output == OutputFormat::Json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match &cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, *warnings, &formatter),
        Commands::Plan { stacks, command } => {
            cmd_plan(config_path, *command, stacks, &formatter).map(|()| ExitCode::SUCCESS)
        }
        Commands::Render { stacks } => {
            cmd_render(config_path, stacks, &formatter).map(|()| ExitCode::SUCCESS)
        }
        Commands::Create(args) => cmd_execute(config_path, Command::Create, args, &formatter).await,
        Commands::Update(args) => cmd_execute(config_path, Command::Update, args, &formatter).await,
        Commands::Launch(args) => cmd_execute(config_path, Command::Launch, args, &formatter).await,
        Commands::Delete(args) => cmd_execute(config_path, Command::Delete, args, &formatter).await,
        Commands::Describe(args) => {
            cmd_execute(config_path, Command::Describe, args, &formatter).await
        }
    }
}

/// Validate the project file.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(project_dir(&config_file));
    let file = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().check(&file);
    if result.is_valid() {
        // Surfaces unknown tags and rejected resolver arguments.
        ConfigLoader::new().load(&file)?;
    }

    println!("{}", formatter.format_validation(&file, &result, show_warnings));

    Ok(if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Show the batches of a command.
fn cmd_plan(
    config_path: Option<&PathBuf>,
    command: Command,
    targets: &[String],
    formatter: &OutputFormatter,
) -> Result<()> {
    let project = load_project(config_path)?;
    let plan = ExecutionPlan::build(&project.stacks, command, targets)?;
    println!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Resolve stack configuration with placeholders for unresolvable values.
fn cmd_render(
    config_path: Option<&PathBuf>,
    targets: &[String],
    formatter: &OutputFormatter,
) -> Result<()> {
    let project = load_project(config_path)?;
    let stacks = &project.stacks;

    let names: Vec<String> = if targets.is_empty() {
        stacks.names().map(str::to_string).collect()
    } else {
        targets.to_vec()
    };

    let mut rendered = BTreeMap::new();
    let mut ctx = ResolveContext::new(stacks);
    for name in names {
        let stack = stacks.get(&name).ok_or_else(|| GraphError::UnknownStack {
            name: name.clone(),
        })?;
        let desired = ctx.with_placeholders(|ctx| stack.desired(ctx))?;
        rendered.insert(name, desired);
    }

    println!("{}", formatter.format_render(&rendered));
    Ok(())
}

/// Run a stack command.
async fn cmd_execute(
    config_path: Option<&PathBuf>,
    command: Command,
    args: &RunArgs,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let project = load_project(config_path)?;
    let plan = ExecutionPlan::build(&project.stacks, command, &args.stacks)?;

    if plan.stack_count() == 0 {
        eprintln!("No stacks to {command}.");
        return Ok(ExitCode::SUCCESS);
    }

    if command.mutates() && !args.yes {
        eprintln!("{}", formatter.format_plan(&plan));
        eprint!("Do you want to {command} these stacks? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("{command} cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let lock_file = LockFile::in_dir(&project.state_dir);
    let lock = if command.mutates() {
        Some(lock_file.acquire(&generate_holder_id(), command.as_str()).await?)
    } else {
        None
    };

    let max_concurrency = args.max_concurrency.or(project.file.project.max_concurrency);
    let provisioner = Arc::new(LocalProvisioner::with_base_dir(&project.state_dir));
    debug!("Using {} provisioner", provisioner.backend_type());
    let actions = Arc::new(StackActions::new(
        Arc::clone(&project.stacks),
        provisioner,
        WaitPolicy::default(),
    ));

    let report = PlanExecutor::new(max_concurrency)
        .execute_plan(&plan, actions)
        .await;

    if let Some(lock) = lock
        && let Err(e) = lock_file.release(&lock.lock_id).await
    {
        warn!("Failed to release state lock: {e}");
    }

    println!("{}", formatter.format_report(&report));

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ============================================================================
// Helper Functions
// ============================================================================

/// A loaded and validated project.
struct Project {
    file: ProjectFile,
    stacks: Arc<StackSet>,
    state_dir: PathBuf,
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

fn project_dir(config_file: &Path) -> &Path {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Loads, validates and binds the project.
fn load_project(config_path: Option<&PathBuf>) -> Result<Project> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base = project_dir(&config_file);
    let parser = ConfigParser::new().with_base_path(base);
    let file = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&file)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let stacks = ConfigLoader::new().load(&file)?;
    let state_dir = base.join(file.project.state_dir());

    Ok(Project {
        file,
        stacks: Arc::new(stacks),
        state_dir,
    })
}
