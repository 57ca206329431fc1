// ============================================================================
// Linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackweave
//!
//! Dependency-ordered, concurrent deployment and teardown of infrastructure
//! stacks.
//!
//! ## Overview
//!
//! A project declares stacks, the stacks they depend on, and configuration
//! values that may be computed lazily (environment variables, other stacks'
//! parameters, joined lists). Stackweave:
//!
//! - Orders stacks into batches from their dependency graph
//! - Runs each batch concurrently under a worker limit
//! - Resolves configuration on demand, detecting reference cycles
//! - Runs `before_*`/`after_*` hooks around every stack action
//!
//! ## Architecture
//!
//! 1. **Project file**: `stackweave.yaml`, with resolvers and hooks as YAML tags
//! 2. **Stacks**: bound configuration, resolved through a [`ResolveContext`]
//! 3. **Plan**: phases of topological batches, oriented per command
//! 4. **Executor**: runs batches in order and stacks concurrently
//! 5. **Provisioner**: the backend that actually creates stacks
//!
//! ## Modules
//!
//! - [`config`]: Project file parsing, validation and loading
//! - [`stack`]: Stacks and their execution status
//! - [`resolver`]: Lazy value resolution and built-in value sources
//! - [`hooks`]: Hooks and the hook runner
//! - [`registry`]: Name-to-plugin registries
//! - [`planner`]: Dependency graph, plans and the batch executor
//! - [`provider`]: Provisioner trait, local provisioner, lock file
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: networking
//!   max_concurrency: 4
//!
//! stacks:
//!   - name: vpc
//!     template: templates/vpc.yaml
//!     parameters:
//!       Cidr: 10.0.0.0/16
//!       Region: !env AWS_REGION
//!   - name: app
//!     dependencies: [vpc]
//!     parameters:
//!       VpcCidr: !stack_param vpc::Cidr
//!     hooks:
//!       before_create:
//!         - !cmd "echo deploying app"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod planner;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigLoader, ConfigParser, ConfigValidator, ProjectFile};
pub use error::{Result, StackweaveError};
pub use hooks::{Hook, HookRunner};
pub use planner::{Command, ExecutionPlan, ExecutionReport, PlanExecutor, StackActions};
pub use provider::{LocalProvisioner, Provisioner};
pub use registry::{HookRegistry, ResolverRegistry};
pub use resolver::{RawValue, ResolveContext, Resolver};
pub use stack::{Stack, StackSet, StackStatus};
