//! Error types for the stackweave orchestration system.
//!
//! This module provides the error hierarchy for every stage of a command:
//! configuration loading, graph construction, value resolution, hooks,
//! provisioning, and plan execution.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stackweave.
#[derive(Debug, Error)]
pub enum StackweaveError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dependency graph errors.
    #[error("Dependency graph error: {0}")]
    Graph(#[from] GraphError),

    /// Value resolution errors.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Hook execution errors.
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// Provisioner errors.
    #[error("Provisioner error: {0}")]
    Provider(#[from] ProviderError),

    /// Planning and execution errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate stack definition.
    #[error("Duplicate stack name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// A YAML tag names a resolver that is not registered.
    #[error("Unknown resolver '!{name}'")]
    UnknownResolver {
        /// Tag name without the leading `!`.
        name: String,
    },

    /// A YAML tag names a hook that is not registered.
    #[error("Unknown hook '!{name}'")]
    UnknownHook {
        /// Tag name without the leading `!`.
        name: String,
    },
}

/// Dependency graph errors.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Adding an edge would have closed a cycle.
    #[error("Circular dependency detected between '{from}' and '{to}'")]
    CircularDependency {
        /// The dependency side of the rejected edge.
        from: String,
        /// The dependent side of the rejected edge.
        to: String,
    },

    /// A stack depends on a stack that does not exist or is being removed.
    #[error("Stack '{stack}' depends on '{dependency}', which does not exist")]
    DependencyDoesNotExist {
        /// The dependent stack.
        stack: String,
        /// The missing dependency.
        dependency: String,
    },

    /// A stack name was not found in the graph.
    #[error("Unknown stack: {name}")]
    UnknownStack {
        /// The requested name.
        name: String,
    },
}

/// Value resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A resolution chain re-entered a property it was already resolving.
    #[error("Recursive resolve detected on '{stack}.{property}'")]
    RecursiveResolve {
        /// Stack owning the property.
        stack: String,
        /// Property being resolved.
        property: String,
    },

    /// A resolver could not produce a value.
    #[error("Resolver !{resolver} failed: {message}")]
    Unresolvable {
        /// Resolver type name.
        resolver: String,
        /// Description of the failure.
        message: String,
    },

    /// A resolver received an argument it cannot use.
    #[error("Invalid argument for !{resolver}: {message}")]
    InvalidArgument {
        /// Resolver type name.
        resolver: String,
        /// Description of the problem.
        message: String,
    },

    /// A resolver was invoked before being bound to a stack.
    #[error("Resolver !{resolver} is not bound to a stack")]
    Unbound {
        /// Resolver type name.
        resolver: String,
    },

    /// A stack referenced during resolution does not exist.
    #[error("Unknown stack '{name}' referenced during resolution")]
    UnknownStack {
        /// The requested name.
        name: String,
    },

    /// A stack attribute does not exist.
    #[error("Stack '{stack}' has no attribute '{attribute}'")]
    UnknownAttribute {
        /// The stack.
        stack: String,
        /// The requested attribute path.
        attribute: String,
    },

    /// A resolved property has the wrong shape.
    #[error("Property '{stack}.{property}' must resolve to {expected}")]
    Shape {
        /// The stack.
        stack: String,
        /// The property.
        property: String,
        /// Description of the expected shape.
        expected: &'static str,
    },
}

/// Hook execution errors.
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook command exited unsuccessfully.
    #[error("Hook '{hook}' command `{command}` exited with status {code}")]
    CommandFailed {
        /// Hook point (e.g. `before_create`).
        hook: String,
        /// The command that ran.
        command: String,
        /// Exit code, or -1 when terminated by a signal.
        code: i32,
    },

    /// A hook command could not be started.
    #[error("Hook '{hook}' could not start `{command}`: {message}")]
    Spawn {
        /// Hook point.
        hook: String,
        /// The command.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// A hook received an argument it cannot use.
    #[error("Invalid argument for hook !{hook}: {message}")]
    InvalidArgument {
        /// Hook type name.
        hook: String,
        /// Description of the problem.
        message: String,
    },

    /// The hook argument could not be resolved.
    #[error("Failed to resolve hook argument: {0}")]
    Resolve(#[from] ResolveError),
}

/// Provisioner errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The target stack does not exist.
    #[error("Stack does not exist: {stack}")]
    NotFound {
        /// The stack name.
        stack: String,
    },

    /// The provider rejected or failed the request.
    #[error("Request for stack '{stack}' failed: {message}")]
    RequestFailed {
        /// The stack name.
        stack: String,
        /// Description of the failure.
        message: String,
    },

    /// Timed out waiting for a terminal status.
    #[error("Timeout waiting for stack {stack} to reach a terminal status (last: {last_status})")]
    Timeout {
        /// The stack name.
        stack: String,
        /// Last status observed.
        last_status: String,
    },

    /// Stored provider state is unreadable.
    #[error("Provider state is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Provider serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// The state is locked by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },
}

/// Planning and execution errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A stack was not run because a dependency did not complete.
    #[error("Dependency '{dependency}' of '{stack}' did not complete")]
    DependencyFailed {
        /// The skipped stack.
        stack: String,
        /// The dependency that did not complete.
        dependency: String,
    },

    /// A stack action failed.
    #[error("Action for stack '{stack}' failed: {reason}")]
    ActionFailed {
        /// The stack name.
        stack: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Result type alias for stackweave operations.
pub type Result<T> = std::result::Result<T, StackweaveError>;

impl StackweaveError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a recursive-resolve failure.
    #[must_use]
    pub const fn is_recursive_resolve(&self) -> bool {
        matches!(
            self,
            Self::Resolve(ResolveError::RecursiveResolve { .. })
                | Self::Hook(HookError::Resolve(ResolveError::RecursiveResolve { .. }))
        )
    }

    /// Returns true if the provider reported that the target does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error without a source location.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }
}

impl ResolveError {
    /// Returns true for errors that placeholder mode must never swallow.
    #[must_use]
    pub const fn is_recursive(&self) -> bool {
        matches!(self, Self::RecursiveResolve { .. })
    }

    /// Creates an unresolvable-value error.
    #[must_use]
    pub fn unresolvable(resolver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unresolvable {
            resolver: resolver.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(resolver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            resolver: resolver.into(),
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates a request failure.
    #[must_use]
    pub fn request(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            stack: stack.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}
