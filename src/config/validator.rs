//! Project file validation.
//!
//! Collects every problem in one pass instead of stopping at the first, so
//! `stackweave validate` can report them together.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{ConfigError, GraphError, Result, StackweaveError};
use crate::hooks::split_point;
use crate::planner::StackGraph;

use super::spec::{ProjectConfig, ProjectFile, StackConfig};

/// Validator for project files.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a project file.
    ///
    /// # Errors
    ///
    /// Returns the first error as a `ValidationError` if any check failed.
    pub fn validate(&self, file: &ProjectFile) -> Result<ValidationResult> {
        let result = self.check(file);

        if let Some(first_error) = result.errors.first() {
            return Err(StackweaveError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Runs every check and returns all findings.
    #[must_use]
    pub fn check(&self, file: &ProjectFile) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_project(&file.project, &mut result);
        Self::validate_stacks(&file.stacks, &mut result);
        if result.errors.is_empty() {
            Self::validate_graph(&file.stacks, &mut result);
        }
        result
    }

    fn validate_project(project: &ProjectConfig, result: &mut ValidationResult) {
        if project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            );
        }

        if let Some(limit) = project.max_concurrency
            && limit <= 0
        {
            result.warnings.push(format!(
                "project.max_concurrency is {limit}; batches will run unbounded"
            ));
        }
    }

    fn validate_stacks(stacks: &[StackConfig], result: &mut ValidationResult) {
        if stacks.is_empty() {
            result.warnings.push(String::from("No stacks defined in configuration"));
            return;
        }

        let names: HashSet<&str> = stacks.iter().map(|s| s.name.as_str()).collect();
        let mut seen_names = HashSet::new();

        for (i, stack) in stacks.iter().enumerate() {
            let prefix = format!("stacks[{i}]");

            if !seen_names.insert(stack.name.as_str()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate stack name: {}", stack.name),
                );
            }

            if !is_valid_name(&stack.name) {
                result.error(
                    format!("{prefix}.name"),
                    format!(
                        "Stack name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        stack.name
                    ),
                );
            }

            let mut seen_deps = HashSet::new();
            for dependency in &stack.dependencies {
                if dependency == &stack.name {
                    result
                        .warnings
                        .push(format!("Stack '{}' depends on itself; ignored", stack.name));
                } else if !names.contains(dependency.as_str()) {
                    result.error(
                        format!("{prefix}.dependencies"),
                        format!(
                            "Stack '{}' depends on unknown stack '{dependency}'",
                            stack.name
                        ),
                    );
                }
                if !seen_deps.insert(dependency.as_str()) {
                    result.warnings.push(format!(
                        "Stack '{}' lists dependency '{dependency}' more than once",
                        stack.name
                    ));
                }
            }

            for point in stack.hooks.keys() {
                if split_point(point).is_none() {
                    result.error(
                        format!("{prefix}.hooks.{point}"),
                        format!(
                            "Hook point '{point}' must start with 'before_' or 'after_' followed by an operation"
                        ),
                    );
                }
            }
        }
    }

    fn validate_graph(stacks: &[StackConfig], result: &mut ValidationResult) {
        let graph = StackGraph::build(stacks.iter().map(|s| {
            (
                s.name.as_str(),
                s.dependencies.iter().map(String::as_str),
            )
        }));
        if let Err(e @ GraphError::CircularDependency { .. }) = graph {
            result.error("stacks", e.to_string());
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
