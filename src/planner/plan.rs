//! Execution plans.
//!
//! A plan is one or more phases. Each phase runs one per-stack action over a
//! dependency graph, batch by batch. Every command has a single phase except
//! `launch`, which first deletes stacks marked for deletion and then deploys
//! the rest.

use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::stack::{Disposition, StackSet};

use super::graph::StackGraph;

/// A command over a set of stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Create stacks.
    Create,
    /// Update existing stacks.
    Update,
    /// Create or update stacks according to their disposition.
    Launch,
    /// Delete stacks.
    Delete,
    /// Report provider status.
    Describe,
}

/// Graph orientation used by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dependencies before dependents.
    Forward,
    /// Dependents before dependencies.
    Reverse,
}

impl Command {
    /// Graph orientation for this command.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Delete => Direction::Reverse,
            Self::Create | Self::Update | Self::Launch | Self::Describe => Direction::Forward,
        }
    }

    /// Returns true if the command changes provider state.
    #[must_use]
    pub const fn mutates(self) -> bool {
        !matches!(self, Self::Describe)
    }

    /// Lowercase name, also used as the hook operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Launch => "launch",
            Self::Delete => "delete",
            Self::Describe => "describe",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action run over one graph.
#[derive(Debug, Clone)]
pub struct PlanPhase {
    /// Action run for every stack of the phase.
    pub action: Command,
    /// Graph the batches were computed from; also used for dependency checks.
    pub graph: StackGraph,
    /// Topological batches.
    pub batches: Vec<Vec<String>>,
}

impl PlanPhase {
    fn new(action: Command, graph: StackGraph) -> Self {
        let batches = graph.layers();
        Self {
            action,
            graph,
            batches,
        }
    }

    /// Number of stacks in the phase.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns true if the phase has no stacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Phases of one command.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// The command the plan implements.
    pub command: Command,
    /// Phases, run in order.
    pub phases: Vec<PlanPhase>,
}

impl ExecutionPlan {
    /// Plans `command` over `targets`, or over every stack when `targets`
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns graph errors (cycles, unknown names, and for `launch` a
    /// deployed stack depending on one marked for deletion).
    pub fn build(stacks: &StackSet, command: Command, targets: &[String]) -> Result<Self> {
        let phases = if command == Command::Launch {
            plan_launch(stacks, targets)?
        } else {
            vec![compute_batches(stacks, command, targets)?]
        };
        Ok(Self { command, phases })
    }

    /// Total number of stacks across phases.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.phases.iter().map(PlanPhase::len).sum()
    }
}

/// Builds the full dependency graph of a stack set.
///
/// # Errors
///
/// Returns an error for unknown dependencies and cycles.
pub fn build_graph(stacks: &StackSet) -> std::result::Result<StackGraph, GraphError> {
    StackGraph::build(stacks.iter().map(|stack| {
        (
            stack.name(),
            stack.dependencies().iter().map(String::as_str),
        )
    }))
}

/// Computes the single-phase batches of `command`.
///
/// The graph is oriented for the command, then narrowed to the targets and
/// everything they transitively depend on in that orientation.
///
/// # Errors
///
/// Returns graph errors, or `UnknownStack` for an unknown target.
pub fn compute_batches(
    stacks: &StackSet,
    command: Command,
    targets: &[String],
) -> Result<PlanPhase> {
    let forward = build_graph(stacks)?;
    let oriented = match command.direction() {
        Direction::Forward => forward,
        Direction::Reverse => forward.reverse(),
    };
    let graph = narrow(&oriented, targets)?;
    Ok(PlanPhase::new(command, graph))
}

/// Plans `launch`: a deletion phase over stacks marked `delete`, then a
/// launch phase over the rest.
///
/// # Errors
///
/// Returns `DependencyDoesNotExist` if a stack to deploy depends on a stack
/// marked for deletion, or any graph error.
pub fn plan_launch(stacks: &StackSet, targets: &[String]) -> Result<Vec<PlanPhase>> {
    let forward = narrow(&build_graph(stacks)?, targets)?;

    let disposition = |name: &str| {
        stacks
            .get(name)
            .map_or(Disposition::Deploy, |stack| stack.disposition())
    };

    let doomed: BTreeSet<&str> = forward
        .nodes()
        .filter(|&name| disposition(name) == Disposition::Delete)
        .collect();

    for name in forward.nodes() {
        if disposition(name) != Disposition::Deploy {
            continue;
        }
        if let Some(dependency) = forward.dependencies_of(name).find(|d| doomed.contains(d)) {
            return Err(GraphError::DependencyDoesNotExist {
                stack: name.to_string(),
                dependency: dependency.to_string(),
            }
            .into());
        }
    }

    let mut deletions = forward.reverse();
    let mut deployments = forward.clone();
    for name in forward.nodes() {
        if doomed.contains(name) {
            deployments.remove(name);
        } else {
            deletions.remove(name);
        }
    }

    let mut phases = Vec::with_capacity(2);
    if !deletions.is_empty() {
        phases.push(PlanPhase::new(Command::Delete, deletions));
    }
    if !deployments.is_empty() || phases.is_empty() {
        phases.push(PlanPhase::new(Command::Launch, deployments));
    }
    Ok(phases)
}

fn narrow(graph: &StackGraph, targets: &[String]) -> std::result::Result<StackGraph, GraphError> {
    if targets.is_empty() {
        Ok(graph.clone())
    } else {
        graph.restrict_to(targets.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackweaveError;
    use crate::stack::{Stack, StackDefinition};

    fn stacks(defs: &[(&str, &[&str], Disposition)]) -> StackSet {
        let mut set = StackSet::new();
        for (name, deps, disposition) in defs {
            let mut definition = StackDefinition::named(*name);
            definition.dependencies = deps.iter().map(|d| (*d).to_string()).collect();
            definition.disposition = *disposition;
            set.insert(Stack::from_definition(definition).expect("bind failed"))
                .expect("insert failed");
        }
        set
    }

    fn names(batches: &[Vec<String>]) -> Vec<Vec<&str>> {
        batches
            .iter()
            .map(|b| b.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_delete_uses_reversed_graph() {
        let set = stacks(&[
            ("vpc", &[], Disposition::Deploy),
            ("db", &["vpc"], Disposition::Deploy),
        ]);
        let create = compute_batches(&set, Command::Create, &[]).expect("plan");
        assert_eq!(names(&create.batches), vec![vec!["vpc"], vec!["db"]]);

        let delete = compute_batches(&set, Command::Delete, &[]).expect("plan");
        assert_eq!(names(&delete.batches), vec![vec!["db"], vec!["vpc"]]);
    }

    #[test]
    fn test_targets_pull_in_dependencies() {
        let set = stacks(&[
            ("vpc", &[], Disposition::Deploy),
            ("db", &["vpc"], Disposition::Deploy),
            ("dns", &[], Disposition::Deploy),
        ]);
        let phase = compute_batches(&set, Command::Update, &[String::from("db")]).expect("plan");
        assert_eq!(names(&phase.batches), vec![vec!["vpc"], vec!["db"]]);

        let err = compute_batches(&set, Command::Update, &[String::from("ghost")])
            .expect_err("unknown target");
        assert!(matches!(err, StackweaveError::Graph(GraphError::UnknownStack { .. })));
    }

    #[test]
    fn test_launch_rejects_dependency_on_deleted_stack() {
        let set = stacks(&[
            ("a", &[], Disposition::Delete),
            ("b", &["a"], Disposition::Deploy),
        ]);
        let err = ExecutionPlan::build(&set, Command::Launch, &[]).expect_err("must fail");
        assert!(matches!(
            err,
            StackweaveError::Graph(GraphError::DependencyDoesNotExist { ref stack, ref dependency })
                if stack == "b" && dependency == "a"
        ));
    }

    #[test]
    fn test_launch_deletes_before_deploying() {
        let set = stacks(&[
            ("old", &[], Disposition::Delete),
            ("old-child", &["old"], Disposition::Delete),
            ("vpc", &[], Disposition::Deploy),
            ("manual", &["vpc"], Disposition::Skip),
        ]);
        let plan = ExecutionPlan::build(&set, Command::Launch, &[]).expect("plan");

        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.phases[0].action, Command::Delete);
        assert_eq!(names(&plan.phases[0].batches), vec![vec!["old-child"], vec!["old"]]);
        assert_eq!(plan.phases[1].action, Command::Launch);
        assert_eq!(names(&plan.phases[1].batches), vec![vec!["vpc"], vec!["manual"]]);
        assert_eq!(plan.stack_count(), 4);
    }

    #[test]
    fn test_cycle_aborts_planning() {
        let set = stacks(&[
            ("a", &["b"], Disposition::Deploy),
            ("b", &["a"], Disposition::Deploy),
        ]);
        let err = ExecutionPlan::build(&set, Command::Create, &[]).expect_err("cycle");
        assert!(matches!(err, StackweaveError::Graph(GraphError::CircularDependency { .. })));
    }

    #[test]
    fn test_command_direction() {
        assert_eq!(Command::Delete.direction(), Direction::Reverse);
        assert_eq!(Command::Launch.direction(), Direction::Forward);
        assert!(!Command::Describe.mutates());
        assert_eq!(Command::Launch.to_string(), "launch");
    }
}
