//! Planning and execution of commands over a stack set.
//!
//! The dependency graph is layered into batches, batches run in order, and
//! the stacks of one batch run concurrently under a worker limit.

mod actions;
mod executor;
mod graph;
mod plan;

pub use actions::StackActions;
pub use executor::{
    ActionOutcome, BatchReport, ExecutionReport, PlanExecutor, StackAction, StackReport,
};
pub use graph::StackGraph;
pub use plan::{
    Command, Direction, ExecutionPlan, PlanPhase, build_graph, compute_batches, plan_launch,
};
