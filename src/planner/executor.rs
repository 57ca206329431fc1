//! Batch executor.
//!
//! Runs the batches of a [`PlanPhase`] strictly in order. Stacks inside a
//! batch run concurrently on at most `min(batch size, max_concurrency)`
//! workers. A stack whose dependency did not complete is failed without
//! running its action.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{PlanError, Result};
use crate::stack::StackStatus;

use super::plan::{Command, ExecutionPlan, PlanPhase};

/// Result of one stack action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// `Complete` or `Failed`.
    pub status: StackStatus,
    /// Provider status or other detail.
    pub message: String,
}

impl ActionOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: StackStatus::Complete,
            message: message.into(),
        }
    }

    /// A declared failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: StackStatus::Failed,
            message: message.into(),
        }
    }
}

/// Per-stack action run by the executor.
#[async_trait]
pub trait StackAction: Send + Sync {
    /// Runs `command` for the stack named `stack`.
    ///
    /// # Errors
    ///
    /// Any error fails the stack; it never affects other stacks.
    async fn run(&self, command: Command, stack: &str) -> Result<ActionOutcome>;
}

/// Final state of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackReport {
    /// Terminal status.
    pub status: StackStatus,
    /// Detail shown to the user.
    pub message: String,
}

/// What happened in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Action of the phase the batch belongs to.
    pub action: Command,
    /// Stacks in the batch.
    pub stacks: Vec<String>,
    /// Number of concurrent workers the batch was allowed.
    pub workers: usize,
}

/// Outcome of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Per-stack results.
    pub stacks: BTreeMap<String, StackReport>,
    /// Per-batch details, in execution order.
    pub batches: Vec<BatchReport>,
}

impl ExecutionReport {
    /// Returns true if every stack completed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.stacks
            .values()
            .all(|report| report.status == StackStatus::Complete)
    }

    /// Process exit code: 0 if every stack completed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success())
    }

    /// Number of stacks with the given status.
    #[must_use]
    pub fn count(&self, status: StackStatus) -> usize {
        self.stacks.values().filter(|r| r.status == status).count()
    }

    /// Status of one stack.
    #[must_use]
    pub fn status_of(&self, stack: &str) -> Option<StackStatus> {
        self.stacks.get(stack).map(|r| r.status)
    }

    fn merge(&mut self, other: Self) {
        self.stacks.extend(other.stacks);
        self.batches.extend(other.batches);
    }
}

type StatusBoard = Arc<RwLock<HashMap<String, StackReport>>>;

/// Executes plans with bounded concurrency.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanExecutor {
    max_concurrency: Option<i64>,
}

impl PlanExecutor {
    /// Creates an executor. `None`, zero or a negative limit means unbounded.
    #[must_use]
    pub const fn new(max_concurrency: Option<i64>) -> Self {
        Self { max_concurrency }
    }

    /// Number of workers for a batch of `batch_size` stacks.
    #[must_use]
    pub fn workers_for(&self, batch_size: usize) -> usize {
        match self.max_concurrency {
            Some(limit) if limit > 0 => {
                batch_size.min(usize::try_from(limit).unwrap_or(usize::MAX))
            }
            _ => batch_size,
        }
    }

    /// Executes every phase of `plan` in order.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        action: Arc<dyn StackAction>,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for phase in &plan.phases {
            let phase_report = self.execute(phase, Arc::clone(&action)).await;
            report.merge(phase_report);
        }
        info!(
            command = %plan.command,
            complete = report.count(StackStatus::Complete),
            failed = report.count(StackStatus::Failed),
            "Plan finished"
        );
        report
    }

    /// Executes one phase.
    pub async fn execute(
        &self,
        phase: &PlanPhase,
        action: Arc<dyn StackAction>,
    ) -> ExecutionReport {
        let board: StatusBoard = Arc::new(RwLock::new(
            phase
                .graph
                .nodes()
                .map(|name| {
                    (
                        name.to_string(),
                        StackReport {
                            status: StackStatus::Pending,
                            message: String::new(),
                        },
                    )
                })
                .collect(),
        ));

        let mut batches = Vec::with_capacity(phase.batches.len());
        for (index, batch) in phase.batches.iter().enumerate() {
            let workers = self.workers_for(batch.len());
            let span = info_span!(
                "batch",
                action = %phase.action,
                index,
                size = batch.len(),
                workers
            );
            Self::run_batch(phase, batch, workers, &action, &board)
                .instrument(span)
                .await;
            batches.push(BatchReport {
                action: phase.action,
                stacks: batch.clone(),
                workers,
            });
        }

        let stacks = board.read().await.clone().into_iter().collect();
        ExecutionReport { stacks, batches }
    }

    async fn run_batch(
        phase: &PlanPhase,
        batch: &[String],
        workers: usize,
        action: &Arc<dyn StackAction>,
        board: &StatusBoard,
    ) {
        debug!("Starting batch");
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        for name in batch {
            if let Some(dependency) = Self::unfinished_dependency(phase, name, board).await {
                let reason = PlanError::DependencyFailed {
                    stack: name.clone(),
                    dependency,
                };
                warn!(stack = %name, "{reason}");
                set_status(board, name, StackStatus::Failed, reason.to_string()).await;
                continue;
            }

            let name_owned = name.clone();
            let semaphore = Arc::clone(&semaphore);
            let action = Arc::clone(action);
            let board = Arc::clone(board);
            let command = phase.action;
            let span = info_span!("stack", stack = %name);

            let handle = tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return ActionOutcome::failed("worker pool closed");
                    };
                    set_status(&board, &name_owned, StackStatus::InProgress, String::new()).await;
                    info!("Running {command}");

                    let outcome = match action.run(command, &name_owned).await {
                        Ok(outcome) => outcome,
                        Err(e) => ActionOutcome::failed(e.to_string()),
                    };
                    set_status(&board, &name_owned, outcome.status, outcome.message.clone()).await;
                    outcome
                }
                .instrument(span),
            );
            names.insert(handle.id(), name.clone());
        }

        collect_results(&mut tasks, &names, board).await;
    }

    async fn unfinished_dependency(
        phase: &PlanPhase,
        name: &str,
        board: &StatusBoard,
    ) -> Option<String> {
        let statuses = board.read().await;
        phase
            .graph
            .dependencies_of(name)
            .find(|dep| {
                statuses
                    .get(*dep)
                    .is_none_or(|report| report.status != StackStatus::Complete)
            })
            .map(str::to_string)
    }
}

/// Waits for every task of a batch. A panicking task fails its stack.
async fn collect_results(
    tasks: &mut JoinSet<ActionOutcome>,
    names: &HashMap<tokio::task::Id, String>,
    board: &StatusBoard,
) {
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, outcome)) => {
                if let Some(name) = names.get(&id) {
                    match outcome.status {
                        StackStatus::Failed => warn!(stack = %name, "Failed: {}", outcome.message),
                        _ => info!(stack = %name, "{}", outcome.message),
                    }
                }
            }
            Err(join_error) => {
                let Some(name) = names.get(&join_error.id()) else {
                    error!("Unknown task failed: {join_error}");
                    continue;
                };
                error!(stack = %name, "Task panicked: {join_error}");
                set_status(board, name, StackStatus::Failed, format!("task panicked: {join_error}"))
                    .await;
            }
        }
    }
}

async fn set_status(board: &StatusBoard, name: &str, next: StackStatus, message: String) {
    let mut statuses = board.write().await;
    let Some(report) = statuses.get_mut(name) else {
        return;
    };
    if !report.status.can_transition_to(next) {
        warn!(stack = name, "Ignoring transition {} -> {next}", report.status);
        return;
    }
    report.status = next;
    report.message = message;
}
