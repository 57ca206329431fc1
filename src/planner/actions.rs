//! Per-stack actions backed by a [`Provisioner`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{GraphError, PlanError, ProviderError, Result, StackweaveError};
use crate::hooks::HookRunner;
use crate::provider::{
    ConfigHasher, DesiredStack, Provisioner, StackDescription, WaitPolicy, wait_for_terminal,
};
use crate::resolver::ResolveContext;
use crate::stack::{Disposition, Stack, StackSet, StackStatus};

use super::executor::{ActionOutcome, StackAction};
use super::plan::Command;

/// Runs commands against a provisioner, wrapping each in the stack's hooks.
pub struct StackActions {
    stacks: Arc<StackSet>,
    provisioner: Arc<dyn Provisioner>,
    wait: WaitPolicy,
}

impl StackActions {
    /// Creates the action set.
    #[must_use]
    pub fn new(stacks: Arc<StackSet>, provisioner: Arc<dyn Provisioner>, wait: WaitPolicy) -> Self {
        Self {
            stacks,
            provisioner,
            wait,
        }
    }

    fn stack(&self, name: &str) -> Result<&Stack> {
        self.stacks
            .get(name)
            .map(|stack| &**stack)
            .ok_or_else(|| GraphError::UnknownStack {
                name: name.to_string(),
            }
            .into())
    }

    fn desired(&self, stack: &Stack) -> Result<DesiredStack> {
        let mut ctx = ResolveContext::new(&self.stacks);
        Ok(stack.desired(&mut ctx)?)
    }

    async fn create(&self, stack: &Stack, aliases: &[&str]) -> Result<ActionOutcome> {
        HookRunner::new(&self.stacks, stack)
            .wrap_with_aliases("create", aliases, async {
                let desired = self.desired(stack)?;
                self.provisioner.create(&desired).await?;
                let settled =
                    wait_for_terminal(self.provisioner.as_ref(), stack.name(), self.wait).await?;
                Ok::<_, StackweaveError>(outcome(&settled))
            })
            .await
    }

    async fn update(&self, stack: &Stack, aliases: &[&str]) -> Result<ActionOutcome> {
        HookRunner::new(&self.stacks, stack)
            .wrap_with_aliases("update", aliases, async {
                let desired = self.desired(stack)?;
                self.provisioner.update(&desired).await?;
                let settled =
                    wait_for_terminal(self.provisioner.as_ref(), stack.name(), self.wait).await?;
                Ok::<_, StackweaveError>(outcome(&settled))
            })
            .await
    }

    async fn launch(&self, stack: &Stack) -> Result<ActionOutcome> {
        match stack.disposition() {
            Disposition::Skip => {
                debug!(stack = stack.name(), "Disposition is skip");
                Ok(ActionOutcome::complete("skipped"))
            }
            Disposition::Delete => self.delete(stack).await,
            Disposition::Deploy => match self.provisioner.describe(stack.name()).await {
                Ok(_) => self.update(stack, &["launch"]).await,
                Err(ProviderError::NotFound { .. }) => {
                    info!(stack = stack.name(), "Not deployed yet, creating");
                    self.create(stack, &["launch"]).await
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn delete(&self, stack: &Stack) -> Result<ActionOutcome> {
        if stack.disposition() == Disposition::Skip {
            return Ok(ActionOutcome::complete("skipped"));
        }

        HookRunner::new(&self.stacks, stack)
            .wrap("delete", async {
                match self.provisioner.delete(stack.name()).await {
                    Ok(_) => {}
                    Err(ProviderError::NotFound { .. }) => {
                        return Ok(ActionOutcome::complete("not deployed"));
                    }
                    Err(e) => return Err(e.into()),
                }
                match wait_for_terminal(self.provisioner.as_ref(), stack.name(), self.wait).await {
                    Ok(settled) => Ok::<_, StackweaveError>(outcome(&settled)),
                    Err(ProviderError::NotFound { .. }) => {
                        Ok(ActionOutcome::complete("DELETE_COMPLETE"))
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    async fn describe(&self, stack: &Stack) -> Result<ActionOutcome> {
        match self.provisioner.describe(stack.name()).await {
            Ok(description) => {
                let hash = description
                    .config_hash
                    .as_deref()
                    .map(|h| ConfigHasher::new().short_hash(h))
                    .unwrap_or_default();
                let message = if hash.is_empty() {
                    description.status
                } else {
                    format!("{} ({hash})", description.status)
                };
                Ok(ActionOutcome::complete(message))
            }
            Err(ProviderError::NotFound { .. }) => Ok(ActionOutcome::complete("not deployed")),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StackAction for StackActions {
    async fn run(&self, command: Command, name: &str) -> Result<ActionOutcome> {
        let stack = self.stack(name)?;
        match command {
            Command::Create => self.create(stack, &[]).await,
            Command::Update => self.update(stack, &[]).await,
            Command::Launch => self.launch(stack).await,
            Command::Delete => self.delete(stack).await,
            Command::Describe => self.describe(stack).await,
        }
    }
}

fn outcome(settled: &StackDescription) -> ActionOutcome {
    match settled.simplified() {
        StackStatus::Complete => ActionOutcome::complete(settled.status.clone()),
        _ => ActionOutcome::failed(
            PlanError::ActionFailed {
                stack: settled.name.clone(),
                reason: settled.status.clone(),
            }
            .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{LocalProvisioner, MockProvisioner};
    use crate::resolver::RawValue;
    use crate::stack::StackDefinition;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    fn stack_set(defs: Vec<StackDefinition>) -> Arc<StackSet> {
        let mut set = StackSet::new();
        for def in defs {
            set.insert(Stack::from_definition(def).expect("bind failed"))
                .expect("insert failed");
        }
        Arc::new(set)
    }

    fn vpc(disposition: Disposition) -> StackDefinition {
        let mut def = StackDefinition::named("vpc");
        def.template = RawValue::from("templates/vpc.yaml");
        def.parameters = RawValue::from(json!({"Cidr": "10.0.0.0/16"}));
        def.disposition = disposition;
        def
    }

    fn local(stacks: Arc<StackSet>) -> (StackActions, Arc<LocalProvisioner>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let provisioner = Arc::new(LocalProvisioner::with_base_dir(temp_dir.path()));
        let actions = StackActions::new(stacks, provisioner.clone(), fast());
        (actions, provisioner, temp_dir)
    }

    #[tokio::test]
    async fn test_launch_creates_then_updates() {
        let (actions, provisioner, _dir) = local(stack_set(vec![vpc(Disposition::Deploy)]));

        let first = actions.run(Command::Launch, "vpc").await.expect("launch failed");
        assert_eq!(first.status, StackStatus::Complete);
        assert_eq!(first.message, "CREATE_COMPLETE");

        // Unchanged configuration: the record keeps its create status.
        let second = actions.run(Command::Launch, "vpc").await.expect("launch failed");
        assert_eq!(second.status, StackStatus::Complete);

        let described = provisioner.describe("vpc").await.expect("describe failed");
        assert!(described.config_hash.is_some());
    }

    #[tokio::test]
    async fn test_launch_skip_makes_no_calls() {
        let mut mock = MockProvisioner::new();
        mock.expect_describe().never();
        mock.expect_create().never();
        let actions = StackActions::new(
            stack_set(vec![vpc(Disposition::Skip)]),
            Arc::new(mock),
            fast(),
        );

        let result = actions.run(Command::Launch, "vpc").await.expect("launch failed");
        assert_eq!(result, ActionOutcome::complete("skipped"));
    }

    #[tokio::test]
    async fn test_delete_missing_stack_succeeds() {
        let (actions, _provisioner, _dir) = local(stack_set(vec![vpc(Disposition::Deploy)]));
        let result = actions.run(Command::Delete, "vpc").await.expect("delete failed");
        assert_eq!(result, ActionOutcome::complete("not deployed"));
    }

    #[tokio::test]
    async fn test_delete_removes_deployed_stack() {
        let (actions, provisioner, _dir) = local(stack_set(vec![vpc(Disposition::Deploy)]));
        actions.run(Command::Create, "vpc").await.expect("create failed");

        let result = actions.run(Command::Delete, "vpc").await.expect("delete failed");
        assert_eq!(result.status, StackStatus::Complete);
        assert!(provisioner.describe("vpc").await.is_err());
    }

    #[tokio::test]
    async fn test_describe_reports_not_deployed() {
        let (actions, _provisioner, _dir) = local(stack_set(vec![vpc(Disposition::Deploy)]));
        let result = actions.run(Command::Describe, "vpc").await.expect("describe failed");
        assert_eq!(result.message, "not deployed");

        actions.run(Command::Create, "vpc").await.expect("create failed");
        let result = actions.run(Command::Describe, "vpc").await.expect("describe failed");
        assert!(result.message.starts_with("CREATE_COMPLETE ("));
    }

    #[tokio::test]
    async fn test_rollback_fails_the_stack() {
        let mut mock = MockProvisioner::new();
        mock.expect_create()
            .returning(|_| Ok(String::from("CREATE_IN_PROGRESS")));
        mock.expect_describe().returning(|name| {
            Ok(StackDescription {
                name: name.to_string(),
                status: String::from("ROLLBACK_COMPLETE"),
                config_hash: None,
                updated_at: None,
            })
        });
        let actions = StackActions::new(
            stack_set(vec![vpc(Disposition::Deploy)]),
            Arc::new(mock),
            fast(),
        );

        let result = actions.run(Command::Create, "vpc").await.expect("create ran");
        assert_eq!(result.status, StackStatus::Failed);
        assert!(result.message.contains("ROLLBACK_COMPLETE"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut mock = MockProvisioner::new();
        mock.expect_update()
            .returning(|s| Err(ProviderError::request(s.name.clone(), "throttled")));
        let actions = StackActions::new(
            stack_set(vec![vpc(Disposition::Deploy)]),
            Arc::new(mock),
            fast(),
        );

        let err = actions.run(Command::Update, "vpc").await.expect_err("must fail");
        assert!(matches!(err, StackweaveError::Provider(ProviderError::RequestFailed { .. })));
    }

    #[tokio::test]
    async fn test_unknown_stack() {
        let (actions, _provisioner, _dir) = local(stack_set(vec![]));
        assert!(actions.run(Command::Create, "ghost").await.is_err());
    }
}
