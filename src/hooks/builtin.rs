//! Built-in hooks.

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::HookError;

use super::{Hook, HookInvocation};

const DEFAULT_SHELL: &str = "sh";

/// `!cmd`: runs a shell command.
///
/// The argument is either the command string or a mapping
/// `{run: "...", shell: bash}`. The command sees `STACK_NAME` and
/// `HOOK_NAME` in its environment.
#[derive(Debug, Clone, Default)]
pub struct CommandHook;

impl CommandHook {
    fn parse(invocation: &HookInvocation) -> Result<(String, String), HookError> {
        let invalid = |message: &str| HookError::InvalidArgument {
            hook: String::from("cmd"),
            message: message.to_string(),
        };

        match &invocation.argument {
            Some(Value::String(run)) => Ok((run.clone(), DEFAULT_SHELL.to_string())),
            Some(Value::Object(fields)) => {
                let run = fields
                    .get("run")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("mapping form needs a 'run' string"))?;
                let shell = match fields.get("shell") {
                    None => DEFAULT_SHELL,
                    Some(Value::String(shell)) => shell.as_str(),
                    Some(_) => return Err(invalid("'shell' must be a string")),
                };
                Ok((run.to_string(), shell.to_string()))
            }
            _ => Err(invalid("expected a command string or {run, shell}")),
        }
    }
}

#[async_trait]
impl Hook for CommandHook {
    fn type_name(&self) -> &'static str {
        "cmd"
    }

    async fn run(&self, invocation: &HookInvocation) -> Result<(), HookError> {
        let (run, shell) = Self::parse(invocation)?;
        info!(
            stack = %invocation.stack,
            hook = %invocation.point,
            "Running hook command: {run}"
        );

        let output = Command::new(&shell)
            .arg("-c")
            .arg(&run)
            .env("STACK_NAME", &invocation.stack)
            .env("HOOK_NAME", &invocation.point)
            .output()
            .await
            .map_err(|e| HookError::Spawn {
                hook: invocation.point.clone(),
                command: run.clone(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(hook = %invocation.point, "stdout: {}", stdout.trim_end());
        }

        if !output.status.success() {
            warn!(
                hook = %invocation.point,
                "stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
            return Err(HookError::CommandFailed {
                hook: invocation.point.clone(),
                command: run,
                code: output.status.code().unwrap_or(-1),
            });
        }

        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Hook> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(argument: Value) -> HookInvocation {
        HookInvocation {
            stack: String::from("vpc"),
            point: String::from("before_create"),
            argument: Some(argument),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        CommandHook
            .run(&invocation(json!("true")))
            .await
            .expect("command should succeed");
    }

    #[tokio::test]
    async fn test_command_sees_stack_environment() {
        CommandHook
            .run(&invocation(json!(
                "test \"$STACK_NAME\" = vpc && test \"$HOOK_NAME\" = before_create"
            )))
            .await
            .expect("environment should be set");
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code() {
        let err = CommandHook
            .run(&invocation(json!({"run": "exit 3", "shell": "sh"})))
            .await
            .expect_err("command should fail");
        assert!(matches!(err, HookError::CommandFailed { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_invalid_argument() {
        let err = CommandHook
            .run(&invocation(json!(42)))
            .await
            .expect_err("argument should be rejected");
        assert!(matches!(err, HookError::InvalidArgument { .. }));
    }
}
