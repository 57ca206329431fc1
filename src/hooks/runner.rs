//! Runs a stack's hooks around an operation.

use std::future::Future;

use tracing::debug;

use crate::error::HookError;
use crate::resolver::{PlaceholderStyle, ResolveContext};
use crate::stack::{Stack, StackSet};

use super::{AFTER_PREFIX, BEFORE_PREFIX, HookInvocation};

/// Hook runner bound to one stack.
#[derive(Debug, Clone, Copy)]
pub struct HookRunner<'a> {
    stacks: &'a StackSet,
    stack: &'a Stack,
}

impl<'a> HookRunner<'a> {
    /// Creates a runner for `stack`; `stacks` is used to resolve arguments.
    #[must_use]
    pub const fn new(stacks: &'a StackSet, stack: &'a Stack) -> Self {
        Self { stacks, stack }
    }

    /// Runs every hook declared for `point`, in declaration order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing hook and returns its error.
    pub async fn run_hooks(&self, point: &str) -> Result<(), HookError> {
        for entry in self.stack.hooks().get(point) {
            // Resolve before awaiting so the context never crosses a suspension point.
            let argument = {
                let mut ctx = ResolveContext::new(self.stacks);
                ctx.resolve_tree(entry.argument(), PlaceholderStyle::None)?
                    .into_option()
            };
            let invocation = HookInvocation {
                stack: self.stack.name().to_string(),
                point: point.to_string(),
                argument,
            };
            debug!(
                stack = %invocation.stack,
                hook = entry.hook().type_name(),
                point,
                "Running hook"
            );
            entry.hook().run(&invocation).await?;
        }
        Ok(())
    }

    /// Runs `before_<operation>` hooks, then `action`, then `after_<operation>` hooks.
    ///
    /// # Errors
    ///
    /// See [`HookRunner::wrap_with_aliases`].
    pub async fn wrap<T, E, F>(&self, operation: &str, action: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<HookError>,
    {
        self.wrap_with_aliases(operation, &[], action).await
    }

    /// Like [`HookRunner::wrap`], hooking the action under `operation` and
    /// every alias. Before hooks run for each name in turn, then the action,
    /// then after hooks for each name in turn.
    ///
    /// After hooks run whether or not the action succeeded; the action's
    /// result is returned afterwards.
    ///
    /// # Errors
    ///
    /// A failing before hook aborts everything after it, including the
    /// action. A failing after hook aborts the remaining after hooks and its
    /// error replaces the action's result. Otherwise the action's error is
    /// returned.
    pub async fn wrap_with_aliases<T, E, F>(
        &self,
        operation: &str,
        aliases: &[&str],
        action: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<HookError>,
    {
        let names: Vec<&str> = std::iter::once(operation)
            .chain(aliases.iter().copied())
            .collect();

        for name in &names {
            self.run_hooks(&format!("{BEFORE_PREFIX}{name}")).await?;
        }

        let result = action.await;

        for name in &names {
            self.run_hooks(&format!("{AFTER_PREFIX}{name}")).await?;
        }

        result
    }
}
