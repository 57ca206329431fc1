//! Hooks run before and after stack operations.
//!
//! A stack declares hooks under `before_<operation>` and `after_<operation>`
//! keys. Each entry is a registered [`Hook`] plus a resolvable argument bound
//! to the owning stack.

mod builtin;
mod runner;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HookError, ResolveError};
use crate::resolver::RawValue;

pub use builtin::CommandHook;
pub use runner::HookRunner;

/// Prefix of hook points run before an operation.
pub const BEFORE_PREFIX: &str = "before_";

/// Prefix of hook points run after an operation.
pub const AFTER_PREFIX: &str = "after_";

/// One hook call.
#[derive(Debug, Clone, PartialEq)]
pub struct HookInvocation {
    /// Owning stack.
    pub stack: String,
    /// Hook point, e.g. `before_create`.
    pub point: String,
    /// Resolved argument; `None` when the argument resolved to no value.
    pub argument: Option<Value>,
}

/// A hook plugin.
#[async_trait]
pub trait Hook: Send + Sync + fmt::Debug {
    /// Type name, matching the YAML tag.
    fn type_name(&self) -> &str;

    /// Runs the hook.
    ///
    /// # Errors
    ///
    /// Returns an error if the hook fails; remaining hooks and the wrapped
    /// operation are then skipped.
    async fn run(&self, invocation: &HookInvocation) -> Result<(), HookError>;

    /// Returns a fresh copy of this hook.
    fn clone_box(&self) -> Box<dyn Hook>;
}

/// A hook with its argument.
#[derive(Debug)]
pub struct HookEntry {
    hook: Box<dyn Hook>,
    argument: RawValue,
}

impl HookEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(hook: Box<dyn Hook>, argument: RawValue) -> Self {
        Self { hook, argument }
    }

    /// The hook plugin.
    #[must_use]
    pub fn hook(&self) -> &dyn Hook {
        self.hook.as_ref()
    }

    /// The raw argument.
    #[must_use]
    pub const fn argument(&self) -> &RawValue {
        &self.argument
    }
}

impl Clone for HookEntry {
    fn clone(&self) -> Self {
        Self {
            hook: self.hook.clone_box(),
            argument: self.argument.clone(),
        }
    }
}

/// Hooks of one stack, keyed by hook point, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct HookSet {
    points: BTreeMap<String, Vec<HookEntry>>,
}

impl HookSet {
    /// Appends a hook to `point`.
    pub fn push(&mut self, point: impl Into<String>, entry: HookEntry) {
        self.points.entry(point.into()).or_default().push(entry);
    }

    /// Hooks declared for `point`.
    #[must_use]
    pub fn get(&self, point: &str) -> &[HookEntry] {
        self.points.get(point).map(Vec::as_slice).unwrap_or_default()
    }

    /// Declared hook points.
    pub fn points(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    /// Returns true if no hooks are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.values().all(Vec::is_empty)
    }

    /// Copies the set, binding every argument to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver in an argument fails its `setup`.
    pub fn clone_for_stack(&self, owner: &str) -> Result<Self, ResolveError> {
        let mut points = BTreeMap::new();
        for (point, entries) in &self.points {
            let bound = entries
                .iter()
                .map(|entry| {
                    Ok(HookEntry {
                        hook: entry.hook.clone_box(),
                        argument: entry.argument.clone_for_stack(owner)?,
                    })
                })
                .collect::<Result<Vec<_>, ResolveError>>()?;
            points.insert(point.clone(), bound);
        }
        Ok(Self { points })
    }
}

/// Splits a hook point into its prefix and operation, e.g.
/// `before_create` into `("before_", "create")`.
#[must_use]
pub fn split_point(point: &str) -> Option<(&'static str, &str)> {
    [BEFORE_PREFIX, AFTER_PREFIX].into_iter().find_map(|prefix| {
        point
            .strip_prefix(prefix)
            .filter(|operation| !operation.is_empty())
            .map(|operation| (prefix, operation))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_point() {
        assert_eq!(split_point("before_create"), Some(("before_", "create")));
        assert_eq!(split_point("after_launch"), Some(("after_", "launch")));
        assert_eq!(split_point("before_"), None);
        assert_eq!(split_point("during_create"), None);
    }

    #[test]
    fn test_hook_set_keeps_declaration_order() {
        let mut set = HookSet::default();
        set.push("before_create", HookEntry::new(Box::new(CommandHook), RawValue::from("one")));
        set.push("before_create", HookEntry::new(Box::new(CommandHook), RawValue::from("two")));
        let args: Vec<_> = set
            .get("before_create")
            .iter()
            .filter_map(|e| e.argument().as_str())
            .collect();
        assert_eq!(args, vec!["one", "two"]);
        assert!(set.get("after_create").is_empty());
        assert!(!set.is_empty());
    }
}
