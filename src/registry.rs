//! Typed plugin registries.
//!
//! Resolvers and hooks are looked up by YAML tag name. Each registry entry is
//! a factory producing a fresh template instance; the set of entries is fixed
//! when the process starts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::hooks::{CommandHook, Hook};
use crate::resolver::Resolver;
use crate::resolver::builtin::{EnvironmentVariable, Join, NoValueResolver, StackAttr, StackParam};

type Factory<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Name-to-factory map for one plugin kind.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    factories: BTreeMap<String, Factory<T>>,
}

/// Registry of value sources.
pub type ResolverRegistry = Registry<dyn Resolver>;

/// Registry of hooks.
pub type HookRegistry = Registry<dyn Hook>;

impl<T: ?Sized> Registry<T> {
    /// Creates an empty registry for plugins of `kind`.
    #[must_use]
    pub fn empty(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Instantiates the plugin registered under `name`.
    #[must_use]
    pub fn build(&self, name: &str) -> Option<Box<T>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl<T: ?Sized> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            factories: self.factories.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry<dyn Resolver> {
    /// Registry holding the built-in value sources.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty("resolver");
        registry
            .register("no_value", || Box::new(NoValueResolver))
            .register("env", || Box::new(EnvironmentVariable))
            .register("join", || Box::new(Join))
            .register("stack_attr", || Box::new(StackAttr))
            .register("stack_param", || Box::new(StackParam::default()));
        registry
    }
}

impl Registry<dyn Hook> {
    /// Registry holding the built-in hooks.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty("hook");
        registry.register("cmd", || Box::new(CommandHook));
        registry
    }
}

impl Default for Registry<dyn Resolver> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Default for Registry<dyn Hook> {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_resolvers() {
        let registry = ResolverRegistry::with_builtins();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["env", "join", "no_value", "stack_attr", "stack_param"]
        );
        let env = registry.build("env").expect("env registered");
        assert_eq!(env.type_name(), "env");
        assert!(registry.build("ssm").is_none());
    }

    #[test]
    fn test_builtin_hooks() {
        let registry = HookRegistry::with_builtins();
        assert!(registry.contains("cmd"));
        assert!(!registry.contains("sh"));
    }

    #[test]
    fn test_register_custom_resolver() {
        let mut registry = ResolverRegistry::empty("resolver");
        registry.register("always_none", || Box::new(NoValueResolver));
        let built = registry.build("always_none").expect("registered");
        assert_eq!(built.type_name(), "no_value");
    }
}
