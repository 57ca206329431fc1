//! Stacks and the set of stacks loaded for one command.

mod status;
mod unit;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use status::StackStatus;
pub use unit::{Disposition, Stack, StackDefinition};

use crate::error::ConfigError;

/// All stacks of a project, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct StackSet {
    stacks: BTreeMap<String, Arc<Stack>>,
}

impl StackSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stack.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if a stack with the same name exists.
    pub fn insert(&mut self, stack: Stack) -> Result<(), ConfigError> {
        if self.stacks.contains_key(stack.name()) {
            return Err(ConfigError::DuplicateName {
                name: stack.name().to_string(),
            });
        }
        self.stacks.insert(stack.name().to_string(), Arc::new(stack));
        Ok(())
    }

    /// Looks up a stack by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Stack>> {
        self.stacks.get(name)
    }

    /// Returns true if a stack named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stacks.contains_key(name)
    }

    /// Stack names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    /// Stacks in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Stack>> {
        self.stacks.values()
    }

    /// Number of stacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// Returns true if there are no stacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::builtin::{StackAttr, StackParam};
    use crate::resolver::{RawValue, ResolveContext};
    use serde_json::json;

    fn params(entries: Vec<(&str, RawValue)>) -> RawValue {
        RawValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn stack_param(reference: &str) -> RawValue {
        RawValue::resolver(Box::new(StackParam::default()), RawValue::from(reference))
    }

    fn insert(set: &mut StackSet, definition: StackDefinition) {
        set.insert(Stack::from_definition(definition).expect("bind failed"))
            .expect("insert failed");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = StackSet::new();
        insert(&mut set, StackDefinition::named("vpc"));
        let again = Stack::from_definition(StackDefinition::named("vpc")).expect("bind failed");
        assert!(matches!(
            set.insert(again),
            Err(ConfigError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_dependencies_are_deduplicated_in_order() {
        let mut definition = StackDefinition::named("app");
        definition.dependencies = vec!["db".into(), "vpc".into(), "db".into()];
        let stack = Stack::from_definition(definition).expect("bind failed");
        assert_eq!(stack.dependencies(), ["db", "vpc"]);
    }

    #[test]
    fn test_cross_stack_parameter_reference() {
        let mut set = StackSet::new();
        let mut vpc = StackDefinition::named("vpc");
        vpc.parameters = params(vec![("VpcId", RawValue::from("vpc-123"))]);
        insert(&mut set, vpc);

        let mut app = StackDefinition::named("app");
        app.dependencies = vec!["vpc".into()];
        app.parameters = params(vec![("Vpc", stack_param("vpc::VpcId"))]);
        insert(&mut set, app);

        let mut ctx = ResolveContext::new(&set);
        let app = set.get("app").expect("app exists");
        assert_eq!(
            app.parameters(&mut ctx).expect("resolve failed"),
            json!({"Vpc": "vpc-123"}).as_object().cloned().expect("object")
        );
    }

    #[test]
    fn test_self_reference_is_recursive() {
        let mut set = StackSet::new();
        let mut vpc = StackDefinition::named("vpc");
        vpc.parameters = params(vec![(
            "Loop",
            RawValue::resolver(Box::new(StackAttr), RawValue::from("parameters.Loop")),
        )]);
        insert(&mut set, vpc);

        let mut ctx = ResolveContext::new(&set);
        let err = set
            .get("vpc")
            .expect("vpc exists")
            .parameters(&mut ctx)
            .expect_err("must detect recursion");
        assert!(err.is_recursive());
    }

    #[test]
    fn test_two_stack_cycle_is_recursive_even_with_placeholders() {
        let mut set = StackSet::new();
        let mut a = StackDefinition::named("a");
        a.parameters = params(vec![("X", stack_param("b::Y"))]);
        insert(&mut set, a);
        let mut b = StackDefinition::named("b");
        b.parameters = params(vec![("Y", stack_param("a::X"))]);
        insert(&mut set, b);

        let mut ctx = ResolveContext::new(&set);
        let a = set.get("a").expect("a exists");
        let err = ctx
            .with_placeholders(|ctx| a.parameters(ctx))
            .expect_err("must detect recursion");
        assert!(matches!(err, ResolveError::RecursiveResolve { .. }));
    }

    #[test]
    fn test_read_attribute_paths() {
        let mut set = StackSet::new();
        let mut vpc = StackDefinition::named("vpc");
        vpc.template = RawValue::from("templates/vpc.yaml");
        vpc.tags = RawValue::from(json!({"team": "platform"}));
        vpc.notifications = RawValue::from(json!(["ops", "dev"]));
        insert(&mut set, vpc);

        let mut ctx = ResolveContext::new(&set);
        let vpc = set.get("vpc").expect("vpc exists");
        assert_eq!(
            vpc.read_attribute("template", &mut ctx).expect("template"),
            Some(json!("templates/vpc.yaml"))
        );
        assert_eq!(
            vpc.read_attribute("tags.team", &mut ctx).expect("tag"),
            Some(json!("platform"))
        );
        assert_eq!(
            vpc.read_attribute("notifications.1", &mut ctx).expect("notification"),
            Some(json!("dev"))
        );
        assert_eq!(
            vpc.read_attribute("role", &mut ctx).expect("role"),
            Some(serde_json::Value::Null)
        );
        assert!(matches!(
            vpc.read_attribute("tags.missing", &mut ctx),
            Err(ResolveError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            vpc.read_attribute("colour", &mut ctx),
            Err(ResolveError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_desired_rejects_wrong_shape() {
        let mut set = StackSet::new();
        let mut vpc = StackDefinition::named("vpc");
        vpc.parameters = RawValue::from("not a map");
        insert(&mut set, vpc);

        let mut ctx = ResolveContext::new(&set);
        assert!(matches!(
            set.get("vpc").expect("vpc exists").desired(&mut ctx),
            Err(ResolveError::Shape { .. })
        ));
    }
}
