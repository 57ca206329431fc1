//! A single deployable stack.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::hooks::HookSet;
use crate::provider::DesiredStack;
use crate::resolver::{
    ContainerProperty, PlaceholderStyle, RawValue, ResolveContext, ValueProperty,
};

/// What a `launch` does with a stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Create or update the stack.
    #[default]
    Deploy,
    /// Leave the stack untouched.
    Skip,
    /// Tear the stack down.
    Delete,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deploy => "deploy",
            Self::Skip => "skip",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// Unbound stack configuration as produced by the loader.
///
/// Resolvers inside the raw values are templates; [`Stack::from_definition`]
/// clones and binds them to the stack.
#[derive(Debug, Clone, Default)]
pub struct StackDefinition {
    /// Unique stack name.
    pub name: String,
    /// Names of stacks this one depends on.
    pub dependencies: Vec<String>,
    /// Launch disposition.
    pub disposition: Disposition,
    /// Template reference.
    pub template: RawValue,
    /// Role assumed by the provider.
    pub role: RawValue,
    /// Template parameters.
    pub parameters: RawValue,
    /// Stack tags.
    pub tags: RawValue,
    /// Notification targets.
    pub notifications: RawValue,
    /// Free-form user data.
    pub user_data: RawValue,
    /// Hook templates keyed by hook point.
    pub hooks: HookSet,
}

impl StackDefinition {
    /// Creates a definition with the given name and everything else empty.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A stack with its resolvable configuration bound to it.
#[derive(Debug)]
pub struct Stack {
    name: String,
    dependencies: Vec<String>,
    disposition: Disposition,
    template: ValueProperty,
    role: ValueProperty,
    parameters: ContainerProperty,
    tags: ContainerProperty,
    notifications: ContainerProperty,
    user_data: ContainerProperty,
    hooks: HookSet,
}

impl Stack {
    /// Builds a stack, binding every resolver and hook argument to it.
    ///
    /// Duplicate dependency names are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver's `setup` rejects its argument.
    pub fn from_definition(definition: StackDefinition) -> Result<Self, ResolveError> {
        let name = definition.name;

        let mut dependencies: Vec<String> = Vec::with_capacity(definition.dependencies.len());
        for dependency in definition.dependencies {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        let stack = Self {
            template: ValueProperty::new(&name, "template")
                .with_placeholder(PlaceholderStyle::None),
            role: ValueProperty::new(&name, "role"),
            parameters: ContainerProperty::new(&name, "parameters"),
            tags: ContainerProperty::new(&name, "tags")
                .with_placeholder(PlaceholderStyle::Alphanumeric),
            notifications: ContainerProperty::new(&name, "notifications")
                .with_placeholder(PlaceholderStyle::Alphanumeric),
            user_data: ContainerProperty::new(&name, "user_data"),
            hooks: definition.hooks.clone_for_stack(&name)?,
            dependencies,
            disposition: definition.disposition,
            name,
        };

        stack.template.set_raw(&definition.template)?;
        stack.role.set_raw(&definition.role)?;
        stack.parameters.set_raw(&definition.parameters)?;
        stack.tags.set_raw(&definition.tags)?;
        stack.notifications.set_raw(&definition.notifications)?;
        stack.user_data.set_raw(&definition.user_data)?;
        Ok(stack)
    }

    /// Stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Launch disposition.
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        self.disposition
    }

    /// Hooks bound to this stack.
    #[must_use]
    pub const fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    /// Resolved template reference.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or a shape error if the value is not a string.
    pub fn template(&self, ctx: &mut ResolveContext<'_>) -> Result<Option<String>, ResolveError> {
        self.string_property(&self.template, ctx)
    }

    /// Resolved role.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or a shape error if the value is not a string.
    pub fn role(&self, ctx: &mut ResolveContext<'_>) -> Result<Option<String>, ResolveError> {
        self.string_property(&self.role, ctx)
    }

    /// Resolved parameters.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or a shape error if the value is not a mapping.
    pub fn parameters(
        &self,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Map<String, Value>, ResolveError> {
        self.mapping_property(&self.parameters, ctx)
    }

    /// Resolved tags.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or a shape error if the value is not a mapping.
    pub fn tags(&self, ctx: &mut ResolveContext<'_>) -> Result<Map<String, Value>, ResolveError> {
        self.mapping_property(&self.tags, ctx)
    }

    /// Resolved notification targets.
    ///
    /// # Errors
    ///
    /// Returns a resolution error or a shape error if the value is not a sequence.
    pub fn notifications(&self, ctx: &mut ResolveContext<'_>) -> Result<Vec<Value>, ResolveError> {
        match self.notifications.get_resolved(ctx)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(self.shape_error(self.notifications.name(), "a sequence")),
        }
    }

    /// Resolved user data.
    ///
    /// # Errors
    ///
    /// Returns any resolution error.
    pub fn user_data(&self, ctx: &mut ResolveContext<'_>) -> Result<Value, ResolveError> {
        Ok(self.user_data.get_resolved(ctx)?.unwrap_or(Value::Null))
    }

    /// Resolves the full configuration handed to the provisioner.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn desired(&self, ctx: &mut ResolveContext<'_>) -> Result<DesiredStack, ResolveError> {
        Ok(DesiredStack {
            name: self.name.clone(),
            template: self.template(ctx)?,
            role: self.role(ctx)?,
            parameters: self.parameters(ctx)?,
            tags: self.tags(ctx)?,
            notifications: self.notifications(ctx)?,
            user_data: self.user_data(ctx)?,
        })
    }

    /// Reads a resolved attribute by path, e.g. `template` or `parameters.VpcId`.
    ///
    /// Returns `None` when the attribute resolves to no value.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttribute` for unknown attributes or missing keys, or
    /// any resolution error.
    pub fn read_attribute(
        &self,
        path: &str,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<Value>, ResolveError> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let root = match head {
            "name" => Some(Value::String(self.name.clone())),
            "dependencies" => Some(Value::Array(
                self.dependencies.iter().cloned().map(Value::String).collect(),
            )),
            "disposition" => Some(Value::String(self.disposition.to_string())),
            "template" => self.template.get_resolved(ctx)?,
            "role" => self.role.get_resolved(ctx)?,
            "parameters" => self.parameters.get_resolved(ctx)?,
            "tags" => self.tags.get_resolved(ctx)?,
            "notifications" => self.notifications.get_resolved(ctx)?,
            "user_data" => self.user_data.get_resolved(ctx)?,
            _ => return Err(self.unknown_attribute(path)),
        };

        let Some(mut current) = root else {
            return Ok(None);
        };
        for key in segments {
            let next = match &mut current {
                Value::Object(entries) => entries.remove(key),
                Value::Array(items) => key
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < items.len())
                    .map(|i| items.swap_remove(i)),
                _ => None,
            };
            current = next.ok_or_else(|| self.unknown_attribute(path))?;
        }
        Ok(Some(current))
    }

    fn string_property(
        &self,
        slot: &ValueProperty,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<String>, ResolveError> {
        match slot.get_resolved(ctx)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.shape_error(slot.name(), "a string")),
        }
    }

    fn mapping_property(
        &self,
        slot: &ContainerProperty,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Map<String, Value>, ResolveError> {
        match slot.get_resolved(ctx)? {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(entries)) => Ok(entries),
            Some(_) => Err(self.shape_error(slot.name(), "a mapping")),
        }
    }

    fn shape_error(&self, property: &str, expected: &'static str) -> ResolveError {
        ResolveError::Shape {
            stack: self.name.clone(),
            property: property.to_string(),
            expected,
        }
    }

    fn unknown_attribute(&self, path: &str) -> ResolveError {
        ResolveError::UnknownAttribute {
            stack: self.name.clone(),
            attribute: path.to_string(),
        }
    }
}
