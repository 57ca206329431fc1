//! Turns a parsed project file into a bound [`StackSet`].
//!
//! YAML tags become plugin instances: a tagged value is looked up in the
//! resolver registry, a tagged hook entry in the hook registry.

use std::collections::BTreeMap;

use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::hooks::{HookEntry, HookSet};
use crate::registry::{HookRegistry, ResolverRegistry};
use crate::resolver::RawValue;
use crate::stack::{Stack, StackDefinition, StackSet};

use super::spec::{ProjectFile, StackConfig};

/// Builds stacks from configuration using the plugin registries.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    resolvers: ResolverRegistry,
    hooks: HookRegistry,
}

impl ConfigLoader {
    /// Creates a loader with the built-in resolvers and hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader with custom registries.
    #[must_use]
    pub const fn with_registries(resolvers: ResolverRegistry, hooks: HookRegistry) -> Self {
        Self { resolvers, hooks }
    }

    /// Builds every stack of `file`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownResolver`/`UnknownHook` for unregistered tags,
    /// `DuplicateName` for repeated stack names, or the first resolver
    /// `setup` failure.
    pub fn load(&self, file: &ProjectFile) -> Result<StackSet> {
        let mut stacks = StackSet::new();
        for config in &file.stacks {
            let definition = self.definition(config)?;
            stacks.insert(Stack::from_definition(definition)?)?;
        }
        debug!("Loaded {} stacks for project {}", stacks.len(), file.project.name);
        Ok(stacks)
    }

    /// Converts one stack declaration into an unbound definition.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tags or malformed values.
    pub fn definition(
        &self,
        config: &StackConfig,
    ) -> std::result::Result<StackDefinition, ConfigError> {
        let field = |name: &str| format!("stacks.{}.{name}", config.name);
        Ok(StackDefinition {
            name: config.name.clone(),
            dependencies: config.dependencies.clone(),
            disposition: config.disposition,
            template: self.raw_value(&config.template, &field("template"))?,
            role: self.raw_value(&config.role, &field("role"))?,
            parameters: self.raw_value(&config.parameters, &field("parameters"))?,
            tags: self.raw_value(&config.tags, &field("tags"))?,
            notifications: self.raw_value(&config.notifications, &field("notifications"))?,
            user_data: self.raw_value(&config.user_data, &field("user_data"))?,
            hooks: self.hook_set(&config.hooks, &field("hooks"))?,
        })
    }

    /// Converts a YAML value, instantiating resolver templates for tags.
    ///
    /// # Errors
    ///
    /// Returns `UnknownResolver` for an unregistered tag and a validation
    /// error for mapping keys that are not scalars.
    pub fn raw_value(
        &self,
        value: &YamlValue,
        field: &str,
    ) -> std::result::Result<RawValue, ConfigError> {
        Ok(match value {
            YamlValue::Null => RawValue::Null,
            YamlValue::Bool(b) => RawValue::Bool(*b),
            YamlValue::Number(n) => number(n),
            YamlValue::String(s) => RawValue::String(s.clone()),
            YamlValue::Sequence(items) => RawValue::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.raw_value(item, &format!("{field}[{i}]")))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            YamlValue::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, item) in mapping {
                    let key = scalar_key(key).ok_or_else(|| {
                        ConfigError::validation("Mapping keys must be scalars", field)
                    })?;
                    let nested = self.raw_value(item, &format!("{field}.{key}"))?;
                    map.insert(key, nested);
                }
                RawValue::Map(map)
            }
            YamlValue::Tagged(tagged) => {
                let name = tag_name(&tagged.tag.to_string());
                let resolver = self
                    .resolvers
                    .build(&name)
                    .ok_or(ConfigError::UnknownResolver { name })?;
                let argument = self.raw_value(&tagged.value, field)?;
                RawValue::resolver(resolver, argument)
            }
        })
    }

    fn hook_set(
        &self,
        hooks: &BTreeMap<String, Vec<YamlValue>>,
        field: &str,
    ) -> std::result::Result<HookSet, ConfigError> {
        let mut set = HookSet::default();
        for (point, entries) in hooks {
            for (i, entry) in entries.iter().enumerate() {
                let entry_field = format!("{field}.{point}[{i}]");
                let YamlValue::Tagged(tagged) = entry else {
                    return Err(ConfigError::validation(
                        "Hook entries must be tagged, e.g. !cmd \"echo hi\"",
                        entry_field,
                    ));
                };
                let name = tag_name(&tagged.tag.to_string());
                let hook = self
                    .hooks
                    .build(&name)
                    .ok_or(ConfigError::UnknownHook { name })?;
                let argument = self.raw_value(&tagged.value, &entry_field)?;
                set.push(point.clone(), HookEntry::new(hook, argument));
            }
        }
        Ok(set)
    }
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('!').to_string()
}

fn number(n: &serde_yaml::Number) -> RawValue {
    if let Some(i) = n.as_i64() {
        RawValue::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        RawValue::Number(u.into())
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(RawValue::Null, RawValue::Number)
    }
}

fn scalar_key(key: &YamlValue) -> Option<String> {
    match key {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
