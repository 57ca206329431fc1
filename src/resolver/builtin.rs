//! Built-in value sources.
//!
//! | Tag            | Argument                  | Result                                   |
//! |----------------|---------------------------|------------------------------------------|
//! | `!no_value`    | none                      | no value                                 |
//! | `!env`         | variable name             | the variable, or no value when unset     |
//! | `!join`        | `[delimiter, [items...]]` | items joined with the delimiter          |
//! | `!stack_attr`  | `attribute[.key...]`      | an attribute of the owning stack         |
//! | `!stack_param` | `stack::Key`              | a resolved parameter of another stack    |

use serde_json::Value;

use crate::error::ResolveError;

use super::context::ResolverCall;
use super::value::{RawValue, Resolution, Resolver};

/// `!no_value`: always omits its entry.
#[derive(Debug, Clone, Default)]
pub struct NoValueResolver;

impl Resolver for NoValueResolver {
    fn type_name(&self) -> &'static str {
        "no_value"
    }

    fn resolve(&self, _call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
        Ok(Resolution::NoValue)
    }

    fn clone_box(&self) -> Box<dyn Resolver> {
        Box::new(self.clone())
    }
}

/// `!env NAME`: reads an environment variable.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentVariable;

impl Resolver for EnvironmentVariable {
    fn type_name(&self) -> &'static str {
        "env"
    }

    fn resolve(&self, call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
        let name = match call.resolved_argument()? {
            Resolution::Value(Value::String(name)) => name,
            _ => {
                return Err(ResolveError::invalid_argument(
                    "env",
                    "expected the variable name as a string",
                ));
            }
        };

        match std::env::var(&name) {
            Ok(value) => Ok(Resolution::Value(Value::String(value))),
            Err(std::env::VarError::NotPresent) => Ok(Resolution::NoValue),
            Err(e) => Err(ResolveError::unresolvable("env", format!("{name}: {e}"))),
        }
    }

    fn clone_box(&self) -> Box<dyn Resolver> {
        Box::new(self.clone())
    }
}

/// `!join [delimiter, [items...]]`: joins scalar items into one string.
#[derive(Debug, Clone, Default)]
pub struct Join;

impl Resolver for Join {
    fn type_name(&self) -> &'static str {
        "join"
    }

    fn resolve(&self, call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
        let usage = || ResolveError::invalid_argument("join", "expected [delimiter, [items...]]");

        let Resolution::Value(Value::Array(mut parts)) = call.resolved_argument()? else {
            return Err(usage());
        };
        if parts.len() != 2 {
            return Err(usage());
        }
        let (Value::String(delimiter), Value::Array(items)) = (parts.remove(0), parts.remove(0))
        else {
            return Err(usage());
        };

        let mut strings = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Null => {}
                Value::String(s) => strings.push(s),
                Value::Bool(_) | Value::Number(_) => strings.push(item.to_string()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ResolveError::invalid_argument(
                        "join",
                        "items must be scalars",
                    ));
                }
            }
        }

        Ok(Resolution::Value(Value::String(strings.join(&delimiter))))
    }

    fn clone_box(&self) -> Box<dyn Resolver> {
        Box::new(self.clone())
    }
}

/// `!stack_attr path`: reads an attribute of the owning stack.
#[derive(Debug, Clone, Default)]
pub struct StackAttr;

impl Resolver for StackAttr {
    fn type_name(&self) -> &'static str {
        "stack_attr"
    }

    fn resolve(&self, call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
        let Resolution::Value(Value::String(path)) = call.resolved_argument()? else {
            return Err(ResolveError::invalid_argument(
                "stack_attr",
                "expected an attribute path string",
            ));
        };
        let owner = call.owner()?.to_string();
        Ok(call
            .read_attribute(&owner, &path)?
            .map_or(Resolution::NoValue, Resolution::Value))
    }

    fn clone_box(&self) -> Box<dyn Resolver> {
        Box::new(self.clone())
    }
}

/// `!stack_param other::Key`: reads a resolved parameter of another stack.
///
/// The reference is parsed once during setup.
#[derive(Debug, Clone, Default)]
pub struct StackParam {
    target: Option<(String, String)>,
}

impl StackParam {
    fn parse(reference: &str) -> Option<(String, String)> {
        let (stack, key) = reference.split_once("::")?;
        let (stack, key) = (stack.trim(), key.trim());
        if stack.is_empty() || key.is_empty() {
            return None;
        }
        Some((stack.to_string(), key.to_string()))
    }
}

impl Resolver for StackParam {
    fn type_name(&self) -> &'static str {
        "stack_param"
    }

    fn setup(&mut self, argument: &RawValue, _owner: &str) -> Result<(), ResolveError> {
        let reference = argument.as_str().ok_or_else(|| {
            ResolveError::invalid_argument("stack_param", "expected a 'stack::Key' string")
        })?;
        let target = Self::parse(reference).ok_or_else(|| {
            ResolveError::invalid_argument(
                "stack_param",
                format!("'{reference}' is not of the form 'stack::Key'"),
            )
        })?;
        self.target = Some(target);
        Ok(())
    }

    fn resolve(&self, call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
        let (stack, key) = self.target.as_ref().ok_or_else(|| ResolveError::Unbound {
            resolver: String::from("stack_param"),
        })?;
        let value = call.read_attribute(stack, &format!("parameters.{key}"))?;
        value.map(Resolution::Value).ok_or_else(|| {
            ResolveError::unresolvable("stack_param", format!("{stack}::{key} has no value"))
        })
    }

    fn clone_box(&self) -> Box<dyn Resolver> {
        Box::new(self.clone())
    }
}
