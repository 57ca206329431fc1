//! Resolution context: recursion guard, placeholder scope and tree walking.
//!
//! A [`ResolveContext`] belongs to one resolution chain. It is created by
//! whoever starts reading a property and is threaded by `&mut` through every
//! nested and cross-stack read, so concurrently resolving stacks never share
//! guard state.

use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;
use crate::stack::StackSet;

use super::value::{BoundResolver, PlaceholderStyle, RawValue, Resolution};

/// State of one resolution chain.
#[derive(Debug)]
pub struct ResolveContext<'a> {
    stacks: &'a StackSet,
    in_flight: Vec<(String, String)>,
    placeholder_depth: usize,
}

/// Handle given to [`Resolver::resolve`](super::Resolver::resolve).
#[derive(Debug)]
pub struct ResolverCall<'c, 'a> {
    bound: &'c BoundResolver,
    style: PlaceholderStyle,
    ctx: &'c mut ResolveContext<'a>,
}

impl<'a> ResolveContext<'a> {
    /// Starts a new chain over `stacks` with placeholders disabled.
    #[must_use]
    pub const fn new(stacks: &'a StackSet) -> Self {
        Self {
            stacks,
            in_flight: Vec::new(),
            placeholder_depth: 0,
        }
    }

    /// The stacks visible to this chain.
    #[must_use]
    pub const fn stacks(&self) -> &'a StackSet {
        self.stacks
    }

    /// Runs `f` with placeholder mode enabled. Nested calls are allowed.
    pub fn with_placeholders<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.placeholder_depth += 1;
        let result = f(self);
        self.placeholder_depth -= 1;
        result
    }

    /// Returns true while inside [`ResolveContext::with_placeholders`].
    #[must_use]
    pub const fn placeholders_enabled(&self) -> bool {
        self.placeholder_depth > 0
    }

    /// Runs `f` with `(stack, property)` marked as in flight.
    ///
    /// # Errors
    ///
    /// Returns `RecursiveResolve` if the pair is already in flight, or any
    /// error from `f`.
    pub fn guarded<T>(
        &mut self,
        stack: &str,
        property: &str,
        f: impl FnOnce(&mut Self) -> Result<T, ResolveError>,
    ) -> Result<T, ResolveError> {
        if self
            .in_flight
            .iter()
            .any(|(s, p)| s == stack && p == property)
        {
            return Err(ResolveError::RecursiveResolve {
                stack: stack.to_string(),
                property: property.to_string(),
            });
        }

        self.in_flight.push((stack.to_string(), property.to_string()));
        let result = f(self);
        self.in_flight.pop();
        result
    }

    /// Resolves a raw tree.
    ///
    /// `NoValue` results drop their map key or sequence element. Literal
    /// nulls are kept.
    ///
    /// # Errors
    ///
    /// Returns the first resolver error not replaced by a placeholder.
    pub fn resolve_tree(
        &mut self,
        raw: &RawValue,
        style: PlaceholderStyle,
    ) -> Result<Resolution, ResolveError> {
        match raw {
            RawValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Resolution::Value(v) = self.resolve_tree(item, style)? {
                        out.push(v);
                    }
                }
                Ok(Resolution::Value(Value::Array(out)))
            }
            RawValue::Map(entries) => {
                let mut out = serde_json::Map::new();
                for (key, item) in entries {
                    if let Resolution::Value(v) = self.resolve_tree(item, style)? {
                        out.insert(key.clone(), v);
                    }
                }
                Ok(Resolution::Value(Value::Object(out)))
            }
            RawValue::Resolver(bound) => self.invoke(bound, style),
            literal => Ok(Resolution::Value(literal.to_literal().unwrap_or(Value::Null))),
        }
    }

    /// Invokes one resolver, applying placeholder fallback.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error unless placeholder mode replaces it.
    pub fn invoke(
        &mut self,
        bound: &BoundResolver,
        style: PlaceholderStyle,
    ) -> Result<Resolution, ResolveError> {
        let mut call = ResolverCall {
            bound,
            style,
            ctx: self,
        };
        match bound.plugin().resolve(&mut call) {
            Ok(resolution) => Ok(resolution),
            Err(err) if err.is_recursive() || !self.placeholders_enabled() => Err(err),
            Err(err) => match bound.placeholder(style) {
                Some(placeholder) => {
                    debug!(
                        resolver = bound.type_name(),
                        error = %err,
                        placeholder = %placeholder,
                        "substituting placeholder"
                    );
                    Ok(Resolution::Value(Value::String(placeholder)))
                }
                None => Err(err),
            },
        }
    }
}

impl<'a> ResolverCall<'_, 'a> {
    /// The raw argument.
    #[must_use]
    pub const fn argument(&self) -> &RawValue {
        self.bound.argument()
    }

    /// The resolver's type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.bound.type_name()
    }

    /// The owning stack.
    ///
    /// # Errors
    ///
    /// Returns `Unbound` if the resolver was never cloned for a stack.
    pub fn owner(&self) -> Result<&str, ResolveError> {
        self.bound.owner().ok_or_else(|| ResolveError::Unbound {
            resolver: self.bound.type_name().to_string(),
        })
    }

    /// Resolves the argument, including any nested resolvers.
    ///
    /// # Errors
    ///
    /// Returns the first nested resolver error.
    pub fn resolved_argument(&mut self) -> Result<Resolution, ResolveError> {
        let argument = self.bound.argument();
        self.ctx.resolve_tree(argument, self.style)
    }

    /// Reads a resolved attribute of any stack (including the owner).
    ///
    /// `path` is an attribute name optionally followed by dotted keys, e.g.
    /// `parameters.VpcId`. Returns `None` when the attribute resolves to
    /// no value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown stacks or attributes, or if resolving the
    /// attribute fails.
    pub fn read_attribute(
        &mut self,
        stack: &str,
        path: &str,
    ) -> Result<Option<Value>, ResolveError> {
        let stacks: &'a StackSet = self.ctx.stacks();
        let target = stacks.get(stack).ok_or_else(|| ResolveError::UnknownStack {
            name: stack.to_string(),
        })?;
        target.read_attribute(path, self.ctx)
    }

    /// The underlying context.
    pub fn context(&mut self) -> &mut ResolveContext<'a> {
        self.ctx
    }
}
