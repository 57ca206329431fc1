//! Raw configuration values and bound resolvers.
//!
//! A [`RawValue`] is configuration as written: literals mixed with deferred
//! resolvers at any depth. Resolution turns it into a plain
//! [`serde_json::Value`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ResolveError;

use super::context::ResolverCall;

/// Outcome of a resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A concrete value. `Value::Null` is a value, not an omission.
    Value(Value),
    /// Omit the enclosing map entry or sequence element.
    NoValue,
}

impl Resolution {
    /// Converts into an option, mapping `NoValue` to `None`.
    #[must_use]
    pub fn into_option(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoValue => None,
        }
    }
}

/// How a failing resolver is rendered under placeholder mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// `{ !Type(argument) }`
    #[default]
    Explicit,
    /// Only the ASCII alphanumeric characters of the explicit form.
    Alphanumeric,
    /// Never substitute; errors always propagate.
    None,
}

/// A value-source plugin.
///
/// Implementations are registered by name in a
/// [`ResolverRegistry`](crate::registry::ResolverRegistry) and instantiated
/// from YAML tags. A registered instance is a template: it is cloned with
/// [`Resolver::clone_box`] for every stack that uses it, and each clone gets
/// exactly one [`Resolver::setup`] call before its first [`Resolver::resolve`].
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Type name used in placeholders and error messages.
    fn type_name(&self) -> &str;

    /// Called once after the clone is bound to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument is unusable.
    fn setup(&mut self, _argument: &RawValue, _owner: &str) -> Result<(), ResolveError> {
        Ok(())
    }

    /// Computes the value.
    ///
    /// # Errors
    ///
    /// Returns an error if no value can be produced.
    fn resolve(&self, call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError>;

    /// Returns a fresh copy of this resolver's state.
    fn clone_box(&self) -> Box<dyn Resolver>;
}

/// A resolver together with its argument and owning stack.
#[derive(Debug)]
pub struct BoundResolver {
    resolver: Box<dyn Resolver>,
    argument: RawValue,
    owner: Option<String>,
}

/// A configuration value that may contain resolvers.
///
/// `Clone` shares resolver nodes; use [`RawValue::clone_for_stack`] to get an
/// independent, rebound copy.
#[derive(Debug, Clone, Default)]
pub enum RawValue {
    /// Null literal.
    #[default]
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Number literal.
    Number(serde_json::Number),
    /// String literal.
    String(String),
    /// Sequence.
    List(Vec<RawValue>),
    /// Mapping with string keys.
    Map(BTreeMap<String, RawValue>),
    /// Deferred resolver.
    Resolver(Arc<BoundResolver>),
}

impl BoundResolver {
    /// Creates an unbound resolver template.
    #[must_use]
    pub fn template(resolver: Box<dyn Resolver>, argument: RawValue) -> Self {
        Self {
            resolver,
            argument,
            owner: None,
        }
    }

    /// Deep-copies this resolver for `owner`, binding and setting up every
    /// nested resolver first and this one last.
    ///
    /// # Errors
    ///
    /// Returns an error if any `setup` call fails.
    pub fn clone_for_stack(&self, owner: &str) -> Result<Self, ResolveError> {
        let argument = self.argument.clone_for_stack(owner)?;
        let mut resolver = self.resolver.clone_box();
        resolver.setup(&argument, owner)?;
        Ok(Self {
            resolver,
            argument,
            owner: Some(owner.to_string()),
        })
    }

    /// Resolver type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.resolver.type_name()
    }

    /// Raw argument.
    #[must_use]
    pub const fn argument(&self) -> &RawValue {
        &self.argument
    }

    /// Owning stack, if bound.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn plugin(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    /// Renders the synthetic value used in place of a failed resolution.
    #[must_use]
    pub fn placeholder(&self, style: PlaceholderStyle) -> Option<String> {
        let explicit = match self.argument.placeholder_text() {
            Some(arg) => format!("{{ !{}({arg}) }}", self.type_name()),
            None => format!("{{ !{} }}", self.type_name()),
        };
        match style {
            PlaceholderStyle::Explicit => Some(explicit),
            PlaceholderStyle::Alphanumeric => {
                Some(explicit.chars().filter(char::is_ascii_alphanumeric).collect())
            }
            PlaceholderStyle::None => None,
        }
    }
}

impl RawValue {
    /// Wraps a resolver template with its argument.
    #[must_use]
    pub fn resolver(resolver: Box<dyn Resolver>, argument: Self) -> Self {
        Self::Resolver(Arc::new(BoundResolver::template(resolver, argument)))
    }

    /// Structural copy with every resolver cloned and bound to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver's `setup` fails.
    pub fn clone_for_stack(&self, owner: &str) -> Result<Self, ResolveError> {
        Ok(match self {
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|item| item.clone_for_stack(owner))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.clone_for_stack(owner)?)))
                    .collect::<Result<_, ResolveError>>()?,
            ),
            Self::Resolver(bound) => Self::Resolver(Arc::new(bound.clone_for_stack(owner)?)),
            literal => literal.clone(),
        })
    }

    /// Returns true if a resolver appears anywhere in the tree.
    #[must_use]
    pub fn contains_resolvers(&self) -> bool {
        match self {
            Self::Resolver(_) => true,
            Self::List(items) => items.iter().any(Self::contains_resolvers),
            Self::Map(entries) => entries.values().any(Self::contains_resolvers),
            _ => false,
        }
    }

    /// Returns the plain value if the tree holds no resolvers.
    #[must_use]
    pub fn to_literal(&self) -> Option<Value> {
        Some(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(
                items.iter().map(Self::to_literal).collect::<Option<_>>()?,
            ),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.to_literal()?)))
                    .collect::<Option<_>>()?,
            ),
            Self::Resolver(_) => return None,
        })
    }

    /// Returns the string if this is a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn placeholder_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Resolver(bound) => match bound.argument() {
                Self::Null => write!(f, "!{}", bound.type_name()),
                arg => write!(f, "!{}({arg})", bound.type_name()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Recording {
        setups: Arc<AtomicUsize>,
        owner: Option<String>,
        seen_owners: Arc<Mutex<Vec<String>>>,
    }

    impl Resolver for Recording {
        fn type_name(&self) -> &'static str {
            "Recording"
        }

        fn setup(&mut self, _argument: &RawValue, owner: &str) -> Result<(), ResolveError> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            self.owner = Some(owner.to_string());
            self.seen_owners
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(owner.to_string());
            Ok(())
        }

        fn resolve(&self, _call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
            Ok(Resolution::Value(json!(self.owner)))
        }

        fn clone_box(&self) -> Box<dyn Resolver> {
            Box::new(self.clone())
        }
    }

    fn recording() -> (Recording, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let setups = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let r = Recording {
            setups: Arc::clone(&setups),
            owner: None,
            seen_owners: Arc::clone(&seen),
        };
        (r, setups, seen)
    }

    #[test]
    fn test_clone_for_stack_binds_nested_resolvers_once() {
        let (r, setups, seen) = recording();
        let inner = RawValue::resolver(Box::new(r.clone()), RawValue::from("inner"));
        let outer = RawValue::resolver(Box::new(r), RawValue::List(vec![inner]));
        let template = RawValue::Map(BTreeMap::from([(String::from("key"), outer)]));

        assert_eq!(setups.load(Ordering::SeqCst), 0);

        let bound = template.clone_for_stack("vpc").expect("clone failed");
        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![String::from("vpc"), String::from("vpc")]
        );

        let RawValue::Map(entries) = &bound else {
            panic!("expected a map");
        };
        let RawValue::Resolver(outer) = &entries["key"] else {
            panic!("expected a resolver");
        };
        assert_eq!(outer.owner(), Some("vpc"));
        let RawValue::List(items) = outer.argument() else {
            panic!("expected a list argument");
        };
        let RawValue::Resolver(inner) = &items[0] else {
            panic!("expected a nested resolver");
        };
        assert_eq!(inner.owner(), Some("vpc"));
    }

    #[test]
    fn test_clones_for_two_stacks_are_equal_but_distinct() {
        let (r, _, _) = recording();
        let template = RawValue::Map(BTreeMap::from([
            (String::from("literal"), RawValue::List(vec![RawValue::from("a")])),
            (
                String::from("deferred"),
                RawValue::resolver(Box::new(r), RawValue::from("x")),
            ),
        ]));

        let first = template.clone_for_stack("app").expect("clone failed");
        let second = template.clone_for_stack("db").expect("clone failed");
        assert_eq!(first.to_string(), second.to_string());

        let (RawValue::Map(a), RawValue::Map(b)) = (&first, &second) else {
            panic!("expected maps");
        };
        let (RawValue::Resolver(ra), RawValue::Resolver(rb)) = (&a["deferred"], &b["deferred"])
        else {
            panic!("expected resolvers");
        };
        assert!(!Arc::ptr_eq(ra, rb));
        assert_eq!(ra.owner(), Some("app"));
        assert_eq!(rb.owner(), Some("db"));

        let mut mutated = first;
        if let RawValue::Map(entries) = &mut mutated {
            entries.insert(String::from("literal"), RawValue::from("changed"));
        }
        let RawValue::Map(untouched) = &second else {
            panic!("expected a map");
        };
        assert_eq!(untouched["literal"].to_string(), "[\"a\"]");
    }

    #[test]
    fn test_placeholder_rendering() {
        let (r, _, _) = recording();
        let bound = BoundResolver::template(Box::new(r.clone()), RawValue::from("abc"));
        assert_eq!(
            bound.placeholder(PlaceholderStyle::Explicit).as_deref(),
            Some("{ !Recording(abc) }")
        );
        assert_eq!(
            bound.placeholder(PlaceholderStyle::Alphanumeric).as_deref(),
            Some("Recordingabc")
        );
        assert_eq!(bound.placeholder(PlaceholderStyle::None), None);

        let no_arg = BoundResolver::template(Box::new(r), RawValue::Null);
        assert_eq!(
            no_arg.placeholder(PlaceholderStyle::Explicit).as_deref(),
            Some("{ !Recording }")
        );
    }

    #[test]
    fn test_literal_conversion() {
        let value = json!({"a": [1, null, "x"], "b": true});
        let raw = RawValue::from(value.clone());
        assert!(!raw.contains_resolvers());
        assert_eq!(raw.to_literal(), Some(value));
    }
}
