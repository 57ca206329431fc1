//! Resolvable property slots.
//!
//! Every resolvable configuration field on a [`Stack`](crate::stack::Stack)
//! is a [`Resolvable`] slot with an explicit accessor pair:
//! [`Resolvable::set_raw`] binds incoming resolvers to the owning stack and
//! [`Resolvable::get_resolved`] resolves on read. The shape marker decides
//! the read behaviour:
//!
//! - [`ValueShape`]: a resolver stored directly in the slot is invoked once and
//!   its result cached back into the slot.
//! - [`ContainerShape`]: the whole mapping or sequence is walked on every read.
//!
//! The slot lock is never held while a resolver runs, since a resolver may
//! read other slots, including slots of stacks being resolved by another
//! task. Two chains reading the same uncached value slot at the same moment
//! may therefore both invoke its resolver. The first result written becomes
//! the cached value and every reader, including the slower one, returns it.

use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::ResolveError;

use super::context::ResolveContext;
use super::value::{PlaceholderStyle, RawValue, Resolution};

/// Shape marker for single-value slots.
#[derive(Debug, Clone, Copy)]
pub struct ValueShape;

/// Shape marker for mapping/sequence slots.
#[derive(Debug, Clone, Copy)]
pub struct ContainerShape;

/// Read behaviour of a slot shape.
pub trait SlotShape: sealed::Sealed + Send + Sync + 'static {
    /// Resolves the slot contents. Called with the recursion guard held.
    ///
    /// # Errors
    ///
    /// Returns any resolution error.
    fn read(
        slot: &Resolvable<Self>,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<Value>, ResolveError>
    where
        Self: Sized;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ValueShape {}
    impl Sealed for super::ContainerShape {}
}

#[derive(Debug, Clone)]
enum SlotState {
    Raw(RawValue),
    Cached(Option<Value>),
}

/// A named resolvable slot owned by one stack.
#[derive(Debug)]
pub struct Resolvable<K> {
    owner: String,
    name: &'static str,
    placeholder: PlaceholderStyle,
    state: Mutex<SlotState>,
    shape: PhantomData<K>,
}

/// A single-value property.
pub type ValueProperty = Resolvable<ValueShape>;

/// A mapping/sequence property.
pub type ContainerProperty = Resolvable<ContainerShape>;

impl<K: SlotShape> Resolvable<K> {
    /// Creates an empty (null) slot.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: &'static str) -> Self {
        Self {
            owner: owner.into(),
            name,
            placeholder: PlaceholderStyle::default(),
            state: Mutex::new(SlotState::Raw(RawValue::Null)),
            shape: PhantomData,
        }
    }

    /// Sets the placeholder rendering used for this slot.
    #[must_use]
    pub const fn with_placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = style;
        self
    }

    /// Property name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Placeholder rendering used for this slot.
    #[must_use]
    pub const fn placeholder(&self) -> PlaceholderStyle {
        self.placeholder
    }

    /// Stores a raw value, cloning every resolver inside it for the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if a resolver's `setup` fails.
    pub fn set_raw(&self, raw: &RawValue) -> Result<(), ResolveError> {
        let bound = raw.clone_for_stack(&self.owner)?;
        *self.lock() = SlotState::Raw(bound);
        Ok(())
    }

    /// Resolves the slot. `None` means the slot resolved to no value.
    ///
    /// # Errors
    ///
    /// Returns `RecursiveResolve` if this slot is already being resolved in
    /// the same chain, or any resolver error.
    pub fn get_resolved(
        &self,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<Value>, ResolveError> {
        ctx.guarded(&self.owner, self.name, |ctx| K::read(self, ctx))
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the current contents so no lock is held during resolution.
    fn snapshot(&self) -> SlotState {
        self.lock().clone()
    }
}

impl SlotShape for ValueShape {
    fn read(
        slot: &Resolvable<Self>,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<Value>, ResolveError> {
        let raw = match slot.snapshot() {
            SlotState::Raw(raw) => raw,
            SlotState::Cached(cached) => return Ok(cached),
        };

        let RawValue::Resolver(bound) = raw else {
            return Ok(ctx.resolve_tree(&raw, slot.placeholder)?.into_option());
        };

        let resolved = ctx.invoke(&bound, slot.placeholder)?.into_option();
        // Placeholders are stand-ins for this read only.
        if ctx.placeholders_enabled() {
            return Ok(resolved);
        }

        // A concurrent reader may have cached first; every reader sees that value.
        let mut state = slot.lock();
        if let SlotState::Cached(existing) = &*state {
            return Ok(existing.clone());
        }
        *state = SlotState::Cached(resolved.clone());
        Ok(resolved)
    }
}

impl SlotShape for ContainerShape {
    fn read(
        slot: &Resolvable<Self>,
        ctx: &mut ResolveContext<'_>,
    ) -> Result<Option<Value>, ResolveError> {
        let raw = match slot.snapshot() {
            SlotState::Raw(raw) => raw,
            SlotState::Cached(cached) => return Ok(cached),
        };
        Ok(match ctx.resolve_tree(&raw, slot.placeholder)? {
            Resolution::Value(v) => Some(v),
            Resolution::NoValue => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolverCall, Resolver};
    use crate::stack::StackSet;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Resolver for Counting {
        fn type_name(&self) -> &'static str {
            "Counting"
        }

        fn resolve(&self, _call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Resolution::Value(json!(n)))
        }

        fn clone_box(&self) -> Box<dyn Resolver> {
            Box::new(self.clone())
        }
    }

    #[derive(Debug, Clone)]
    struct Broken;

    impl Resolver for Broken {
        fn type_name(&self) -> &'static str {
            "Broken"
        }

        fn resolve(&self, _call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
            Err(ResolveError::unresolvable("Broken", "boom"))
        }

        fn clone_box(&self) -> Box<dyn Resolver> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_value_property_caches_resolver_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = ValueProperty::new("vpc", "template");
        slot.set_raw(&RawValue::resolver(
            Box::new(Counting {
                calls: Arc::clone(&calls),
            }),
            RawValue::Null,
        ))
        .expect("set_raw failed");

        let stacks = StackSet::default();
        let mut ctx = ResolveContext::new(&stacks);
        assert_eq!(slot.get_resolved(&mut ctx).expect("first read"), Some(json!(0)));
        assert_eq!(slot.get_resolved(&mut ctx).expect("second read"), Some(json!(0)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug, Clone)]
    struct Slow {
        calls: Arc<AtomicUsize>,
    }

    impl Resolver for Slow {
        fn type_name(&self) -> &'static str {
            "Slow"
        }

        fn resolve(&self, _call: &mut ResolverCall<'_, '_>) -> Result<Resolution, ResolveError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(Resolution::Value(json!(n)))
        }

        fn clone_box(&self) -> Box<dyn Resolver> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_concurrent_readers_agree_on_cached_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = ValueProperty::new("vpc", "role");
        slot.set_raw(&RawValue::resolver(
            Box::new(Slow {
                calls: Arc::clone(&calls),
            }),
            RawValue::Null,
        ))
        .expect("set_raw failed");
        let stacks = StackSet::default();

        let results: Vec<Option<Value>> = std::thread::scope(|scope| {
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        let mut ctx = ResolveContext::new(&stacks);
                        slot.get_resolved(&mut ctx).expect("read")
                    })
                })
                .collect();
            readers
                .into_iter()
                .map(|reader| reader.join().expect("reader panicked"))
                .collect()
        });

        assert_eq!(results[0], results[1]);

        let mut ctx = ResolveContext::new(&stacks);
        let invoked = calls.load(Ordering::SeqCst);
        assert!((1..=2).contains(&invoked));
        assert_eq!(slot.get_resolved(&mut ctx).expect("cached read"), results[0]);
        assert_eq!(calls.load(Ordering::SeqCst), invoked);
    }

    #[test]
    fn test_container_property_re_resolves_each_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = ContainerProperty::new("vpc", "parameters");
        slot.set_raw(&RawValue::Map(BTreeMap::from([(
            String::from("Count"),
            RawValue::resolver(
                Box::new(Counting {
                    calls: Arc::clone(&calls),
                }),
                RawValue::Null,
            ),
        )])))
        .expect("set_raw failed");

        let stacks = StackSet::default();
        let mut ctx = ResolveContext::new(&stacks);
        assert_eq!(
            slot.get_resolved(&mut ctx).expect("first read"),
            Some(json!({"Count": 0}))
        );
        assert_eq!(
            slot.get_resolved(&mut ctx).expect("second read"),
            Some(json!({"Count": 1}))
        );
    }

    #[test]
    fn test_placeholder_results_are_not_cached() {
        let slot =
            ValueProperty::new("vpc", "role").with_placeholder(PlaceholderStyle::Alphanumeric);
        slot.set_raw(&RawValue::resolver(Box::new(Broken), RawValue::from("arn")))
            .expect("set_raw failed");

        let stacks = StackSet::default();
        let mut ctx = ResolveContext::new(&stacks);
        let placeholder = ctx
            .with_placeholders(|ctx| slot.get_resolved(ctx))
            .expect("placeholder read");
        assert_eq!(placeholder, Some(json!("Brokenarn")));
        assert!(slot.get_resolved(&mut ctx).is_err());
    }

    #[test]
    fn test_literal_slots_pass_through() {
        let slot = ValueProperty::new("vpc", "template");
        slot.set_raw(&RawValue::from("templates/vpc.yaml"))
            .expect("set_raw failed");
        let stacks = StackSet::default();
        let mut ctx = ResolveContext::new(&stacks);
        assert_eq!(
            slot.get_resolved(&mut ctx).expect("read"),
            Some(json!("templates/vpc.yaml"))
        );
    }
}
