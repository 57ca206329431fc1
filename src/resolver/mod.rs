//! Lazy value resolution.
//!
//! Stack configuration is stored as [`RawValue`] trees that mix literals with
//! deferred [`Resolver`]s. Resolvers are bound to their owning stack when the
//! value is written into a [`Resolvable`] slot and invoked when the slot is
//! read through a [`ResolveContext`].

pub mod builtin;
mod context;
mod property;
mod value;

pub use context::{ResolveContext, ResolverCall};
pub use property::{
    ContainerProperty, ContainerShape, Resolvable, SlotShape, ValueProperty, ValueShape,
};
pub use value::{BoundResolver, PlaceholderStyle, RawValue, Resolution, Resolver};
