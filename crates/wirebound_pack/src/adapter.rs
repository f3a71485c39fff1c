//! The adapter capability and its self-description sugar.
//!
//! ## Menu
//!
//! - [`Adapter`]: the capability a registered type is packed through.
//! - [`Descriptor`]: what an adapter returns, pure data.
//! - [`Describe`]: sugar for types that package their own descriptor.
//! - [`SelfAdapter`]: bridges a [`Describe`] type into the erased capability.

use core::any::Any;
use core::marker::PhantomData;
use std::borrow::Cow;

use wirebound_wire::{Packable, Value};

use crate::asset::Asset;
use crate::error::PackError;

// -----------------------------------------------------------------------------
// Descriptor

/// A construction descriptor: a constructor identifier and its ordered
/// argument list.
///
/// The descriptor itself is acyclic even when the graph it describes is not;
/// cycles are broken by the session's identity memo, never inside a
/// descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub constructor: Cow<'static, str>,
    pub args: Vec<Value>,
}

impl Descriptor {
    pub fn new(constructor: impl Into<Cow<'static, str>>, args: Vec<Value>) -> Self {
        Self {
            constructor: constructor.into(),
            args,
        }
    }
}

// -----------------------------------------------------------------------------
// Adapter

/// The capability that turns one authoring-side type into wire-ready data.
///
/// Adapters are registered against a `TypeId` in a
/// [`TypeRegistry`](crate::TypeRegistry) and resolved through a value's
/// [`type_chain`](Packable::type_chain), so an adapter registered for a
/// conceptual base type may be handed any value whose chain names that base.
/// Adapters that only understand one concrete type should fail with
/// [`PackError::AdapterMismatch`] for anything else, which is exactly what
/// [`SelfAdapter`] does.
pub trait Adapter: Any + Send + Sync {
    /// Produces the construction descriptor for `value`.
    fn describe(&self, value: &dyn Packable) -> Result<Descriptor, PackError>;

    /// The assets the consumer needs before it can run this adapter's
    /// constructor.
    fn assets(&self) -> Vec<Asset> {
        Vec::new()
    }
}

// -----------------------------------------------------------------------------
// Describe

/// A [`Packable`] type that packages its own construction descriptor.
///
/// Registering such a type needs no hand-written adapter:
/// `registry.register::<T>()` wraps it in a [`SelfAdapter`] automatically.
///
/// # Examples
///
/// ```
/// use wirebound_pack::{Asset, Describe};
/// use wirebound_wire::{Packable, Value};
///
/// struct Checkbox {
///     label: String,
/// }
///
/// impl Packable for Checkbox {}
///
/// impl Describe for Checkbox {
///     fn constructor() -> &'static str {
///         "forms.Checkbox"
///     }
///
///     fn describe_args(&self) -> Vec<Value> {
///         vec![Value::from(self.label.as_str())]
///     }
///
///     fn assets() -> Vec<Asset> {
///         vec![Asset::from_static("js/checkbox.js")]
///     }
/// }
/// ```
pub trait Describe: Packable {
    /// The constructor identifier the consumer side registers a factory for.
    fn constructor() -> &'static str;

    /// The ordered argument list handed to that factory.
    fn describe_args(&self) -> Vec<Value>;

    /// Assets required by the constructor.
    fn assets() -> Vec<Asset> {
        Vec::new()
    }
}

// -----------------------------------------------------------------------------
// SelfAdapter

/// The adapter a [`Describe`] type is registered through.
pub struct SelfAdapter<T>(PhantomData<fn() -> T>);

impl<T> SelfAdapter<T> {
    #[inline]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Describe> Adapter for SelfAdapter<T> {
    fn describe(&self, value: &dyn Packable) -> Result<Descriptor, PackError> {
        let value = (value as &dyn Any).downcast_ref::<T>().ok_or_else(|| {
            PackError::AdapterMismatch {
                expected: core::any::type_name::<T>(),
                found: value.type_path(),
                at: None,
            }
        })?;
        Ok(Descriptor::new(T::constructor(), value.describe_args()))
    }

    fn assets(&self) -> Vec<Asset> {
        T::assets()
    }
}

// -----------------------------------------------------------------------------
// Tests
