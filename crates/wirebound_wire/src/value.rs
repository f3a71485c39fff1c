//! The value model shared by the packing and unpacking sides.
//!
//! ## Menu
//!
//! - [`Value`]: everything that can travel over the wire.
//! - [`Packable`]: object-safe trait for registered opaque types.
//! - [`Placeholder`]: patchable handle fabricated while unpacking cycles.
//!
//! Strings and containers are `Arc`-backed so that *reference identity* is
//! observable: the packer memoizes by allocation, and the unpacker hands the
//! same `Arc` back for every reference to one identity. Two value-equal but
//! separately allocated strings pack independently; one `Arc` cloned into
//! two positions collapses to a single node plus references.

use core::any::{Any, TypeId};
use core::fmt;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

// -----------------------------------------------------------------------------
// Packable

/// An opaque object that can appear inside a [`Value`] graph.
///
/// Implementing the trait is enough for a type to *carry* through the value
/// model; actually packing it additionally requires an adapter registration
/// on the producer side.
///
/// # Hierarchy
///
/// Adapter lookup walks [`type_chain`](Packable::type_chain) front to back
/// and takes the first registered hit, so a type can inherit an adapter from
/// a conceptual base by listing the base's `TypeId` after its own:
///
/// ```
/// use core::any::TypeId;
/// use wirebound_wire::Packable;
///
/// struct Checkbox;
/// struct FancyCheckbox;
///
/// impl Packable for Checkbox {}
///
/// impl Packable for FancyCheckbox {
///     fn type_chain(&self) -> Vec<TypeId> {
///         vec![TypeId::of::<FancyCheckbox>(), TypeId::of::<Checkbox>()]
///     }
/// }
/// ```
pub trait Packable: Any + Send + Sync {
    /// The `TypeId`s consulted during adapter lookup, most-derived first.
    fn type_chain(&self) -> Vec<TypeId> {
        vec![self.type_id()]
    }

    /// The name used for this type in diagnostics.
    fn type_path(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

// -----------------------------------------------------------------------------
// Placeholder

/// A shared, write-once handle standing in for a value that does not exist
/// yet.
///
/// The unpacking engine fabricates one when a `_ref` lands on a node that is
/// still under construction (a cycle) and patches it exactly once when the
/// construction completes. Holders observe the patch through [`get`].
///
/// [`get`]: Placeholder::get
#[derive(Clone, Default)]
pub struct Placeholder(Arc<OnceLock<Value>>);

impl Placeholder {
    /// Creates an empty placeholder.
    #[inline]
    pub fn new() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    /// The referenced value, once its construction has completed.
    #[inline]
    pub fn get(&self) -> Option<Value> {
        self.0.get().cloned()
    }

    /// Whether the placeholder has been patched.
    #[inline]
    pub fn is_filled(&self) -> bool {
        self.0.get().is_some()
    }

    /// Patches the placeholder. Returns `false` if it was already filled.
    pub fn fill(&self, value: Value) -> bool {
        self.0.set(value).is_ok()
    }

    fn target(&self) -> Option<&Value> {
        self.0.get()
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(target) => write!(f, "Placeholder({})", target.kind()),
            None => write!(f, "Placeholder(<pending>)"),
        }
    }
}

// -----------------------------------------------------------------------------
// Value

/// Everything that can travel over the wire.
///
/// Cloning a `Value` is cheap: scalars copy and everything else bumps an
/// `Arc`. Equality is structural for scalars and containers and
/// reference-based for [`Object`](Value::Object) and
/// [`Placeholder`](Value::Placeholder), which keeps comparison well-defined
/// on cyclic graphs.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    /// An opaque object of a registered type.
    Object(Arc<dyn Packable>),
    /// A forward handle fabricated while unpacking a cyclic document.
    Placeholder(Placeholder),
}

impl Value {
    /// Builds a [`Value::List`] from anything iterable.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    /// Builds a [`Value::Map`] from key/value pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        ))
    }

    /// Wraps an opaque object.
    pub fn object(value: impl Packable) -> Self {
        Self::Object(Arc::new(value))
    }

    /// Wraps an already shared opaque object without another allocation.
    #[inline]
    pub fn shared_object(value: Arc<dyn Packable>) -> Self {
        Self::Object(value)
    }

    /// A short name for the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Placeholder(_) => "placeholder",
        }
    }

    /// Chases filled placeholders down to the underlying value.
    ///
    /// An unfilled placeholder is returned as-is.
    pub fn follow(&self) -> &Value {
        let mut current = self;
        while let Value::Placeholder(placeholder) = current {
            match placeholder.target() {
                Some(target) => current = target,
                None => break,
            }
        }
        current
    }

    /// Whether two values are the *same allocation*, following filled
    /// placeholders on both sides.
    ///
    /// Scalars carry no identity and never compare as the same instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.follow(), other.follow()) {
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Placeholder(a), Self::Placeholder(b)) => a == b,
            _ => false,
        }
    }

    /// Borrows the wrapped object as a concrete type, following filled
    /// placeholders.
    pub fn downcast_ref<T: Packable>(&self) -> Option<&T> {
        match self.follow() {
            Self::Object(object) => (object.as_ref() as &dyn Any).downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Placeholder(a), Self::Placeholder(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            // Objects print their type only; descending into adapter-owned
            // state could recurse through a cycle.
            Self::Object(object) => write!(f, "Object({})", object.type_path()),
            Self::Placeholder(placeholder) => placeholder.fmt(f),
        }
    }
}

impl Default for Value {
    #[inline]
    fn default() -> Self {
        Self::Null
    }
}

// -----------------------------------------------------------------------------
// Conversions

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Arc::new(items))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(Arc::new(entries))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
