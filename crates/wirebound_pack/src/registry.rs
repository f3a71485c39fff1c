//! The process-wide adapter registry.
//!
//! ## Menu
//!
//! - [`TypeRegistry`]: maps authoring-side types to [`Adapter`]s and
//!   resolves the most specific one for a value.
//! - [`SharedRegistry`]: lock-guarded registration with lock-free snapshot
//!   reads for concurrent pack sessions.
//! - [`AdapterRegistration`]: static registration support for the
//!   `register_packable!` macro (feature `auto_register`).

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use wirebound_wire::Packable;
use wirebound_wire::hash::TypeIdMap;

use crate::adapter::{Adapter, Describe, SelfAdapter};
use crate::asset::Asset;
use crate::error::{PackError, RegistrationError};

// -----------------------------------------------------------------------------
// TypeRegistry

#[derive(Clone)]
struct AdapterEntry {
    adapter: Arc<dyn Adapter>,
    // Concrete adapter type, used to make re-registration idempotent.
    adapter_type: TypeId,
    target_path: &'static str,
}

/// A registry of adapters, keyed by the authoring-side types they govern.
///
/// Registration happens during initialization; afterwards the registry is
/// read-only and can be shared freely across sessions (see
/// [`SharedRegistry`] for the concurrent form). Primitive values never
/// consult the registry; sessions pass them through as wire literals.
///
/// # Example
///
/// ```
/// use wirebound_pack::{Describe, TypeRegistry};
/// use wirebound_wire::{Packable, Value};
///
/// struct Checkbox;
///
/// impl Packable for Checkbox {}
///
/// impl Describe for Checkbox {
///     fn constructor() -> &'static str {
///         "forms.Checkbox"
///     }
///
///     fn describe_args(&self) -> Vec<Value> {
///         Vec::new()
///     }
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.register::<Checkbox>().unwrap();
/// assert!(registry.contains::<Checkbox>());
///
/// let adapter = registry.resolve(&Checkbox).unwrap();
/// assert_eq!(adapter.describe(&Checkbox).unwrap().constructor, "forms.Checkbox");
/// ```
#[derive(Clone, Default)]
pub struct TypeRegistry {
    adapters: TypeIdMap<AdapterEntry>,
    asset_base: Option<String>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose adapters' relative asset locators are
    /// resolved against `base`.
    ///
    /// This is how isolated configurations (alternate static roots, test
    /// fixtures) get their own registry instead of touching the global one.
    pub fn with_asset_base(base: impl Into<String>) -> Self {
        Self {
            adapters: TypeIdMap::default(),
            asset_base: Some(base.into()),
        }
    }

    /// The configured asset base, if any.
    pub fn asset_base(&self) -> Option<&str> {
        self.asset_base.as_deref()
    }

    /// Registers a self-describing type through a [`SelfAdapter`].
    pub fn register<T: Describe>(&mut self) -> Result<(), RegistrationError> {
        self.register_adapter::<T, _>(SelfAdapter::<T>::new())
    }

    /// Registers `adapter` for values of type `T`.
    ///
    /// Re-registering the same adapter *type* for `T` is idempotent (the
    /// existing adapter is kept); registering a different adapter type for a
    /// type that already has one fails with
    /// [`RegistrationError::AdapterConflict`].
    pub fn register_adapter<T: Packable, A: Adapter>(
        &mut self,
        adapter: A,
    ) -> Result<(), RegistrationError> {
        self.register_erased::<T>(TypeId::of::<A>(), Arc::new(adapter))
    }

    /// Registers an already shared adapter for values of type `T`.
    ///
    /// Useful when one adapter instance governs several types.
    pub fn register_shared<T: Packable>(
        &mut self,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), RegistrationError> {
        let adapter_type = adapter.as_ref().type_id();
        self.register_erased::<T>(adapter_type, adapter)
    }

    fn register_erased<T: Packable>(
        &mut self,
        adapter_type: TypeId,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), RegistrationError> {
        let target_path = core::any::type_name::<T>();
        match self.adapters.get(&TypeId::of::<T>()) {
            Some(existing) if existing.adapter_type == adapter_type => Ok(()),
            Some(_) => Err(RegistrationError::AdapterConflict { target: target_path }),
            None => {
                self.adapters.insert(
                    TypeId::of::<T>(),
                    AdapterEntry {
                        adapter,
                        adapter_type,
                        target_path,
                    },
                );
                Ok(())
            }
        }
    }

    /// Whether type `T` has a directly registered adapter.
    pub fn contains<T: Packable>(&self) -> bool {
        self.contains_id(TypeId::of::<T>())
    }

    /// Whether the type with the given [`TypeId`] has a directly registered
    /// adapter.
    #[inline]
    pub fn contains_id(&self, type_id: TypeId) -> bool {
        self.adapters.contains_key(&type_id)
    }

    /// The number of registered adapters.
    #[inline]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Resolves the most specific adapter for `value`.
    ///
    /// Walks the value's [`type_chain`](Packable::type_chain) front to back
    /// and returns the first registered adapter. Fails with
    /// [`PackError::NoAdapter`] when the whole chain misses.
    pub fn resolve(&self, value: &dyn Packable) -> Result<&dyn Adapter, PackError> {
        for type_id in value.type_chain() {
            if let Some(entry) = self.adapters.get(&type_id) {
                return Ok(entry.adapter.as_ref());
            }
        }
        Err(PackError::NoAdapter {
            type_path: value.type_path(),
            at: None,
        })
    }

    /// Resolves an adapter-declared asset against the registry's base.
    pub(crate) fn locate(&self, asset: &Asset) -> Asset {
        match &self.asset_base {
            Some(base) if asset.is_relative() => {
                let base = base.trim_end_matches('/');
                Asset::new(format!("{base}/{}", asset.path()))
            }
            _ => asset.clone(),
        }
    }

    /// Registers every type declared via `register_packable!`.
    ///
    /// Returns `Ok(true)` when static registrations were applied and
    /// `Ok(false)` when the `auto_register` feature is disabled. Repeated
    /// calls are cheap: each registration is idempotent.
    pub fn auto_register(&mut self) -> Result<bool, RegistrationError> {
        #[cfg(not(feature = "auto_register"))]
        return Ok(false);

        #[cfg(feature = "auto_register")]
        {
            for registration in inventory::iter::<AdapterRegistration> {
                (registration.register)(self)?;
            }
            Ok(true)
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.adapters.values().map(|entry| entry.target_path))
            .finish()
    }
}

// -----------------------------------------------------------------------------
// AdapterRegistration

/// One static registration submitted by the `register_packable!` macro.
#[cfg(feature = "auto_register")]
pub struct AdapterRegistration {
    pub register: fn(&mut TypeRegistry) -> Result<(), RegistrationError>,
}

#[cfg(feature = "auto_register")]
inventory::collect!(AdapterRegistration);

// -----------------------------------------------------------------------------
// SharedRegistry

/// A process-wide registry handle: locked writes, lock-free snapshot reads.
///
/// Registration clones the current table, applies the edit, and swaps in the
/// result, so readers holding a [`snapshot`](SharedRegistry::snapshot) are
/// never blocked and never observe a half-applied edit.
#[derive(Default)]
pub struct SharedRegistry {
    inner: RwLock<Arc<TypeRegistry>>,
}

impl SharedRegistry {
    /// Wraps an already populated registry.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    /// An immutable snapshot of the current registry.
    ///
    /// Pack sessions hold the snapshot for their whole traversal; edits made
    /// after the snapshot was taken are invisible to them.
    pub fn snapshot(&self) -> Arc<TypeRegistry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `edit` to a copy of the registry and swaps the copy in.
    pub fn edit<R>(&self, edit: impl FnOnce(&mut TypeRegistry) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = TypeRegistry::clone(&guard);
        let result = edit(&mut next);
        *guard = Arc::new(next);
        result
    }
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}

// -----------------------------------------------------------------------------
// Tests
