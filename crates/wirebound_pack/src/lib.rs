#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Modules

pub mod adapter;
pub mod asset;
pub mod error;
pub mod registry;
pub mod session;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use adapter::{Adapter, Describe, Descriptor, SelfAdapter};
pub use asset::{Asset, DependencySet};
pub use error::{PackError, RegistrationError};
pub use registry::{SharedRegistry, TypeRegistry};
pub use session::PackSession;

#[cfg(feature = "auto_register")]
pub use registry::AdapterRegistration;

use wirebound_wire::Value;

// -----------------------------------------------------------------------------
// One-shot packing

/// A packed document together with the assets its constructors require.
#[derive(Debug, Clone)]
pub struct Packed {
    pub document: serde_json::Value,
    pub dependencies: DependencySet,
}

/// Packs a single value with a throwaway session.
///
/// Use [`PackSession`] directly when several documents on one page should
/// share a dependency accumulator.
pub fn pack(registry: &TypeRegistry, value: &Value) -> Result<Packed, PackError> {
    let mut session = PackSession::new(registry);
    let document = session.pack(value)?;
    Ok(Packed {
        document,
        dependencies: session.into_dependencies(),
    })
}

// -----------------------------------------------------------------------------
// Macro support

#[cfg(feature = "auto_register")]
#[doc(hidden)]
pub mod __macro_exports {
    pub use inventory;
}

/// Declares a [`Describe`] type for static registration.
///
/// Every declared type is picked up by
/// [`TypeRegistry::auto_register`](crate::TypeRegistry::auto_register).
#[cfg(feature = "auto_register")]
#[macro_export]
macro_rules! register_packable {
    ($ty:ty) => {
        $crate::__macro_exports::inventory::submit! {
            $crate::AdapterRegistration {
                register: |registry| registry.register::<$ty>(),
            }
        }
    };
}
