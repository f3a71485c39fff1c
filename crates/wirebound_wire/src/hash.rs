//! Hash containers with a fixed seed, shared by both sides of the wire.
//!
//! Lookup tables here never influence wire output (everything that reaches
//! the document goes through ordered structures), so a seeded fast hasher is
//! purely an internal choice.

use core::any::TypeId;
use core::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHashState

const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x4A11_D00D_93B2_7C55);

/// A hasher whose results depend only on the input.
pub type FixedHasher = FoldHasher<'static>;

/// [`BuildHasher`] for [`FixedHasher`], based on `foldhash` with a pinned
/// seed.
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

// -----------------------------------------------------------------------------
// Aliases

/// A `hashbrown` map seeded with [`FixedHashState`].
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// A `hashbrown` set seeded with [`FixedHashState`].
pub type HashSet<T> = hashbrown::HashSet<T, FixedHashState>;

/// A map keyed by [`TypeId`].
pub type TypeIdMap<V> = HashMap<TypeId, V>;

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    #[test]
    fn hashes_are_stable_across_builds() {
        let mut first = FixedHashState.build_hasher();
        let mut second = FixedHashState.build_hasher();
        first.write(b"wire");
        second.write(b"wire");
        assert_eq!(first.finish(), second.finish());
    }
}
