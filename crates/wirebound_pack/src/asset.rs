//! Asset locators and their per-session aggregation.

use core::fmt;
use std::borrow::Cow;
use std::collections::BTreeSet;

// -----------------------------------------------------------------------------
// Asset

/// A locator for something the consumer must load before it can execute a
/// document's constructors, typically a script path.
///
/// Relative locators are resolved against the owning registry's asset base
/// (when one is configured) as they enter a session's [`DependencySet`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asset(Cow<'static, str>);

impl Asset {
    /// Creates an asset from a static locator without allocating.
    #[inline]
    pub const fn from_static(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    /// Creates an asset from any locator.
    #[inline]
    pub fn new(path: impl Into<Cow<'static, str>>) -> Self {
        Self(path.into())
    }

    /// The locator as given.
    #[inline]
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Whether the locator is relative (no leading `/`, no scheme).
    pub fn is_relative(&self) -> bool {
        !self.0.starts_with('/') && !self.0.contains("://")
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Asset {
    fn from(path: &'static str) -> Self {
        Self::from_static(path)
    }
}

impl From<String> for Asset {
    fn from(path: String) -> Self {
        Self(Cow::Owned(path))
    }
}

// -----------------------------------------------------------------------------
// DependencySet

/// The deduplicated union of every asset declared by adapters invoked during
/// a session.
///
/// Iteration order is the locators' lexicographic order, so a given graph
/// always reports its dependencies identically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencySet(BTreeSet<Asset>);

impl DependencySet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset. Returns `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, asset: Asset) -> bool {
        self.0.insert(asset)
    }

    #[inline]
    pub fn contains(&self, asset: &Asset) -> bool {
        self.0.contains(asset)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Folds another set into this one.
    pub fn merge(&mut self, other: &DependencySet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.0.iter()
    }
}

impl Extend<Asset> for DependencySet {
    fn extend<I: IntoIterator<Item = Asset>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<Asset> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Asset>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DependencySet {
    type Item = Asset;
    type IntoIter = std::collections::btree_set::IntoIter<Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// -----------------------------------------------------------------------------
// Tests
