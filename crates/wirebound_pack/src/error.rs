//! Producer-side error types.

use core::{error, fmt};

// -----------------------------------------------------------------------------
// RegistrationError

/// A registration call that cannot be honored.
///
/// Fatal to the call only; the registry keeps its previous state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A different adapter is already registered for the target type.
    ///
    /// Re-registering the *same* adapter type is idempotent and does not
    /// produce this error.
    AdapterConflict { target: &'static str },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterConflict { target } => {
                write!(f, "a different adapter is already registered for `{target}`")
            }
        }
    }
}

impl error::Error for RegistrationError {}

// -----------------------------------------------------------------------------
// PackError

/// An enumeration of all error outcomes of a pack session.
///
/// Any of these aborts the whole session; no partial document is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PackError {
    /// A non-primitive value whose type chain hits no registered adapter.
    NoAdapter {
        type_path: &'static str,
        at: Option<String>,
    },
    /// An adapter was resolved through a type chain but cannot view the
    /// concrete value it received.
    AdapterMismatch {
        expected: &'static str,
        found: &'static str,
        at: Option<String>,
    },
    /// A float with no JSON representation (NaN or an infinity).
    NonFiniteNumber { value: f64, at: Option<String> },
    /// A placeholder that was never patched reached the packer.
    UnresolvedPlaceholder { at: Option<String> },
}

impl PackError {
    /// Attaches the traversal path at which the error surfaced, unless one
    /// was already recorded deeper in the graph.
    pub(crate) fn with_path(mut self, path: String) -> Self {
        let at = match &mut self {
            Self::NoAdapter { at, .. }
            | Self::AdapterMismatch { at, .. }
            | Self::NonFiniteNumber { at, .. }
            | Self::UnresolvedPlaceholder { at } => at,
        };
        if at.is_none() {
            *at = Some(path);
        }
        self
    }
}

fn write_at(f: &mut fmt::Formatter<'_>, at: &Option<String>) -> fmt::Result {
    match at {
        Some(path) => write!(f, " (at {path})"),
        None => Ok(()),
    }
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter { type_path, at } => {
                write!(f, "no adapter registered for type `{type_path}`")?;
                write_at(f, at)
            }
            Self::AdapterMismatch {
                expected,
                found,
                at,
            } => {
                write!(
                    f,
                    "adapter for `{expected}` cannot describe a value of type `{found}`"
                )?;
                write_at(f, at)
            }
            Self::NonFiniteNumber { value, at } => {
                write!(f, "`{value}` has no JSON representation")?;
                write_at(f, at)
            }
            Self::UnresolvedPlaceholder { at } => {
                f.write_str("cannot pack a placeholder that was never patched")?;
                write_at(f, at)
            }
        }
    }
}

impl error::Error for PackError {}
