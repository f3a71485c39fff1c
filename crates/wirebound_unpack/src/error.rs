//! Consumer-side error types.

use core::{error, fmt};

use wirebound_wire::MalformedWireError;

// -----------------------------------------------------------------------------
// FactoryError

/// A factory's refusal to construct a value from the arguments it was given.
///
/// Factories produce these; the engine wraps them into
/// [`UnpackError::Construction`] together with the constructor name and the
/// document position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryError {
    message: String,
}

impl FactoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl error::Error for FactoryError {}

// -----------------------------------------------------------------------------
// RegistrationError

/// A registration call that cannot be honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A different factory is already registered for the constructor.
    ///
    /// Re-registering the *same* shared factory is idempotent and does not
    /// produce this error.
    ConstructorConflict { constructor: String },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructorConflict { constructor } => {
                write!(
                    f,
                    "a different factory is already registered for `{constructor}`"
                )
            }
        }
    }
}

impl error::Error for RegistrationError {}

// -----------------------------------------------------------------------------
// UnpackError

/// An enumeration of all error outcomes of unpacking a document.
///
/// Any of these aborts the whole unpack; no partial graph is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UnpackError {
    /// A mapping somewhere in the document violates the wire grammar.
    Malformed {
        error: MalformedWireError,
        at: Option<String>,
    },
    /// A `_type` node names a constructor with no registered factory.
    UnknownConstructor {
        constructor: String,
        at: Option<String>,
    },
    /// A `_ref` targets an identity no node in the document declares.
    DanglingReference { id: u64, at: Option<String> },
    /// A factory refused the decoded arguments.
    Construction {
        constructor: String,
        message: String,
        at: Option<String>,
    },
}

fn write_at(f: &mut fmt::Formatter<'_>, at: &Option<String>) -> fmt::Result {
    match at {
        Some(path) => write!(f, " (at {path})"),
        None => Ok(()),
    }
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { error, at } => {
                write!(f, "malformed document: {error}")?;
                write_at(f, at)
            }
            Self::UnknownConstructor { constructor, at } => {
                write!(f, "no factory registered for constructor `{constructor}`")?;
                write_at(f, at)
            }
            Self::DanglingReference { id, at } => {
                write!(f, "reference to identity {id}, which no node declares")?;
                write_at(f, at)
            }
            Self::Construction {
                constructor,
                message,
                at,
            } => {
                write!(f, "constructor `{constructor}` failed: {message}")?;
                write_at(f, at)
            }
        }
    }
}

impl error::Error for UnpackError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Malformed { error, .. } => Some(error),
            _ => None,
        }
    }
}
