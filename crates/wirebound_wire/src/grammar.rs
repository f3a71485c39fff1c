//! The reserved-key encoding scheme and its legality rules.
//!
//! ## Menu
//!
//! - [`RESERVED_KEYS`]: the seven key names the protocol claims for itself.
//! - [`classify`]: decide which legal [`WireForm`] a JSON mapping takes.
//! - [`MalformedWireError`]: every way a mapping can get the grammar wrong.
//!
//! Independently implemented producers and consumers interoperate at this
//! tree level, so the rules here are bit-exact: key names, the exact set of
//! keys each form allows, and the integer shape of identities.

use core::{error, fmt};

use serde_json::{Map, Value as JsonValue};

// -----------------------------------------------------------------------------
// Reserved keys

/// Names a constructor in a [`WireForm::Construct`] node.
pub const TYPE_KEY: &str = "_type";
/// Holds the ordered argument list of a [`WireForm::Construct`] node.
pub const ARGS_KEY: &str = "_args";
/// Tags a node with a per-document identity so later `_ref`s can reach it.
pub const ID_KEY: &str = "_id";
/// Points at an identity-bearing node elsewhere in the same document.
pub const REF_KEY: &str = "_ref";
/// Long-form wrapper for a data mapping whose own keys collide with the grammar.
pub const DICT_KEY: &str = "_dict";
/// Long-form wrapper for a sequence that needs an identity tag.
pub const LIST_KEY: &str = "_list";
/// Long-form wrapper for a scalar that needs an identity tag.
pub const VAL_KEY: &str = "_val";

/// Every key name reserved by the wire grammar.
pub const RESERVED_KEYS: [&str; 7] = [
    TYPE_KEY, ARGS_KEY, ID_KEY, REF_KEY, DICT_KEY, LIST_KEY, VAL_KEY,
];

/// Whether `key` is claimed by the wire grammar.
#[inline]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Whether `map` contains at least one reserved key, making it *special*.
#[inline]
pub fn has_reserved_key(map: &Map<String, JsonValue>) -> bool {
    map.keys().any(|key| is_reserved(key))
}

// -----------------------------------------------------------------------------
// WireForm

/// The legal shapes a JSON mapping can take on the wire.
///
/// Borrowed views into the classified mapping; produced by [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub enum WireForm<'a> {
    /// No reserved keys: the mapping is literal data.
    Plain,
    /// `{"_type": "...", "_args": [...]}` plus an optional `_id`.
    Construct {
        constructor: &'a str,
        args: &'a [JsonValue],
        id: Option<u64>,
    },
    /// `{"_ref": n}`, alone: a reference to the node tagged `"_id": n`.
    Ref { id: u64 },
    /// `{"_dict": {...}}` plus an optional `_id`.
    Dict {
        entries: &'a Map<String, JsonValue>,
        id: Option<u64>,
    },
    /// `{"_list": [...]}` plus an optional `_id`.
    List {
        items: &'a [JsonValue],
        id: Option<u64>,
    },
    /// `{"_val": scalar}` plus an optional `_id`.
    Val {
        value: &'a JsonValue,
        id: Option<u64>,
    },
}

impl WireForm<'_> {
    /// The identity tag carried by this form, if any.
    ///
    /// `Plain` never carries one and `Ref` *targets* one rather than
    /// declaring it.
    pub fn identity(&self) -> Option<u64> {
        match self {
            Self::Construct { id, .. }
            | Self::Dict { id, .. }
            | Self::List { id, .. }
            | Self::Val { id, .. } => *id,
            Self::Plain | Self::Ref { .. } => None,
        }
    }
}

/// Classifies a JSON mapping against the wire grammar.
///
/// A mapping with no reserved keys is [`WireForm::Plain`]. A special mapping
/// must match exactly one form; any other reserved-key combination is
/// malformed, as is a reserved key holding a value of the wrong JSON kind.
///
/// # Examples
///
/// ```
/// use wirebound_wire::grammar::{classify, WireForm};
///
/// let doc = serde_json::json!({"_type": "collie", "_args": []});
/// let Some(map) = doc.as_object() else { unreachable!() };
///
/// let form = classify(map).unwrap();
/// assert!(matches!(form, WireForm::Construct { constructor: "collie", .. }));
/// ```
pub fn classify(map: &Map<String, JsonValue>) -> Result<WireForm<'_>, MalformedWireError> {
    if !has_reserved_key(map) {
        return Ok(WireForm::Plain);
    }

    if map.contains_key(REF_KEY) {
        if let Some(stray) = map.keys().find(|key| *key != REF_KEY) {
            return Err(MalformedWireError::StrayKey {
                form: REF_KEY,
                key: stray.clone(),
            });
        }
        let id = expect_identity(map, REF_KEY)?;
        return Ok(WireForm::Ref { id });
    }

    let body = body_key(map)?;
    let id = optional_identity(map)?;

    for key in map.keys() {
        let allowed = key == body || key == ID_KEY || (body == TYPE_KEY && key == ARGS_KEY);
        if !allowed {
            return Err(MalformedWireError::StrayKey {
                form: body,
                key: key.clone(),
            });
        }
    }

    match body {
        TYPE_KEY => {
            let constructor = match map.get(TYPE_KEY) {
                Some(JsonValue::String(name)) => name.as_str(),
                _ => {
                    return Err(MalformedWireError::WrongKind {
                        key: TYPE_KEY,
                        expected: "string",
                    });
                }
            };
            let args = match map.get(ARGS_KEY) {
                Some(JsonValue::Array(args)) => args.as_slice(),
                Some(_) => {
                    return Err(MalformedWireError::WrongKind {
                        key: ARGS_KEY,
                        expected: "array",
                    });
                }
                None => return Err(MalformedWireError::MissingArgs),
            };
            Ok(WireForm::Construct {
                constructor,
                args,
                id,
            })
        }
        DICT_KEY => match map.get(DICT_KEY) {
            Some(JsonValue::Object(entries)) => Ok(WireForm::Dict { entries, id }),
            _ => Err(MalformedWireError::WrongKind {
                key: DICT_KEY,
                expected: "object",
            }),
        },
        LIST_KEY => match map.get(LIST_KEY) {
            Some(JsonValue::Array(items)) => Ok(WireForm::List {
                items: items.as_slice(),
                id,
            }),
            _ => Err(MalformedWireError::WrongKind {
                key: LIST_KEY,
                expected: "array",
            }),
        },
        _ => match map.get(VAL_KEY) {
            Some(value) if !value.is_array() && !value.is_object() => {
                Ok(WireForm::Val { value, id })
            }
            _ => Err(MalformedWireError::WrongKind {
                key: VAL_KEY,
                expected: "scalar",
            }),
        },
    }
}

// Exactly one of `_type`/`_dict`/`_list`/`_val` must name the body.
fn body_key(map: &Map<String, JsonValue>) -> Result<&'static str, MalformedWireError> {
    let mut body = None;
    for candidate in [TYPE_KEY, DICT_KEY, LIST_KEY, VAL_KEY] {
        if map.contains_key(candidate) {
            match body {
                None => body = Some(candidate),
                Some(first) => {
                    return Err(MalformedWireError::ConflictingKeys {
                        first,
                        second: candidate,
                    });
                }
            }
        }
    }
    match body {
        Some(body) => Ok(body),
        // Only `_args` and/or `_id` can remain at this point.
        None => Err(MalformedWireError::OrphanKey {
            key: if map.contains_key(ARGS_KEY) {
                ARGS_KEY
            } else {
                ID_KEY
            },
        }),
    }
}

fn optional_identity(map: &Map<String, JsonValue>) -> Result<Option<u64>, MalformedWireError> {
    match map.get(ID_KEY) {
        None => Ok(None),
        Some(_) => expect_identity(map, ID_KEY).map(Some),
    }
}

fn expect_identity(map: &Map<String, JsonValue>, key: &'static str) -> Result<u64, MalformedWireError> {
    map.get(key)
        .and_then(JsonValue::as_u64)
        .ok_or(MalformedWireError::WrongKind {
            key,
            expected: "non-negative integer",
        })
}

// -----------------------------------------------------------------------------
// MalformedWireError

/// An enumeration of all the ways a mapping can violate the wire grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedWireError {
    /// Two body keys (`_type`/`_dict`/`_list`/`_val`) in one mapping.
    ConflictingKeys {
        first: &'static str,
        second: &'static str,
    },
    /// A key that the matched form does not allow.
    StrayKey { form: &'static str, key: String },
    /// `_args` or `_id` with no body key to attach to.
    OrphanKey { key: &'static str },
    /// `_type` without `_args`.
    MissingArgs,
    /// A reserved key holding a value of the wrong JSON kind.
    WrongKind {
        key: &'static str,
        expected: &'static str,
    },
    /// The same identity declared by two nodes in one document.
    DuplicateIdentity { id: u64 },
}

impl fmt::Display for MalformedWireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingKeys { first, second } => {
                write!(f, "mapping mixes `{first}` and `{second}`")
            }
            Self::StrayKey { form, key } => {
                write!(f, "`{form}` node carries unexpected key `{key}`")
            }
            Self::OrphanKey { key } => {
                write!(f, "`{key}` appears without a node body to attach to")
            }
            Self::MissingArgs => write!(f, "`{TYPE_KEY}` node is missing `{ARGS_KEY}`"),
            Self::WrongKind { key, expected } => {
                write!(f, "`{key}` must hold a {expected}")
            }
            Self::DuplicateIdentity { id } => {
                write!(f, "identity {id} is declared more than once")
            }
        }
    }
}

impl error::Error for MalformedWireError {}

// -----------------------------------------------------------------------------
// Tests
