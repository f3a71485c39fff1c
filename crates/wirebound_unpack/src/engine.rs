//! The unpacking engine: factory registration, document validation, on-demand
//! node construction.
//!
//! Unpacking is two passes. The **index pass** classifies every mapping in
//! the document against the wire grammar and records where each declared
//! identity lives, so malformed documents and duplicate identities are
//! rejected before any factory runs. The **build pass** then decodes the root
//! on demand: a `_ref` to an already-built identity hands back the same
//! allocation, a forward `_ref` decodes its target immediately, and a `_ref`
//! that closes a cycle yields a [`Placeholder`] patched the moment the
//! target's construction completes.

use std::sync::Arc;

use serde_json::{Map, Number, Value as JsonValue};
use wirebound_wire::grammar::{MalformedWireError, WireForm, classify};
use wirebound_wire::hash::{HashMap, HashSet};
use wirebound_wire::path::{PathStack, Segment};
use wirebound_wire::{Placeholder, Value};

use crate::error::{FactoryError, RegistrationError, UnpackError};

// -----------------------------------------------------------------------------
// Factory

/// A registered constructor: turns a decoded argument list back into a value.
///
/// When a document carries a cycle, one or more arguments arrive as
/// [`Value::Placeholder`] handles that are patched right after the factory
/// returns; factories that only store their arguments need not care, and
/// factories that inspect them should treat an unfilled placeholder as
/// opaque.
///
/// Any `Fn(Vec<Value>) -> Result<Value, FactoryError>` closure is a factory.
pub trait Factory: Send + Sync {
    fn construct(&self, args: Vec<Value>) -> Result<Value, FactoryError>;
}

impl<F> Factory for F
where
    F: Fn(Vec<Value>) -> Result<Value, FactoryError> + Send + Sync,
{
    fn construct(&self, args: Vec<Value>) -> Result<Value, FactoryError> {
        self(args)
    }
}

// -----------------------------------------------------------------------------
// UnpackEngine

/// A table of constructor factories plus the decoding entry point.
///
/// Registration happens during initialization; [`unpack`](UnpackEngine::unpack)
/// takes `&self` and never mutates the table, so one engine serves any number
/// of documents.
///
/// # Example
///
/// ```
/// use wirebound_unpack::{FactoryError, UnpackEngine};
/// use wirebound_wire::Value;
///
/// let mut engine = UnpackEngine::new();
/// engine
///     .register("demo.Shout", |args: Vec<Value>| match args.as_slice() {
///         [Value::Str(text)] => Ok(Value::from(text.to_uppercase())),
///         _ => Err(FactoryError::new("demo.Shout expects one string")),
///     })
///     .unwrap();
///
/// let document = serde_json::json!({"_type": "demo.Shout", "_args": ["hi"]});
/// assert_eq!(engine.unpack(&document).unwrap(), Value::from("HI"));
/// ```
#[derive(Default)]
pub struct UnpackEngine {
    factories: HashMap<String, Arc<dyn Factory>>,
}

impl UnpackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a constructor identifier.
    ///
    /// Fails with [`RegistrationError::ConstructorConflict`] when the
    /// identifier already has a factory; use
    /// [`register_shared`](UnpackEngine::register_shared) when idempotent
    /// re-registration of one shared factory is wanted.
    pub fn register<F: Factory + 'static>(
        &mut self,
        constructor: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistrationError> {
        self.register_shared(constructor, Arc::new(factory))
    }

    /// Registers an already shared factory.
    ///
    /// Registering the *same* `Arc` for the same identifier again is a no-op.
    pub fn register_shared(
        &mut self,
        constructor: impl Into<String>,
        factory: Arc<dyn Factory>,
    ) -> Result<(), RegistrationError> {
        let constructor = constructor.into();
        match self.factories.get(&constructor) {
            Some(existing) if Arc::ptr_eq(existing, &factory) => Ok(()),
            Some(_) => Err(RegistrationError::ConstructorConflict { constructor }),
            None => {
                self.factories.insert(constructor, factory);
                Ok(())
            }
        }
    }

    /// Whether a factory is registered for `constructor`.
    pub fn contains(&self, constructor: &str) -> bool {
        self.factories.contains_key(constructor)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Rebuilds the value graph a document describes.
    pub fn unpack(&self, document: &JsonValue) -> Result<Value, UnpackError> {
        let mut decoder = Decoder::new(self);
        decoder.index_value(document)?;
        decoder.decode(document)
    }
}

// -----------------------------------------------------------------------------
// Decoder

struct Decoder<'a> {
    engine: &'a UnpackEngine,
    // Where each declared identity lives, filled by the index pass.
    index: HashMap<u64, &'a Map<String, JsonValue>>,
    built: HashMap<u64, Value>,
    // Placeholders handed out for identities still under construction.
    pending: HashMap<u64, Placeholder>,
    in_progress: HashSet<u64>,
    path: PathStack,
}

impl<'a> Decoder<'a> {
    fn new(engine: &'a UnpackEngine) -> Self {
        Self {
            engine,
            index: HashMap::default(),
            built: HashMap::default(),
            pending: HashMap::default(),
            in_progress: HashSet::default(),
            path: PathStack::new(),
        }
    }

    fn classify_here(
        &self,
        map: &'a Map<String, JsonValue>,
    ) -> Result<WireForm<'a>, UnpackError> {
        classify(map).map_err(|error| UnpackError::Malformed {
            error,
            at: Some(self.path.render()),
        })
    }

    // -- index pass -------------------------------------------------------------

    fn index_value(&mut self, value: &'a JsonValue) -> Result<(), UnpackError> {
        match value {
            JsonValue::Array(items) => {
                for (position, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(position));
                    self.index_value(item)?;
                    self.path.pop();
                }
                Ok(())
            }
            JsonValue::Object(map) => {
                let form = self.classify_here(map)?;
                if let Some(id) = form.identity() {
                    if self.index.insert(id, map).is_some() {
                        return Err(UnpackError::Malformed {
                            error: MalformedWireError::DuplicateIdentity { id },
                            at: Some(self.path.render()),
                        });
                    }
                }
                match form {
                    WireForm::Plain => {
                        for (key, entry) in map {
                            self.path.push(Segment::Key(key.clone()));
                            self.index_value(entry)?;
                            self.path.pop();
                        }
                    }
                    WireForm::Construct { args, .. } => {
                        for (position, arg) in args.iter().enumerate() {
                            self.path.push(Segment::Arg(position));
                            self.index_value(arg)?;
                            self.path.pop();
                        }
                    }
                    WireForm::Dict { entries, .. } => {
                        for (key, entry) in entries {
                            self.path.push(Segment::Key(key.clone()));
                            self.index_value(entry)?;
                            self.path.pop();
                        }
                    }
                    WireForm::List { items, .. } => {
                        for (position, item) in items.iter().enumerate() {
                            self.path.push(Segment::Index(position));
                            self.index_value(item)?;
                            self.path.pop();
                        }
                    }
                    WireForm::Ref { .. } | WireForm::Val { .. } => {}
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // -- build pass -------------------------------------------------------------

    fn decode(&mut self, value: &'a JsonValue) -> Result<Value, UnpackError> {
        match value {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(value) => Ok(Value::Bool(*value)),
            JsonValue::Number(number) => Ok(decode_number(number)),
            JsonValue::String(text) => Ok(Value::from(text.as_str())),
            JsonValue::Array(items) => {
                let mut decoded = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(position));
                    let value = self.decode(item)?;
                    self.path.pop();
                    decoded.push(value);
                }
                Ok(Value::from(decoded))
            }
            JsonValue::Object(map) => {
                let form = self.classify_here(map)?;
                match form {
                    WireForm::Plain => self.decode_entries(map),
                    WireForm::Ref { id } => self.resolve_reference(id),
                    _ => match form.identity() {
                        Some(id) => {
                            if let Some(value) = self.built.get(&id) {
                                return Ok(value.clone());
                            }
                            self.decode_identified(id, form)
                        }
                        None => self.build(form),
                    },
                }
            }
        }
    }

    fn resolve_reference(&mut self, id: u64) -> Result<Value, UnpackError> {
        if let Some(value) = self.built.get(&id) {
            return Ok(value.clone());
        }
        // A reference back into a node currently being built closes a cycle.
        if self.in_progress.contains(&id) {
            let placeholder = self
                .pending
                .entry(id)
                .or_insert_with(Placeholder::new)
                .clone();
            return Ok(Value::Placeholder(placeholder));
        }
        // Forward reference: decode the target now.
        match self.index.get(&id) {
            Some(target) => {
                let target = *target;
                let form = self.classify_here(target)?;
                self.decode_identified(id, form)
            }
            None => Err(UnpackError::DanglingReference {
                id,
                at: Some(self.path.render()),
            }),
        }
    }

    fn decode_identified(&mut self, id: u64, form: WireForm<'a>) -> Result<Value, UnpackError> {
        self.in_progress.insert(id);
        let value = self.build(form)?;
        self.in_progress.remove(&id);
        if let Some(placeholder) = self.pending.remove(&id) {
            placeholder.fill(value.clone());
        }
        self.built.insert(id, value.clone());
        Ok(value)
    }

    fn build(&mut self, form: WireForm<'a>) -> Result<Value, UnpackError> {
        match form {
            WireForm::Construct {
                constructor, args, ..
            } => {
                let factory = self.engine.factories.get(constructor).cloned().ok_or_else(
                    || UnpackError::UnknownConstructor {
                        constructor: constructor.to_owned(),
                        at: Some(self.path.render()),
                    },
                )?;
                let mut decoded = Vec::with_capacity(args.len());
                for (position, arg) in args.iter().enumerate() {
                    self.path.push(Segment::Arg(position));
                    let value = self.decode(arg)?;
                    self.path.pop();
                    decoded.push(value);
                }
                factory
                    .construct(decoded)
                    .map_err(|error| UnpackError::Construction {
                        constructor: constructor.to_owned(),
                        message: error.to_string(),
                        at: Some(self.path.render()),
                    })
            }
            WireForm::Dict { entries, .. } => self.decode_entries(entries),
            WireForm::List { items, .. } => {
                let mut decoded = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(position));
                    let value = self.decode(item)?;
                    self.path.pop();
                    decoded.push(value);
                }
                Ok(Value::from(decoded))
            }
            WireForm::Val { value, .. } => Ok(match value {
                JsonValue::Null => Value::Null,
                JsonValue::Bool(value) => Value::Bool(*value),
                JsonValue::Number(number) => decode_number(number),
                JsonValue::String(text) => Value::from(text.as_str()),
                // classify admits scalars only.
                _ => unreachable!("`_val` holds a scalar"),
            }),
            WireForm::Plain | WireForm::Ref { .. } => {
                unreachable!("plain and ref forms are handled by the caller")
            }
        }
    }

    fn decode_entries(
        &mut self,
        entries: &'a Map<String, JsonValue>,
    ) -> Result<Value, UnpackError> {
        let mut decoded = std::collections::BTreeMap::new();
        for (key, entry) in entries {
            self.path.push(Segment::Key(key.clone()));
            let value = self.decode(entry)?;
            self.path.pop();
            decoded.insert(key.clone(), value);
        }
        Ok(Value::from(decoded))
    }
}

fn decode_number(number: &Number) -> Value {
    match number.as_i64() {
        Some(value) => Value::Int(value),
        None => number.as_f64().map(Value::Float).unwrap_or(Value::Null),
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use serde_json::json;
    use wirebound_wire::Packable;

    use super::*;

    struct LinkedNode {
        label: Value,
        next: RwLock<Value>,
    }

    impl Packable for LinkedNode {}

    fn engine() -> UnpackEngine {
        let mut engine = UnpackEngine::new();
        engine
            .register(
                "demo.Node",
                |mut args: Vec<Value>| -> Result<Value, FactoryError> {
                    let next = args.pop().ok_or_else(|| FactoryError::new("missing next"))?;
                    let label = args.pop().ok_or_else(|| FactoryError::new("missing label"))?;
                    Ok(Value::object(LinkedNode {
                        label,
                        next: RwLock::new(next),
                    }))
                },
            )
            .unwrap();
        engine
    }

    #[test]
    fn scalars_and_containers_decode_structurally() {
        let engine = engine();
        let document = json!({"title": "Autobahn", "tracks": [1, 2.5, true, null]});

        let value = engine.unpack(&document).unwrap();
        assert_eq!(
            value,
            Value::map([
                ("title", Value::from("Autobahn")),
                (
                    "tracks",
                    Value::list([
                        Value::Int(1),
                        Value::Float(2.5),
                        Value::Bool(true),
                        Value::Null,
                    ]),
                ),
            ]),
        );
    }

    #[test]
    fn construct_nodes_run_their_factory() {
        let engine = engine();
        let document = json!({"_type": "demo.Node", "_args": ["head", null]});

        let value = engine.unpack(&document).unwrap();
        let Some(node) = value.downcast_ref::<LinkedNode>() else {
            panic!("expected a LinkedNode")
        };
        assert_eq!(node.label, Value::from("head"));
        assert_eq!(*node.next.read().unwrap(), Value::Null);
    }

    #[test]
    fn backward_references_alias_the_built_node() {
        let engine = engine();
        let document = json!([
            {"_type": "demo.Node", "_args": ["solo", null], "_id": 0},
            {"_ref": 0},
        ]);

        let Value::List(items) = engine.unpack(&document).unwrap() else {
            panic!("expected a list")
        };
        assert!(items[0].same_instance(&items[1]));
    }

    #[test]
    fn forward_references_decode_their_target_immediately() {
        let engine = engine();
        let document = json!([{"_ref": 0}, {"_val": "shared", "_id": 0}]);

        let Value::List(items) = engine.unpack(&document).unwrap() else {
            panic!("expected a list")
        };
        assert_eq!(items[0], Value::from("shared"));
        assert!(items[0].same_instance(&items[1]));
        assert!(!matches!(items[0], Value::Placeholder(_)));
    }

    #[test]
    fn cycles_come_back_through_a_patched_placeholder() {
        let engine = engine();
        let document = json!({"_type": "demo.Node", "_args": ["loop", {"_ref": 0}], "_id": 0});

        let root = engine.unpack(&document).unwrap();
        let Some(node) = root.downcast_ref::<LinkedNode>() else {
            panic!("expected a LinkedNode")
        };
        let next = node.next.read().unwrap().clone();
        assert!(next.same_instance(&root));
    }

    #[test]
    fn shared_dicts_and_lists_alias() {
        let engine = engine();
        let document = json!([
            {"_dict": {"breed": "collie"}, "_id": 0},
            {"_ref": 0},
            {"_list": [1], "_id": 1},
            {"_ref": 1},
        ]);

        let Value::List(items) = engine.unpack(&document).unwrap() else {
            panic!("expected a list")
        };
        assert!(items[0].same_instance(&items[1]));
        assert!(items[2].same_instance(&items[3]));
    }

    #[test]
    fn escaped_mappings_decode_to_their_literal_keys() {
        let engine = engine();
        let document = json!({"_dict": {"_type": "collie"}});

        assert_eq!(
            engine.unpack(&document).unwrap(),
            Value::map([("_type", Value::from("collie"))]),
        );
    }

    #[test]
    fn unknown_constructors_are_reported_with_their_position() {
        let engine = engine();
        let document = json!([{"_type": "demo.Missing", "_args": []}]);

        let error = engine.unpack(&document).unwrap_err();
        let UnpackError::UnknownConstructor { constructor, at } = error else {
            panic!("expected UnknownConstructor")
        };
        assert_eq!(constructor, "demo.Missing");
        assert_eq!(at.as_deref(), Some("root[0]"));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let engine = engine();
        let document = json!({"_ref": 9});

        let error = engine.unpack(&document).unwrap_err();
        assert!(matches!(error, UnpackError::DanglingReference { id: 9, .. }));
    }

    #[test]
    fn duplicate_identities_are_rejected_before_any_factory_runs() {
        let engine = engine();
        let document = json!([
            {"_val": "a", "_id": 2},
            {"_val": "b", "_id": 2},
        ]);

        let error = engine.unpack(&document).unwrap_err();
        assert!(matches!(
            error,
            UnpackError::Malformed {
                error: MalformedWireError::DuplicateIdentity { id: 2 },
                ..
            }
        ));
    }

    #[test]
    fn malformed_mappings_are_rejected_during_indexing() {
        let engine = engine();
        let document = json!({"outer": [{"_id": 3}]});

        let error = engine.unpack(&document).unwrap_err();
        let UnpackError::Malformed { at, .. } = error else {
            panic!("expected Malformed")
        };
        assert_eq!(at.as_deref(), Some("root.outer[0]"));
    }

    #[test]
    fn factory_refusals_surface_as_construction_errors() {
        let engine = engine();
        let document = json!({"_type": "demo.Node", "_args": []});

        let error = engine.unpack(&document).unwrap_err();
        let UnpackError::Construction {
            constructor,
            message,
            ..
        } = error
        else {
            panic!("expected Construction")
        };
        assert_eq!(constructor, "demo.Node");
        assert_eq!(message, "missing next");
    }

    #[test]
    fn conflicting_registration_is_refused() {
        let mut engine = engine();
        let error = engine
            .register("demo.Node", |_: Vec<Value>| -> Result<Value, FactoryError> {
                Ok(Value::Null)
            })
            .unwrap_err();
        assert!(matches!(
            error,
            RegistrationError::ConstructorConflict { .. }
        ));
    }

    #[test]
    fn shared_factory_re_registration_is_idempotent() {
        let factory: Arc<dyn Factory> =
            Arc::new(|_: Vec<Value>| -> Result<Value, FactoryError> { Ok(Value::Null) });

        let mut engine = UnpackEngine::new();
        engine.register_shared("demo.Nothing", factory.clone()).unwrap();
        engine.register_shared("demo.Nothing", factory).unwrap();
        assert_eq!(engine.len(), 1);
    }
}
