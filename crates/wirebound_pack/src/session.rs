//! The packing session: graph traversal, identity memoization, emission.
//!
//! A session packs one value graph at a time into a self-contained JSON
//! document and accumulates asset dependencies across documents. Packing is
//! two passes over an internal node arena:
//!
//! 1. **Traversal** walks the graph depth-first, memoizing every `Arc`-backed
//!    allocation by address *before* descending into its children, so a
//!    revisit (sharing or a cycle) lands on the already-reserved node. The
//!    revisit is the moment the node earns an identity tag.
//! 2. **Emission** renders the arena to JSON. A node is spelled out in full
//!    at its first appearance and as `{"_ref": n}` afterwards, so only nodes
//!    that are actually referenced carry an `_id`.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::{Map, Number, Value as JsonValue};
use wirebound_wire::Value;
use wirebound_wire::grammar::{
    ARGS_KEY, DICT_KEY, ID_KEY, LIST_KEY, REF_KEY, TYPE_KEY, VAL_KEY, is_reserved,
};
use wirebound_wire::hash::HashMap;
use wirebound_wire::path::{PathStack, Segment};

use crate::asset::DependencySet;
use crate::error::PackError;
use crate::registry::TypeRegistry;

// -----------------------------------------------------------------------------
// Nodes

enum Node {
    Scalar(JsonValue),
    Str {
        value: Arc<str>,
        id: Option<u64>,
    },
    List {
        items: Vec<usize>,
        id: Option<u64>,
    },
    Map {
        entries: Vec<(String, usize)>,
        // Set when the mapping's own keys collide with the reserved set.
        escape: bool,
        id: Option<u64>,
    },
    Construct {
        constructor: Cow<'static, str>,
        args: Vec<usize>,
        id: Option<u64>,
    },
}

impl Node {
    fn identity(&self) -> Option<u64> {
        match self {
            Self::Scalar(_) => None,
            Self::Str { id, .. }
            | Self::List { id, .. }
            | Self::Map { id, .. }
            | Self::Construct { id, .. } => *id,
        }
    }

    fn identity_slot(&mut self) -> Option<&mut Option<u64>> {
        match self {
            Self::Scalar(_) => None,
            Self::Str { id, .. }
            | Self::List { id, .. }
            | Self::Map { id, .. }
            | Self::Construct { id, .. } => Some(id),
        }
    }
}

// The memo key for a value that carries reference identity.
fn identity_key(value: &Value) -> Option<usize> {
    match value {
        Value::Str(value) => Some(Arc::as_ptr(value) as *const u8 as usize),
        Value::List(items) => Some(Arc::as_ptr(items) as usize),
        Value::Map(entries) => Some(Arc::as_ptr(entries) as usize),
        Value::Object(object) => Some(Arc::as_ptr(object) as *const () as usize),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// PackSession

/// Packs value graphs into wire documents against one registry snapshot.
///
/// Each [`pack`](PackSession::pack) call produces a self-contained document;
/// identities never leak from one document into the next. The
/// [`DependencySet`] is the part that *does* accumulate across calls, so one
/// session per page yields the union of every document's assets.
///
/// # Example
///
/// ```
/// use wirebound_pack::{PackSession, TypeRegistry};
/// use wirebound_wire::Value;
///
/// let registry = TypeRegistry::new();
/// let mut session = PackSession::new(&registry);
///
/// let track = Value::from("Trans-Europe Express");
/// let document = session.pack(&Value::list([track.clone(), track])).unwrap();
/// assert_eq!(
///     document,
///     serde_json::json!([{"_val": "Trans-Europe Express", "_id": 0}, {"_ref": 0}]),
/// );
/// ```
pub struct PackSession<'a> {
    registry: &'a TypeRegistry,
    nodes: Vec<Node>,
    memo: HashMap<usize, usize>,
    // Keeps memoized allocations alive so addresses cannot be reused for
    // distinct values within one pack call.
    retained: Vec<Value>,
    dependencies: DependencySet,
    next_id: u64,
    path: PathStack,
}

impl<'a> PackSession<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            memo: HashMap::default(),
            retained: Vec::new(),
            dependencies: DependencySet::new(),
            next_id: 0,
            path: PathStack::new(),
        }
    }

    /// Packs one value graph into a self-contained JSON document.
    pub fn pack(&mut self, value: &Value) -> Result<JsonValue, PackError> {
        self.nodes.clear();
        self.memo.clear();
        self.retained.clear();
        self.next_id = 0;
        self.path.clear();

        let root = self.pack_value(value)?;
        let mut emitted = vec![false; self.nodes.len()];
        Ok(self.emit_node(root, &mut emitted))
    }

    /// The assets required by every document packed so far.
    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// Consumes the session, yielding the accumulated assets.
    pub fn into_dependencies(self) -> DependencySet {
        self.dependencies
    }

    // -- traversal ------------------------------------------------------------

    fn pack_value(&mut self, value: &Value) -> Result<usize, PackError> {
        match value {
            Value::Null => Ok(self.push(Node::Scalar(JsonValue::Null))),
            Value::Bool(value) => Ok(self.push(Node::Scalar(JsonValue::Bool(*value)))),
            Value::Int(value) => Ok(self.push(Node::Scalar(JsonValue::from(*value)))),
            Value::Float(value) => {
                let number =
                    Number::from_f64(*value).ok_or_else(|| PackError::NonFiniteNumber {
                        value: *value,
                        at: Some(self.path.render()),
                    })?;
                Ok(self.push(Node::Scalar(JsonValue::Number(number))))
            }
            Value::Str(text) => {
                if let Some(index) = self.lookup(value) {
                    return Ok(index);
                }
                let index = self.push(Node::Str {
                    value: text.clone(),
                    id: None,
                });
                self.remember(value, index);
                Ok(index)
            }
            Value::List(list) => {
                if let Some(index) = self.lookup(value) {
                    return Ok(index);
                }
                let index = self.push(Node::List {
                    items: Vec::new(),
                    id: None,
                });
                // Memoize before descending so a cycle lands here.
                self.remember(value, index);

                let mut items = Vec::with_capacity(list.len());
                for (position, item) in list.iter().enumerate() {
                    self.path.push(Segment::Index(position));
                    let child = self.pack_value(item)?;
                    self.path.pop();
                    items.push(child);
                }
                if let Node::List { items: slot, .. } = &mut self.nodes[index] {
                    *slot = items;
                }
                Ok(index)
            }
            Value::Map(map) => {
                if let Some(index) = self.lookup(value) {
                    return Ok(index);
                }
                let escape = map.keys().any(|key| is_reserved(key));
                let index = self.push(Node::Map {
                    entries: Vec::new(),
                    escape,
                    id: None,
                });
                self.remember(value, index);

                let mut entries = Vec::with_capacity(map.len());
                for (key, entry) in map.iter() {
                    self.path.push(Segment::Key(key.clone()));
                    let child = self.pack_value(entry)?;
                    self.path.pop();
                    entries.push((key.clone(), child));
                }
                if let Node::Map { entries: slot, .. } = &mut self.nodes[index] {
                    *slot = entries;
                }
                Ok(index)
            }
            Value::Object(object) => {
                if let Some(index) = self.lookup(value) {
                    return Ok(index);
                }
                let registry = self.registry;
                let adapter = registry
                    .resolve(object.as_ref())
                    .map_err(|error| error.with_path(self.path.render()))?;
                for asset in adapter.assets() {
                    self.dependencies.insert(registry.locate(&asset));
                }
                let descriptor = adapter
                    .describe(object.as_ref())
                    .map_err(|error| error.with_path(self.path.render()))?;

                let index = self.push(Node::Construct {
                    constructor: descriptor.constructor,
                    args: Vec::new(),
                    id: None,
                });
                self.remember(value, index);

                let mut args = Vec::with_capacity(descriptor.args.len());
                for (position, arg) in descriptor.args.iter().enumerate() {
                    self.path.push(Segment::Arg(position));
                    let child = self.pack_value(arg)?;
                    self.path.pop();
                    args.push(child);
                }
                if let Node::Construct { args: slot, .. } = &mut self.nodes[index] {
                    *slot = args;
                }
                Ok(index)
            }
            Value::Placeholder(_) => {
                let target = value.follow();
                if matches!(target, Value::Placeholder(_)) {
                    return Err(PackError::UnresolvedPlaceholder {
                        at: Some(self.path.render()),
                    });
                }
                self.pack_value(target)
            }
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    // Memo hit: the node is referenced a second time, so it needs an `_id`.
    fn lookup(&mut self, value: &Value) -> Option<usize> {
        let key = identity_key(value)?;
        let index = *self.memo.get(&key)?;
        if let Some(slot) = self.nodes[index].identity_slot() {
            if slot.is_none() {
                *slot = Some(self.next_id);
                self.next_id += 1;
            }
        }
        Some(index)
    }

    fn remember(&mut self, value: &Value, index: usize) {
        if let Some(key) = identity_key(value) {
            self.memo.insert(key, index);
            self.retained.push(value.clone());
        }
    }

    // -- emission ---------------------------------------------------------------

    fn emit_node(&self, index: usize, emitted: &mut [bool]) -> JsonValue {
        let node = &self.nodes[index];
        if emitted[index] {
            if let Some(id) = node.identity() {
                let mut map = Map::new();
                map.insert(REF_KEY.to_owned(), JsonValue::from(id));
                return JsonValue::Object(map);
            }
        }
        emitted[index] = true;

        match node {
            Node::Scalar(value) => value.clone(),
            Node::Str { value, id } => match id {
                Some(id) => identified(VAL_KEY, JsonValue::String(value.to_string()), *id),
                None => JsonValue::String(value.to_string()),
            },
            Node::List { items, id } => {
                let mut rendered = Vec::with_capacity(items.len());
                for &item in items {
                    rendered.push(self.emit_node(item, emitted));
                }
                match id {
                    Some(id) => identified(LIST_KEY, JsonValue::Array(rendered), *id),
                    None => JsonValue::Array(rendered),
                }
            }
            Node::Map {
                entries,
                escape,
                id,
            } => {
                let mut rendered = Map::new();
                for (key, entry) in entries {
                    rendered.insert(key.clone(), self.emit_node(*entry, emitted));
                }
                if let Some(id) = id {
                    identified(DICT_KEY, JsonValue::Object(rendered), *id)
                } else if *escape {
                    let mut wrapper = Map::new();
                    wrapper.insert(DICT_KEY.to_owned(), JsonValue::Object(rendered));
                    JsonValue::Object(wrapper)
                } else {
                    JsonValue::Object(rendered)
                }
            }
            Node::Construct {
                constructor,
                args,
                id,
            } => {
                let mut rendered = Vec::with_capacity(args.len());
                for &arg in args {
                    rendered.push(self.emit_node(arg, emitted));
                }
                let mut map = Map::new();
                map.insert(
                    TYPE_KEY.to_owned(),
                    JsonValue::String(constructor.clone().into_owned()),
                );
                map.insert(ARGS_KEY.to_owned(), JsonValue::Array(rendered));
                if let Some(id) = id {
                    map.insert(ID_KEY.to_owned(), JsonValue::from(*id));
                }
                JsonValue::Object(map)
            }
        }
    }
}

fn identified(key: &str, body: JsonValue, id: u64) -> JsonValue {
    let mut map = Map::new();
    map.insert(key.to_owned(), body);
    map.insert(ID_KEY.to_owned(), JsonValue::from(id));
    JsonValue::Object(map)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use serde_json::json;
    use wirebound_wire::Packable;

    use super::*;
    use crate::adapter::Describe;
    use crate::asset::Asset;

    struct Artist {
        name: &'static str,
    }

    impl Packable for Artist {}

    impl Describe for Artist {
        fn constructor() -> &'static str {
            "music.Artist"
        }

        fn describe_args(&self) -> Vec<Value> {
            vec![Value::from(self.name)]
        }

        fn assets() -> Vec<Asset> {
            vec![Asset::from_static("js/artist.js")]
        }
    }

    struct LinkedNode {
        label: &'static str,
        next: RwLock<Option<Value>>,
    }

    impl Packable for LinkedNode {}

    impl Describe for LinkedNode {
        fn constructor() -> &'static str {
            "demo.Node"
        }

        fn describe_args(&self) -> Vec<Value> {
            let next = self.next.read().unwrap().clone().unwrap_or(Value::Null);
            vec![Value::from(self.label), next]
        }
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register::<Artist>().unwrap();
        registry.register::<LinkedNode>().unwrap();
        registry
    }

    #[test]
    fn scalars_pass_through() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let value = Value::list([
            Value::Null,
            Value::from(true),
            Value::from(-7),
            Value::from(2.5),
            Value::from("collie"),
        ]);
        assert_eq!(
            session.pack(&value).unwrap(),
            json!([null, true, -7, 2.5, "collie"]),
        );
    }

    #[test]
    fn unshared_graphs_stay_compact() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        // Equal but separately allocated strings carry no identity.
        let value = Value::list([Value::from("twin"), Value::from("twin")]);
        assert_eq!(session.pack(&value).unwrap(), json!(["twin", "twin"]));
    }

    #[test]
    fn objects_pack_as_construct_nodes() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let value = Value::object(Artist { name: "Kraftwerk" });
        assert_eq!(
            session.pack(&value).unwrap(),
            json!({"_type": "music.Artist", "_args": ["Kraftwerk"]}),
        );
    }

    #[test]
    fn shared_objects_collapse_to_one_node() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let artist = Value::object(Artist { name: "Kraftwerk" });
        let value = Value::list([artist.clone(), artist]);
        assert_eq!(
            session.pack(&value).unwrap(),
            json!([
                {"_type": "music.Artist", "_args": ["Kraftwerk"], "_id": 0},
                {"_ref": 0},
            ]),
        );
    }

    #[test]
    fn shared_strings_take_the_val_form() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let title = Value::from("Autobahn");
        let value = Value::list([title.clone(), title]);
        assert_eq!(
            session.pack(&value).unwrap(),
            json!([{"_val": "Autobahn", "_id": 0}, {"_ref": 0}]),
        );
    }

    #[test]
    fn shared_containers_take_their_long_forms() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let inner = Value::list([Value::from(1)]);
        assert_eq!(
            session.pack(&Value::list([inner.clone(), inner])).unwrap(),
            json!([{"_list": [1], "_id": 0}, {"_ref": 0}]),
        );

        let entries = Value::map([("breed", Value::from("collie"))]);
        assert_eq!(
            session
                .pack(&Value::list([entries.clone(), entries]))
                .unwrap(),
            json!([{"_dict": {"breed": "collie"}, "_id": 0}, {"_ref": 0}]),
        );
    }

    #[test]
    fn cycles_emit_a_back_reference() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let node = Arc::new(LinkedNode {
            label: "loop",
            next: RwLock::new(None),
        });
        let value = Value::shared_object(node.clone());
        *node.next.write().unwrap() = Some(value.clone());

        assert_eq!(
            session.pack(&value).unwrap(),
            json!({"_type": "demo.Node", "_args": ["loop", {"_ref": 0}], "_id": 0}),
        );
    }

    #[test]
    fn reserved_data_keys_are_escaped() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let value = Value::map([("_type", Value::from("collie"))]);
        assert_eq!(
            session.pack(&value).unwrap(),
            json!({"_dict": {"_type": "collie"}}),
        );
    }

    #[test]
    fn unregistered_objects_fail_with_the_path() {
        struct Stranger;
        impl Packable for Stranger {}

        let registry = registry();
        let mut session = PackSession::new(&registry);

        let value = Value::list([Value::from(1), Value::object(Stranger)]);
        let error = session.pack(&value).unwrap_err();
        let PackError::NoAdapter { at: Some(at), .. } = error else {
            panic!("expected NoAdapter, got {error:?}")
        };
        assert_eq!(at, "root[1]");
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let error = session.pack(&Value::from(f64::NAN)).unwrap_err();
        assert!(matches!(error, PackError::NonFiniteNumber { .. }));
    }

    #[test]
    fn unfilled_placeholders_are_rejected() {
        use wirebound_wire::Placeholder;

        let registry = registry();
        let mut session = PackSession::new(&registry);

        let value = Value::Placeholder(Placeholder::new());
        let error = session.pack(&value).unwrap_err();
        assert!(matches!(error, PackError::UnresolvedPlaceholder { .. }));
    }

    #[test]
    fn filled_placeholders_pack_as_their_target() {
        use wirebound_wire::Placeholder;

        let registry = registry();
        let mut session = PackSession::new(&registry);

        let placeholder = Placeholder::new();
        placeholder.fill(Value::from("patched"));
        assert_eq!(
            session.pack(&Value::Placeholder(placeholder)).unwrap(),
            json!("patched"),
        );
    }

    #[test]
    fn dependencies_accumulate_across_documents() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        session
            .pack(&Value::object(Artist { name: "Kraftwerk" }))
            .unwrap();
        session
            .pack(&Value::object(Artist { name: "Neu!" }))
            .unwrap();

        let dependencies = session.into_dependencies();
        assert_eq!(dependencies.len(), 1);
        assert!(dependencies.contains(&Asset::from_static("js/artist.js")));
    }

    #[test]
    fn identities_do_not_leak_between_documents() {
        let registry = registry();
        let mut session = PackSession::new(&registry);

        let shared = Value::from("once");
        session
            .pack(&Value::list([shared.clone(), shared.clone()]))
            .unwrap();

        // The allocation was shared in the previous document only.
        assert_eq!(session.pack(&Value::list([shared])).unwrap(), json!(["once"]));
    }

    #[test]
    fn asset_base_resolves_relative_locators() {
        let mut registry = TypeRegistry::with_asset_base("/static");
        registry.register::<Artist>().unwrap();
        let mut session = PackSession::new(&registry);

        session
            .pack(&Value::object(Artist { name: "Kraftwerk" }))
            .unwrap();
        assert!(
            session
                .dependencies()
                .contains(&Asset::from_static("/static/js/artist.js"))
        );
    }
}
