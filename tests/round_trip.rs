//! End-to-end trips: a value graph packed on one side and rebuilt on the
//! other, checked for structure, aliasing, and cycles.

use std::sync::{Arc, RwLock};

use serde_json::json;
use wirebound::pack::{Asset, Describe, PackSession, TypeRegistry};
use wirebound::unpack::{FactoryError, UnpackEngine};
use wirebound::wire::{Packable, Value};

struct Artist {
    name: Value,
}

impl Packable for Artist {}

impl Describe for Artist {
    fn constructor() -> &'static str {
        "music.Artist"
    }

    fn describe_args(&self) -> Vec<Value> {
        vec![self.name.clone()]
    }

    fn assets() -> Vec<Asset> {
        vec![Asset::from_static("js/artist.js")]
    }
}

struct LinkedNode {
    label: Value,
    next: RwLock<Value>,
}

impl Packable for LinkedNode {}

impl Describe for LinkedNode {
    fn constructor() -> &'static str {
        "demo.Node"
    }

    fn describe_args(&self) -> Vec<Value> {
        vec![self.label.clone(), self.next.read().unwrap().clone()]
    }
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<Artist>().unwrap();
    registry.register::<LinkedNode>().unwrap();
    registry
}

fn engine() -> UnpackEngine {
    let mut engine = UnpackEngine::new();
    engine
        .register(
            "music.Artist",
            |mut args: Vec<Value>| -> Result<Value, FactoryError> {
                let name = args.pop().ok_or_else(|| FactoryError::new("missing name"))?;
                Ok(Value::object(Artist { name }))
            },
        )
        .unwrap();
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
fn shared_objects_survive_the_trip() {
    let registry = registry();
    let engine = engine();

    let band = Value::object(Artist {
        name: Value::from("Wire"),
    });
    let playlist = Value::list([band.clone(), band, Value::from("encore")]);

    let mut session = PackSession::new(&registry);
    let document = session.pack(&playlist).unwrap();
    assert_eq!(
        document,
        json!([
            {"_type": "music.Artist", "_args": ["Wire"], "_id": 0},
            {"_ref": 0},
            "encore",
        ]),
    );

    let Value::List(items) = engine.unpack(&document).unwrap() else {
        panic!("expected a list")
    };
    assert!(items[0].same_instance(&items[1]));
    let Some(artist) = items[0].downcast_ref::<Artist>() else {
        panic!("expected an Artist")
    };
    assert_eq!(artist.name, Value::from("Wire"));
}

#[test]
fn shared_strings_survive_the_trip() {
    let registry = registry();
    let engine = engine();

    let title = Value::from("Pink Flag");
    let playlist = Value::list([title.clone(), title]);

    let mut session = PackSession::new(&registry);
    let document = session.pack(&playlist).unwrap();

    let Value::List(items) = engine.unpack(&document).unwrap() else {
        panic!("expected a list")
    };
    assert_eq!(items[0], Value::from("Pink Flag"));
    assert!(items[0].same_instance(&items[1]));
}

#[test]
fn cycles_survive_the_trip() {
    let registry = registry();
    let engine = engine();

    let node = Arc::new(LinkedNode {
        label: Value::from("loop"),
        next: RwLock::new(Value::Null),
    });
    let graph = Value::shared_object(node.clone());
    *node.next.write().unwrap() = graph.clone();

    let mut session = PackSession::new(&registry);
    let document = session.pack(&graph).unwrap();

    let root = engine.unpack(&document).unwrap();
    let Some(rebuilt) = root.downcast_ref::<LinkedNode>() else {
        panic!("expected a LinkedNode")
    };
    assert_eq!(rebuilt.label, Value::from("loop"));
    assert!(rebuilt.next.read().unwrap().same_instance(&root));
}

#[test]
fn reserved_data_keys_survive_the_trip() {
    let registry = registry();
    let engine = engine();

    let data = Value::map([
        ("_type", Value::from("collie")),
        ("breed", Value::from("rough")),
    ]);

    let mut session = PackSession::new(&registry);
    let document = session.pack(&data).unwrap();
    assert_eq!(engine.unpack(&document).unwrap(), data);
}

#[test]
fn one_shot_packing_reports_dependencies() {
    let registry = registry();

    let packed = wirebound::pack::pack(
        &registry,
        &Value::object(Artist {
            name: Value::from("Wire"),
        }),
    )
    .unwrap();
    assert_eq!(packed.dependencies.len(), 1);
    assert!(
        packed
            .dependencies
            .contains(&Asset::from_static("js/artist.js"))
    );
}

#[cfg(feature = "auto_register")]
mod auto_register {
    use super::*;

    struct Stamp;

    impl Packable for Stamp {}

    impl Describe for Stamp {
        fn constructor() -> &'static str {
            "demo.Stamp"
        }

        fn describe_args(&self) -> Vec<Value> {
            Vec::new()
        }
    }

    wirebound::pack::register_packable!(Stamp);

    #[test]
    fn statically_declared_types_register() {
        let mut registry = TypeRegistry::new();
        assert!(registry.auto_register().unwrap());
        assert!(registry.contains::<Stamp>());

        // Repeated application is idempotent.
        assert!(registry.auto_register().unwrap());
    }
}
