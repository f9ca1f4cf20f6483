mod support;

use std::sync::Arc;
use support::model;
use unimodel_rs::schema::{PropertyDefinition, SchemaDefinition};
use unimodel_rs::{DefinitionError, SchemaModel};

#[test]
fn descendants_carry_every_ancestor_property() {
    let model = model();
    for schema in model.schemata() {
        for ancestor in schema.ancestors() {
            let ancestor = model.get(ancestor).expect("ancestors resolve");
            for (name, property) in ancestor.properties() {
                let inherited = schema
                    .get(name)
                    .unwrap_or_else(|| panic!("{} lacks {}", schema.name, property.qname()));
                assert_eq!(inherited.kind(), property.kind(), "{}:{name}", schema.name);
            }
        }
    }
}

fn diamond() -> Vec<SchemaDefinition> {
    vec![
        SchemaDefinition::new("Thing")
            .abstract_schema()
            .property("name", PropertyDefinition::of_type("name")),
        SchemaDefinition::new("Vessel")
            .extends("Thing")
            .property("imo", PropertyDefinition::of_type("identifier")),
        SchemaDefinition::new("Holding")
            .extends("Thing")
            .property("registered", PropertyDefinition::of_type("date").single()),
        SchemaDefinition::new("FloatingAsset")
            .extends("Vessel")
            .extends("Holding"),
    ]
}

#[test]
fn diamond_inheritance_shares_the_root_property() -> anyhow::Result<()> {
    let model = SchemaModel::from_definitions(diamond())?;
    let asset = model.get("FloatingAsset").expect("defined");
    let thing = model.get("Thing").expect("defined");

    assert!(asset.is_a("Vessel") && asset.is_a("Holding") && asset.is_a("Thing"));
    assert!(Arc::ptr_eq(
        asset.get("name").expect("inherited"),
        thing.get("name").expect("declared")
    ));
    assert!(asset.get("imo").is_some());
    assert!(!asset.get("registered").expect("inherited").multi);

    assert_eq!(
        model.common_schema("FloatingAsset", "Vessel").map(|s| s.name.as_str()),
        Some("FloatingAsset")
    );
    assert!(model.common_schema("Vessel", "Holding").is_none());
    Ok(())
}

#[test]
fn inheritance_cycle_is_rejected() {
    let definitions = vec![
        SchemaDefinition::new("A").extends("C"),
        SchemaDefinition::new("B").extends("A"),
        SchemaDefinition::new("C").extends("B"),
    ];
    match SchemaModel::from_definitions(definitions) {
        Err(DefinitionError::Cycle { path }) => {
            assert!(path.len() >= 3, "{path:?}");
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn conflicting_parent_types_are_rejected() {
    let definitions = vec![
        SchemaDefinition::new("Left").property("code", PropertyDefinition::of_type("string")),
        SchemaDefinition::new("Right").property("code", PropertyDefinition::of_type("date")),
        SchemaDefinition::new("Both").extends("Left").extends("Right"),
    ];
    assert!(matches!(
        SchemaModel::from_definitions(definitions),
        Err(DefinitionError::IncompatibleOverride { property, .. }) if property == "code"
    ));
}

#[test]
fn unknown_parent_is_rejected() {
    let definitions = vec![SchemaDefinition::new("Orphan").extends("Nobody")];
    assert!(matches!(
        SchemaModel::from_definitions(definitions),
        Err(DefinitionError::UnknownParent { parent, .. }) if parent == "Nobody"
    ));
}
