use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use unimodel_rs::{Entity, SchemaModel};

#[allow(dead_code)]
pub fn model() -> Arc<SchemaModel> {
    Arc::new(SchemaModel::default_model().expect("bundled taxonomy resolves"))
}

/// A folded entity built by hand; repeated property names add values.
#[allow(dead_code)]
pub fn entity(id: &str, schema: &str, values: &[(&str, &str)]) -> Entity {
    let mut properties: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (property, value) in values {
        properties
            .entry(property.to_string())
            .or_default()
            .push(value.to_string());
    }
    Entity {
        id: id.to_string(),
        schema: schema.to_string(),
        properties,
        datasets: BTreeSet::from(["test".to_string()]),
    }
}
