//! # Graph Module
//!
//! Projects folded entities into a node/edge view for graph tooling.
//!
//! - Entities of ordinary schemata become entity nodes.
//! - Entities of edge schemata (ownerships, payments...) become edges between
//!   the entities named by their source and target properties.
//! - Entity-typed properties become edges to the referenced entity.
//! - Values of pivot types (identifiers, emails, phones, addresses) become
//!   shared value nodes, so two entities carrying the same passport number
//!   meet at one node.

use crate::entity::Entity;
use crate::schema::SchemaModel;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entity,
    Value,
}

/// A node in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub caption: String,
    pub kind: NodeKind,
    /// Schema name for entity nodes, type name for value nodes.
    pub label: String,
}

/// A directed edge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
    /// The property this edge was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// The edge entity this edge was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Graph view over a set of entities. Nodes are ordered by id and edges
/// sorted, so the same entities always produce the same graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Build the graph for `entities`.
    pub fn build<'e, I>(model: &SchemaModel, entities: I) -> Self
    where
        I: IntoIterator<Item = &'e Entity>,
    {
        let mut builder = GraphBuilder::default();
        for entity in entities {
            builder.add(model, entity);
        }
        builder.finish()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes
            .binary_search_by(|node| node.id.as_str().cmp(id))
            .ok()
            .map(|position| &self.nodes[position])
    }

    /// Edges leaving `id`.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == id)
    }

    /// One JSON object per line: nodes first, then edges.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut lines = Vec::with_capacity(self.nodes.len() + self.edges.len());
        for node in &self.nodes {
            lines.push(format!(
                "{{\"type\": \"node\", \"data\": {}}}",
                serde_json::to_string(node)?
            ));
        }
        for edge in &self.edges {
            lines.push(format!(
                "{{\"type\": \"edge\", \"data\": {}}}",
                serde_json::to_string(edge)?
            ));
        }
        Ok(lines.join("\n"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Default)]
struct GraphBuilder {
    nodes: BTreeMap<String, Node>,
    edges: BTreeSet<Edge>,
}

impl GraphBuilder {
    fn add(&mut self, model: &SchemaModel, entity: &Entity) {
        let Some(schema) = model.get(&entity.schema) else {
            return;
        };

        if let Some(edge) = &schema.edge {
            let label = edge.label.clone().unwrap_or_else(|| schema.label.clone());
            for source in entity.get(&edge.source) {
                for target in entity.get(&edge.target) {
                    self.edges.insert(Edge {
                        source: source.clone(),
                        target: target.clone(),
                        label: label.clone(),
                        property: None,
                        entity_id: Some(entity.id.clone()),
                    });
                }
            }
            return;
        }

        self.nodes.insert(
            entity.id.clone(),
            Node {
                id: entity.id.clone(),
                caption: entity.caption(model),
                kind: NodeKind::Entity,
                label: schema.name.clone(),
            },
        );

        for (property, value) in entity.values(schema) {
            if property.stub {
                continue;
            }
            let property_type = &property.property_type;
            let target = if property.is_entity() {
                value.to_string()
            } else if property_type.pivot() {
                let id = format!("{}:{}", property_type.name(), property_type.normalize_key(value));
                self.nodes.entry(id.clone()).or_insert_with(|| Node {
                    id: id.clone(),
                    caption: value.to_string(),
                    kind: NodeKind::Value,
                    label: property_type.name().to_string(),
                });
                id
            } else {
                continue;
            };
            self.edges.insert(Edge {
                source: entity.id.clone(),
                target,
                label: property.label.clone(),
                property: Some(property.qname()),
                entity_id: None,
            });
        }
    }

    fn finish(self) -> Graph {
        Graph {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::export_to_dot;

    fn entity(id: &str, schema: &str, properties: &[(&str, &str)]) -> Entity {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in properties {
            map.entry(name.to_string()).or_default().push(value.to_string());
        }
        Entity {
            id: id.to_string(),
            schema: schema.to_string(),
            properties: map,
            datasets: BTreeSet::from(["test".to_string()]),
        }
    }

    fn sample() -> Vec<Entity> {
        vec![
            entity("p1", "Person", &[("name", "Jane Doe"), ("passportNumber", "X1234567")]),
            entity("p2", "Person", &[("name", "J. Doe"), ("passportNumber", "x-1234567")]),
            entity("c1", "Company", &[("name", "ACME Ltd")]),
            entity("o1", "Ownership", &[("owner", "p1"), ("asset", "c1")]),
        ]
    }

    #[test]
    fn test_edge_schemata_become_edges() {
        let model = SchemaModel::default_model().unwrap();
        let graph = Graph::build(&model, &sample());
        assert!(graph.node("o1").is_none());
        let owns: Vec<&Edge> = graph.outgoing("p1").filter(|e| e.entity_id.is_some()).collect();
        assert_eq!(owns.len(), 1);
        assert_eq!(owns[0].target, "c1");
        assert_eq!(owns[0].entity_id.as_deref(), Some("o1"));
    }

    #[test]
    fn test_pivot_values_are_shared_nodes() {
        let model = SchemaModel::default_model().unwrap();
        let graph = Graph::build(&model, &sample());
        let value = graph.node("identifier:X1234567").unwrap();
        assert_eq!(value.kind, NodeKind::Value);
        let pointing = graph
            .edges
            .iter()
            .filter(|edge| edge.target == "identifier:X1234567")
            .count();
        assert_eq!(pointing, 2);
        assert_eq!(graph.node("p1").unwrap().caption, "Jane Doe");
    }

    #[test]
    fn test_graph_exports() {
        let model = SchemaModel::default_model().unwrap();
        let graph = Graph::build(&model, &sample());
        let dot = export_to_dot(&graph).unwrap();
        assert!(dot.starts_with("digraph EntityGraph {"));
        assert!(dot.contains("\"p1\" -> \"c1\""));
        let jsonl = graph.to_jsonl().unwrap();
        assert_eq!(jsonl.lines().count(), graph.num_nodes() + graph.num_edges());
    }
}
