//! Schema and entity listings fetched from the graph backend.
//!
//! Every map here is keyed by label or relationship type. A missing key
//! means "not fetched yet"; a present key with an empty list means the
//! backend answered and there is nothing under it. Merges are plain keyed
//! assignment, so fetches may land in any order, or twice, and produce the
//! same catalog.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph_utils::graph::{Node, NodeId, Relationship, Scalar};

/// Answer to `list_schema`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaListing {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub relationship_types: Vec<String>,
    #[serde(default)]
    pub property_keys: Vec<String>,
}

/// Answer to `entities_for_label`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEntities {
    pub summaries: Vec<String>,
    pub details: Vec<Value>,
}

/// Answer to `entities_for_type`; summaries are the endpoint labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeEntities {
    pub summaries: Vec<(String, String)>,
    pub details: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCatalog {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub relationship_types: Vec<String>,
    #[serde(default)]
    pub property_keys: Vec<String>,
    #[serde(default)]
    pub node_entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub node_details: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    pub relationship_entities: BTreeMap<String, Vec<(String, String)>>,
    #[serde(default)]
    pub relationship_details: BTreeMap<String, Vec<Value>>,
}

// Shapes the backend uses for entity details. Unknown fields are ignored.
#[derive(Deserialize)]
struct NodeDetail {
    id: NodeId,
    #[serde(default, alias = "nodeLabel")]
    label: Option<String>,
    #[serde(default)]
    properties: HashMap<String, Scalar>,
}

#[derive(Deserialize)]
struct RelationshipDetail {
    #[serde(rename = "startNode")]
    start_node: NodeId,
    #[serde(rename = "endNode")]
    end_node: NodeId,
    #[serde(default, rename = "type")]
    rel_type: Option<String>,
    #[serde(default)]
    properties: HashMap<String, Scalar>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
            && self.relationship_types.is_empty()
            && self.property_keys.is_empty()
            && self.node_entities.is_empty()
            && self.relationship_entities.is_empty()
    }

    pub fn apply_schema(&mut self, schema: SchemaListing) {
        self.labels = schema.labels;
        self.relationship_types = schema.relationship_types;
        self.property_keys = schema.property_keys;
    }

    pub fn merge_label_entities(&mut self, label: &str, entities: LabelEntities) {
        self.node_entities.insert(label.to_string(), entities.summaries);
        self.node_details.insert(label.to_string(), entities.details);
    }

    pub fn merge_type_entities(&mut self, rel_type: &str, entities: TypeEntities) {
        self.relationship_entities.insert(rel_type.to_string(), entities.summaries);
        self.relationship_details.insert(rel_type.to_string(), entities.details);
    }

    pub fn is_label_loaded(&self, label: &str) -> bool {
        self.node_entities.contains_key(label)
    }

    pub fn is_type_loaded(&self, rel_type: &str) -> bool {
        self.relationship_entities.contains_key(rel_type)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn has_type(&self, rel_type: &str) -> bool {
        self.relationship_types.iter().any(|t| t == rel_type)
    }

    /// Node behind the `index`-th entity listed under `label`, if its
    /// detail record is well formed.
    pub fn node_at(&self, label: &str, index: usize) -> Option<Node> {
        let raw = self.node_details.get(label)?.get(index)?;
        let detail: NodeDetail = serde_json::from_value(raw.clone()).ok()?;
        Some(Node {
            id: detail.id,
            label: detail.label.unwrap_or_else(|| label.to_string()),
            properties: detail.properties,
        })
    }

    pub fn relationship_at(&self, rel_type: &str, index: usize) -> Option<Relationship> {
        let raw = self.relationship_details.get(rel_type)?.get(index)?;
        let detail: RelationshipDetail = serde_json::from_value(raw.clone()).ok()?;
        Some(Relationship {
            start_node: detail.start_node,
            end_node: detail.end_node,
            rel_type: detail.rel_type.unwrap_or_else(|| rel_type.to_string()),
            properties: detail.properties,
        })
    }
}
