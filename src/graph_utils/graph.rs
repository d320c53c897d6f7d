use std::collections::{BTreeMap, HashMap};
use std::fmt;
use serde::{Serialize, Deserialize};

// Basic type aliases for clarity
pub type NodeId = i64;
type Key = String;

/// A single property value as the graph backend reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self { Scalar::Text(s.to_string()) }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self { Scalar::Text(s) }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self { Scalar::Int(i) }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self { Scalar::Bool(b) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub properties: HashMap<Key, Scalar>,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        Node { id, label: label.into(), properties: HashMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Identity of a relationship inside a selection.
///
/// Two relationships of the same type between the same ordered pair of
/// nodes share a key and collapse to one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub rel_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub start_node: NodeId,
    pub end_node: NodeId,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: HashMap<Key, Scalar>,
}

impl Relationship {
    pub fn new(start_node: NodeId, end_node: NodeId, rel_type: impl Into<String>) -> Self {
        Relationship { start_node, end_node, rel_type: rel_type.into(), properties: HashMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            start_node: self.start_node,
            end_node: self.end_node,
            rel_type: self.rel_type.clone(),
        }
    }
}

/// The nodes and relationships a session has pulled onto its canvas, plus
/// the staging buffers the filtering panel fills before committing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSelection {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub node_buffer: Vec<Node>,
    #[serde(default)]
    pub relationship_buffer: Vec<Relationship>,
}

/// Counts for the "graph info" display.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphSummary {
    pub node_count: usize,
    pub relationship_count: usize,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
}

impl GraphSelection {
    // Instantiate a new, empty selection
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.relationships.is_empty()
            && self.node_buffer.is_empty()
            && self.relationship_buffer.is_empty()
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn relationship_count(&self) -> usize { self.relationships.len() }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn get_relationship(&self, key: &RelationshipKey) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.start_node == key.start_node && r.end_node == key.end_node && r.rel_type == key.rel_type)
    }

    // Fetch helpers:
    // Nodes
    pub fn find_node_ids_by_label(&self, label: &str) -> Vec<NodeId> {
        self
            .nodes
            .iter()
            .filter_map(|node| if node.label == label { Some(node.id) } else { None })
            .collect()
    }

    // Relationships touching a node, either direction
    pub fn relationships_of(&self, id: NodeId) -> Vec<&Relationship> {
        self
            .relationships
            .iter()
            .filter(|rel| rel.start_node == id || rel.end_node == id)
            .collect()
    }

    // Move buffered entities into the selection; duplicates are left for reconciliation
    pub fn commit_buffers(&mut self) -> bool {
        if self.node_buffer.is_empty() && self.relationship_buffer.is_empty() {
            return false;
        }
        self.nodes.append(&mut self.node_buffer);
        self.relationships.append(&mut self.relationship_buffer);
        true
    }

    pub fn summary(&self) -> GraphSummary {
        let mut nodes_by_label = BTreeMap::new();
        for n in &self.nodes {
            *nodes_by_label.entry(n.label.clone()).or_insert(0) += 1;
        }
        let mut relationships_by_type = BTreeMap::new();
        for r in &self.relationships {
            *relationships_by_type.entry(r.rel_type.clone()).or_insert(0) += 1;
        }
        GraphSummary {
            node_count: self.nodes.len(),
            relationship_count: self.relationships.len(),
            nodes_by_label,
            relationships_by_type,
        }
    }
}
