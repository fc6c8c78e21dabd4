use anyhow::{Context, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Undirected graph of entity names with labeled edges. Nodes are unique by
/// exact name and iterate in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: UnGraph<String, String>,
    node_index: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub label: String,
}

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    format_version: u32,
    nodes: Vec<String>,
    edges: Vec<EdgeRecord>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning the existing one when the name is already present
    pub fn add_entity(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(name) {
            return idx;
        }

        let idx = self.graph.add_node(name.to_string());
        self.node_index.insert(name.to_string(), idx);
        idx
    }

    /// Add a labeled edge; missing endpoints become nodes. Adding the same
    /// labeled edge twice is a no-op.
    pub fn add_relation(&mut self, source: &str, label: &str, target: &str) {
        let a = self.add_entity(source);
        let b = self.add_entity(target);

        let exists = self.graph.edges(a).any(|e| {
            let other = if e.source() == a { e.target() } else { e.source() };
            other == b && e.weight() == label
        });
        if !exists {
            self.graph.add_edge(a, b, label.to_string());
        }
    }

    /// Build a graph from the `{"entities": [...], "relationships": [[s, r, t], ...]}`
    /// object an extraction model returns. Anything not of that shape is skipped.
    pub fn from_extraction(value: &Value) -> Self {
        let mut graph = Self::new();
        let mut skipped = 0usize;

        let entities = value.get("entities").and_then(Value::as_array);
        for entity in entities.into_iter().flatten() {
            match entity.as_str() {
                Some(name) => {
                    graph.add_entity(name);
                }
                None => skipped += 1,
            }
        }

        let relationships = value.get("relationships").and_then(Value::as_array);
        for relationship in relationships.into_iter().flatten() {
            let triple: Option<Vec<&str>> = relationship
                .as_array()
                .filter(|parts| parts.len() == 3)
                .and_then(|parts| parts.iter().map(Value::as_str).collect());

            match triple.as_deref() {
                Some([source, label, target]) => graph.add_relation(source, label, target),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(skipped, "dropped malformed entities or relationships");
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_index.contains_key(name)
    }

    /// Node names in first-seen order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    pub fn edges(&self) -> Vec<EdgeRecord> {
        self.graph
            .edge_references()
            .map(|e| EdgeRecord {
                source: self.graph[e.source()].clone(),
                target: self.graph[e.target()].clone(),
                label: e.weight().clone(),
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = GraphSnapshot {
            format_version: GRAPH_FORMAT_VERSION,
            nodes: self.nodes().map(str::to_string).collect(),
            edges: self.edges(),
        };
        serde_json::to_vec(&snapshot).context("Failed to serialize knowledge graph")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: GraphSnapshot =
            serde_json::from_slice(bytes).context("Failed to parse knowledge graph blob")?;

        if snapshot.format_version != GRAPH_FORMAT_VERSION {
            anyhow::bail!(
                "Unsupported knowledge graph format version: {}",
                snapshot.format_version
            );
        }

        let mut graph = Self::new();
        for name in &snapshot.nodes {
            if graph.contains(name) {
                anyhow::bail!("Duplicate node in knowledge graph blob: {}", name);
            }
            graph.add_entity(name);
        }

        for edge in &snapshot.edges {
            if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
                anyhow::bail!(
                    "Edge {} -[{}]- {} references an unknown node",
                    edge.source, edge.label, edge.target
                );
            }
            graph.add_relation(&edge.source, &edge.label, &edge.target);
        }

        Ok(graph)
    }
}
