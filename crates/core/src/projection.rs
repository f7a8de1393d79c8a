//! Undirected projection of the knowledge graph used for community detection

use crate::graph::GraphDocument;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Label kept on a projected edge; direction is as last written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLabel {
    pub source: String,
    pub target: String,
    pub rel_type: String,
}

/// Simple undirected graph over node ids.
///
/// Vertices are indexed in ascending id order. Self-loops are dropped and
/// parallel relationships between the same pair collapse to one edge whose
/// label is the last one seen.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    graph: UnGraph<String, EdgeLabel>,
    index: HashMap<String, NodeIndex>,
}

impl EntityGraph {
    pub fn from_document(doc: &GraphDocument) -> Self {
        let mut ids: BTreeSet<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        for rel in &doc.relationships {
            ids.insert(rel.source.id.as_str());
            ids.insert(rel.target.id.as_str());
        }

        let mut graph = UnGraph::with_capacity(ids.len(), doc.relationships.len());
        let mut index = HashMap::with_capacity(ids.len());
        for id in ids {
            index.insert(id.to_string(), graph.add_node(id.to_string()));
        }

        for rel in &doc.relationships {
            let (a, b) = (index[&rel.source.id], index[&rel.target.id]);
            if a == b {
                continue;
            }
            graph.update_edge(
                a,
                b,
                EdgeLabel {
                    source: rel.source.id.clone(),
                    target: rel.target.id.clone(),
                    rel_type: rel.rel_type.clone(),
                },
            );
        }

        Self { graph, index }
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Id of the `i`-th vertex
    pub fn id(&self, i: usize) -> &str {
        &self.graph[NodeIndex::new(i)]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|ix| ix.index())
    }

    /// Vertex ids in index order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Neighbours of vertex `i` in ascending index order
    pub fn neighbors(&self, i: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(i))
            .map(|n| n.index())
            .collect();
        out.sort_unstable();
        out
    }

    /// Edges in first-insertion order as `(a, b, label)`
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &EdgeLabel)> {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Textual description of the subgraph induced by `members`:
    ///
    /// ```text
    /// Entities: <id>, <id>, ...
    /// Relationships: <source> -> <type> -> <target>, ...
    /// ```
    pub fn describe(&self, members: &[String]) -> String {
        let set: HashSet<&str> = members.iter().map(String::as_str).collect();
        let relationships: Vec<String> = self
            .edges()
            .filter(|(a, b, _)| set.contains(self.id(*a)) && set.contains(self.id(*b)))
            .map(|(_, _, label)| format!("{} -> {} -> {}", label.source, label.rel_type, label.target))
            .collect();

        format!(
            "Entities: {}\nRelationships: {}",
            members.join(", "),
            relationships.join(", ")
        )
    }
}
