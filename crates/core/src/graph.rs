//! The assembled knowledge graph

use crate::node::{Node, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Nodes and relationships produced by graph assembly.
///
/// Node ids are unique. Every relationship endpoint is a node of the
/// document, and relationships keep their direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

/// Counts describing a graph document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub files: usize,
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
    /// `From` edges among `relationships`
    pub provenance_edges: usize,
}

impl GraphDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_entity())
    }

    pub fn files(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_file())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_chunk())
    }

    /// Ids of the nodes `id` points to through provenance edges
    pub fn provenance_of(&self, id: &str) -> Vec<&str> {
        self.relationships
            .iter()
            .filter(|r| r.is_provenance() && r.source.id == id)
            .map(|r| r.target.id.as_str())
            .collect()
    }

    /// Relationship endpoints that are not nodes of the document
    pub fn dangling_endpoints(&self) -> Vec<&str> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut missing = Vec::new();
        for rel in &self.relationships {
            for endpoint in [&rel.source.id, &rel.target.id] {
                if !ids.contains(endpoint.as_str()) && !missing.contains(&endpoint.as_str()) {
                    missing.push(endpoint.as_str());
                }
            }
        }
        missing
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            files: self.files().count(),
            chunks: self.chunks().count(),
            entities: self.entities().count(),
            relationships: self.relationships.len(),
            provenance_edges: self.relationships.iter().filter(|r| r.is_provenance()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FROM;

    fn sample() -> GraphDocument {
        let file = Node::file("doc1.txt");
        let chunk = Node::chunk("John works at Acme", 0, &file);
        let john = Node::new("John", "Person");
        let acme = Node::new("Acme", "Organization");

        GraphDocument {
            relationships: vec![
                Relationship::new(chunk.clone(), file.clone(), FROM),
                Relationship::new(john.clone(), chunk.clone(), FROM),
                Relationship::new(acme.clone(), chunk.clone(), FROM),
                Relationship::new(john.clone(), acme.clone(), "Works_at"),
            ],
            nodes: vec![john, acme, file, chunk],
        }
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.relationships, 4);
        assert_eq!(stats.provenance_edges, 3);
    }

    #[test]
    fn test_provenance_of() {
        let graph = sample();
        assert_eq!(graph.provenance_of("John"), vec!["doc1.txt_0"]);
        assert_eq!(graph.provenance_of("doc1.txt_0"), vec!["doc1.txt"]);
    }

    #[test]
    fn test_dangling_endpoints() {
        let mut graph = sample();
        assert!(graph.dangling_endpoints().is_empty());

        graph.nodes.retain(|n| n.id != "Acme");
        assert_eq!(graph.dangling_endpoints(), vec!["Acme"]);
    }
}
