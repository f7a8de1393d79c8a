//! Graph nodes and relationships

use crate::property::Properties;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node type of per-document nodes
pub const FILE_TYPE: &str = "File";

/// Node type of per-window nodes
pub const CHUNK_TYPE: &str = "Chunk";

/// Relationship type of provenance edges
pub const FROM: &str = "From";

/// A vertex of the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier; two nodes with the same normalized id are one entity
    pub id: String,

    /// Free-form label ("Person", "Organization", "File", "Chunk", ...)
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: Properties::new(),
        }
    }

    /// Builder: add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Builder: replace all properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Node for an input document. The id is the file's base name.
    pub fn file(path: &str) -> Self {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        Self::new(name.clone(), FILE_TYPE)
            .with_property("path", path)
            .with_property("name", name)
    }

    /// Node for the `index`-th window of `file`
    pub fn chunk(content: &str, index: usize, file: &Node) -> Self {
        Self::new(format!("{}_{}", file.id, index), CHUNK_TYPE)
            .with_property("content", content)
            .with_property("idx", index.to_string())
            .with_property("sourceFileId", file.id.clone())
    }

    pub fn is_file(&self) -> bool {
        self.node_type == FILE_TYPE
    }

    pub fn is_chunk(&self) -> bool {
        self.node_type == CHUNK_TYPE
    }

    /// Entity nodes are everything the extractor produced
    pub fn is_entity(&self) -> bool {
        !self.is_file() && !self.is_chunk()
    }
}

/// A directed, typed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: Node,
    pub target: Node,

    #[serde(rename = "type")]
    pub rel_type: String,

    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(source: Node, target: Node, rel_type: impl Into<String>) -> Self {
        Self {
            source,
            target,
            rel_type: rel_type.into(),
            properties: Properties::new(),
        }
    }

    /// Builder: add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Structural edge recording where a node came from
    pub fn is_provenance(&self) -> bool {
        self.rel_type == FROM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node_uses_basename() {
        let node = Node::file("articles/inflation.txt");

        assert_eq!(node.id, "inflation.txt");
        assert_eq!(node.node_type, FILE_TYPE);
        assert_eq!(node.properties.get("path"), Some("articles/inflation.txt"));
        assert_eq!(node.properties.get("name"), Some("inflation.txt"));
    }

    #[test]
    fn test_chunk_node_id() {
        let file = Node::file("doc1.txt");
        let chunk = Node::chunk("Some text", 3, &file);

        assert_eq!(chunk.id, "doc1.txt_3");
        assert_eq!(chunk.properties.get("idx"), Some("3"));
        assert_eq!(chunk.properties.get("sourceFileId"), Some("doc1.txt"));
        assert!(chunk.is_chunk());
        assert!(!chunk.is_entity());
    }

    #[test]
    fn test_serialized_field_names() {
        let node = Node::new("Acme", "Organization");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Organization");
    }
}
