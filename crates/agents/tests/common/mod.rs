//! Common test utilities

use commgraph_agents::extractor::parse_extraction;
use commgraph_agents::testing::ScriptedExtractor;
use commgraph_agents::{AgentError, Extraction};
use std::path::Path;

/// Parse a JSON extraction the way a model answer would be
pub fn extraction(json: &str) -> Extraction {
    parse_extraction(json).expect("test extraction JSON must parse")
}

/// Extractor that knows about John Doe, Acme and Paris, and fails on any
/// text mentioning "garbled"
pub fn people_extractor() -> ScriptedExtractor {
    ScriptedExtractor::new(|text| {
        if text.contains("garbled") {
            return Err(AgentError::Extraction("model returned invalid JSON".into()));
        }
        let mut nodes = Vec::new();
        let mut rels = Vec::new();
        if text.contains("John Doe") {
            nodes.push(r#"{"id": "john doe", "type": "person"}"#.to_string());
        }
        if text.contains("Acme") {
            nodes.push(r#"{"id": "Acme", "type": "organization", "properties": {"founded": 1999}}"#.to_string());
            rels.push(r#"{"source": "John Doe", "target": "Acme", "type": "WORKS_AT"}"#.to_string());
        }
        if text.contains("Paris") {
            nodes.push(r#"{"id": "paris", "type": "city"}"#.to_string());
            rels.push(r#"{"source": "John Doe", "target": "Paris", "type": "lives in"}"#.to_string());
        }
        Ok(extraction(&format!(
            r#"{{"nodes": [{}], "relationships": [{}]}}"#,
            nodes.join(","),
            rels.join(",")
        )))
    })
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("Failed to write test document");
}
