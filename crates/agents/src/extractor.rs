//! Extractor adapter: one chunk of text in, normalized nodes and relationships out.

use crate::llm::LanguageModel;
use crate::prompts::{PromptSet, EXTRACTION};
use crate::{AgentError, Result};
use async_trait::async_trait;
use commgraph_core::normalize::{normalize_node, normalize_relationship, same_entity};
use commgraph_core::property::RawProperties;
use commgraph_core::{Node, Relationship};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Type given to relationship endpoints that arrive as bare ids
/// and are not declared in the node list
const UNKNOWN_TYPE: &str = "Entity";

/// Normalized output of one extraction call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

/// Converts text into typed entities and relationships.
///
/// Allow-lists are guidance for the extractor, not filters on its output.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        allowed_nodes: Option<&[String]>,
        allowed_relationships: Option<&[String]>,
    ) -> Result<Extraction>;
}

/// Extractor backed by a language model that answers in JSON
pub struct LlmExtractor {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
}

impl LlmExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>) -> Self {
        Self { model, prompts }
    }

    fn system_prompt(
        &self,
        allowed_nodes: Option<&[String]>,
        allowed_relationships: Option<&[String]>,
    ) -> Result<String> {
        let mut prompt = self.prompts.get(EXTRACTION)?.to_string();
        if let Some(labels) = allowed_nodes.filter(|l| !l.is_empty()) {
            prompt.push_str("\n\nAllowed Node Labels: ");
            prompt.push_str(&labels.join(", "));
        }
        if let Some(types) = allowed_relationships.filter(|t| !t.is_empty()) {
            prompt.push_str("\n\nAllowed Relationship Types: ");
            prompt.push_str(&types.join(", "));
        }
        Ok(prompt)
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn extract(
        &self,
        text: &str,
        allowed_nodes: Option<&[String]>,
        allowed_relationships: Option<&[String]>,
    ) -> Result<Extraction> {
        let system = self.system_prompt(allowed_nodes, allowed_relationships)?;
        let user = format!(
            "Extract information from the following text using these rules: {}\n\nEnsure the output is in the correct format.",
            text
        );

        let generated = self.model.complete_json(&system, &user).await?;
        let extraction = parse_extraction(&generated)?;
        debug!(
            nodes = extraction.nodes.len(),
            relationships = extraction.relationships.len(),
            "Extraction parsed"
        );
        Ok(extraction)
    }
}

#[derive(Deserialize)]
struct RawExtraction {
    nodes: Vec<RawNode>,
    #[serde(default, alias = "rels")]
    relationships: Vec<RawRelationship>,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    properties: Option<RawProperties>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEndpoint {
    Id(String),
    Node {
        id: String,
        #[serde(rename = "type", default)]
        node_type: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawRelationship {
    source: RawEndpoint,
    target: RawEndpoint,
    #[serde(rename = "type")]
    rel_type: String,
    #[serde(default)]
    properties: Option<RawProperties>,
}

/// Parse and validate a model's JSON answer.
///
/// Code fences and prose around the object are ignored. Nodes are
/// normalized, and relationship endpoints missing from the node list are
/// added to it.
pub fn parse_extraction(payload: &str) -> Result<Extraction> {
    let cleaned = normalize_json_payload(payload);
    let raw: RawExtraction = serde_json::from_str(&cleaned)
        .map_err(|e| AgentError::Extraction(format!("model returned invalid JSON: {}", e)))?;

    let mut nodes = Vec::with_capacity(raw.nodes.len());
    for node in raw.nodes {
        if node.id.trim().is_empty() || node.node_type.trim().is_empty() {
            return Err(AgentError::Extraction(format!(
                "node with blank id or type: id={:?} type={:?}",
                node.id, node.node_type
            )));
        }
        let properties = node.properties.unwrap_or_default().into_properties();
        nodes.push(normalize_node(
            &Node::new(node.id.trim(), node.node_type.trim()).with_properties(properties),
        ));
    }

    let mut relationships = Vec::with_capacity(raw.relationships.len());
    for rel in raw.relationships {
        if rel.rel_type.trim().is_empty() {
            return Err(AgentError::Extraction("relationship with blank type".into()));
        }
        let source = resolve_endpoint(rel.source, &nodes)?;
        let target = resolve_endpoint(rel.target, &nodes)?;
        let properties = rel.properties.unwrap_or_default().into_properties();

        let mut relationship = Relationship::new(source, target, rel.rel_type.trim());
        relationship.properties = properties;
        relationships.push(normalize_relationship(&relationship));
    }

    let mut known: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for rel in &relationships {
        for endpoint in [&rel.source, &rel.target] {
            if known.insert(endpoint.id.clone()) {
                debug!(id = %endpoint.id, "Promoting relationship endpoint to node");
                nodes.push(endpoint.clone());
            }
        }
    }

    Ok(Extraction {
        nodes,
        relationships,
    })
}

fn resolve_endpoint(endpoint: RawEndpoint, nodes: &[Node]) -> Result<Node> {
    let (id, node_type) = match endpoint {
        RawEndpoint::Id(id) => (id, None),
        RawEndpoint::Node { id, node_type } => (id, node_type),
    };
    if id.trim().is_empty() {
        return Err(AgentError::Extraction("relationship endpoint with blank id".into()));
    }

    let declared = nodes.iter().find(|n| same_entity(&n.id, id.trim()));
    let node_type = node_type
        .filter(|t| !t.trim().is_empty())
        .or_else(|| declared.map(|n| n.node_type.clone()))
        .unwrap_or_else(|| UNKNOWN_TYPE.to_string());

    Ok(Node::new(id.trim(), node_type.trim()))
}

/// Strip code fences and surrounding prose, keeping the outermost `{...}`
pub(crate) fn normalize_json_payload(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }

    let without_fence = if trimmed.starts_with("```") {
        let mut lines = trimmed.lines();
        let _ = lines.next(); // drop ``` or ```json
        let mut content = lines.collect::<Vec<_>>().join("\n");
        if content.ends_with("```") {
            content.truncate(content.len().saturating_sub(3));
        }
        content.trim().to_string()
    } else {
        trimmed.to_string()
    };

    if let (Some(start), Some(end)) = (without_fence.find('{'), without_fence.rfind('}')) {
        if start < end {
            return without_fence[start..=end].to_string();
        }
    }

    without_fence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[test]
    fn test_parse_fenced_payload() {
        let payload = "Here you go:\n```json\n{\"nodes\": [{\"id\": \"john doe\", \"type\": \"person\"}]}\n```";
        let extraction = parse_extraction(payload).unwrap();

        assert_eq!(extraction.nodes.len(), 1);
        assert_eq!(extraction.nodes[0].id, "John Doe");
        assert_eq!(extraction.nodes[0].node_type, "Person");
        assert_eq!(extraction.nodes[0].properties.get("name"), Some("John Doe"));
    }

    #[test]
    fn test_parse_rels_alias_and_map_properties() {
        let payload = r#"{
            "nodes": [
                {"id": "Acme", "type": "organization", "properties": {"founded year": 1999}},
                {"id": "John Doe", "type": "person", "properties": null}
            ],
            "rels": [
                {"source": {"id": "John Doe", "type": "person"}, "target": {"id": "Acme", "type": "organization"}, "type": "WORKS_AT"}
            ]
        }"#;
        let extraction = parse_extraction(payload).unwrap();

        assert_eq!(extraction.nodes[0].properties.get("foundedYear"), Some("1999"));
        assert_eq!(extraction.relationships.len(), 1);
        assert_eq!(extraction.relationships[0].rel_type, "Works_at");
        assert_eq!(extraction.relationships[0].source.id, "John Doe");
    }

    #[test]
    fn test_dangling_endpoint_promoted() {
        let payload = r#"{
            "nodes": [{"id": "John Doe", "type": "Person"}],
            "relationships": [{"source": "john doe", "target": "Paris", "type": "lives in"}]
        }"#;
        let extraction = parse_extraction(payload).unwrap();

        let ids: Vec<&str> = extraction.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["John Doe", "Paris"]);
        assert_eq!(extraction.nodes[1].node_type, UNKNOWN_TYPE);
        assert_eq!(extraction.relationships[0].source.node_type, "Person");
    }

    #[test]
    fn test_blank_id_rejected() {
        let payload = r#"{"nodes": [{"id": "  ", "type": "Person"}]}"#;
        assert!(matches!(parse_extraction(payload), Err(AgentError::Extraction(_))));
    }

    #[test]
    fn test_unparseable_output_rejected() {
        assert!(parse_extraction("I could not find any entities.").is_err());
        assert!(parse_extraction(r#"{"entities": []}"#).is_err());
    }

    #[test]
    fn test_empty_extraction() {
        let extraction = parse_extraction(r#"{"nodes": [], "relationships": []}"#).unwrap();
        assert!(extraction.is_empty());
    }

    #[tokio::test]
    async fn test_allow_lists_reach_the_prompt() {
        let model = Arc::new(ScriptedModel::replying(r#"{"nodes": []}"#));
        let extractor = LlmExtractor::new(model.clone(), Arc::new(PromptSet::default()));

        let labels = vec!["Person".to_string(), "Organization".to_string()];
        extractor
            .extract("John Doe works at Acme.", Some(&labels), None)
            .await
            .unwrap();

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system.contains("Allowed Node Labels: Person, Organization"));
        assert!(!calls[0].system.contains("Allowed Relationship Types"));
        assert!(calls[0].user.contains("John Doe works at Acme."));
    }
}
