//! System prompt templates keyed by fixed names

use crate::{AgentError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub const EXTRACTION: &str = "extraction";
pub const COMMUNITY_SUMMARIES: &str = "community_summaries";
pub const INTERMEDIATE_ANSWERS: &str = "intermediate_answers";
pub const FINAL_ANSWERS: &str = "final_answers";
pub const EDIT_RESPONSE: &str = "edit_response";

pub const PROMPT_NAMES: &[&str] = &[
    EXTRACTION,
    COMMUNITY_SUMMARIES,
    INTERMEDIATE_ANSWERS,
    FINAL_ANSWERS,
    EDIT_RESPONSE,
];

const DEFAULT_EXTRACTION: &str = r#"# Knowledge Graph Extraction
You extract structured data to build a knowledge graph made of nodes (entities or concepts) and relationships between them.

Nodes:
- Use general labels for node types, such as "person" or "organization".
- Use human-readable identifiers for node ids, never integers or generic ids.
- Record numbers and dates as node properties with camelCase keys, never as separate nodes.

Relationships:
- Use concise verb-phrase types such as "worksAt" or "bornIn".
- Avoid overly detailed or complex relationship types.

Coreference:
- Always use the most complete identifier for an entity, for example "John Doe" rather than "John" or "he".

Output a single JSON object and nothing else:
{"nodes": [{"id": string, "type": string, "properties": [{"key": string, "value": string}]}],
 "relationships": [{"source": {"id": string, "type": string}, "target": {"id": string, "type": string}, "type": string, "properties": [{"key": string, "value": string}]}]}
If the text mentions no entities, return {"nodes": [], "relationships": []}."#;

const DEFAULT_COMMUNITY_SUMMARIES: &str = "You are given the entities and relationships of one community of a knowledge graph. \
Write a concise summary of what the community is about, naming its key entities and how they relate. \
Mention the source documents the facts come from when they are visible.";

const DEFAULT_INTERMEDIATE_ANSWERS: &str = "You answer a user query using only the community summary provided. \
If the summary does not help answer the query, say so briefly. \
Cite supporting documents in the form (Source: file1, file2).";

const DEFAULT_FINAL_ANSWERS: &str = "You combine intermediate answers into one final answer to the user query. \
Drop answers that do not address the query, merge overlapping points, and keep every (Source: ...) citation attached to the facts it supports.";

const DEFAULT_EDIT_RESPONSE: &str = "You are a meticulous editor and ranking expert. \
Format the response into clear, concise bullet points ranked by relevance to the query, most relevant first. \
Keep every (Source: ...) citation. If a point has no source, mark it with 'No source explicitly found'. \
Do not add titles or sections. Output only the ranked bullet points.";

/// Named system prompts. Starts from built-in defaults; any name can be
/// replaced from a directory of `{name}.txt` files.
#[derive(Debug, Clone)]
pub struct PromptSet {
    prompts: HashMap<String, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        let prompts = [
            (EXTRACTION, DEFAULT_EXTRACTION),
            (COMMUNITY_SUMMARIES, DEFAULT_COMMUNITY_SUMMARIES),
            (INTERMEDIATE_ANSWERS, DEFAULT_INTERMEDIATE_ANSWERS),
            (FINAL_ANSWERS, DEFAULT_FINAL_ANSWERS),
            (EDIT_RESPONSE, DEFAULT_EDIT_RESPONSE),
        ]
        .into_iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();

        Self { prompts }
    }
}

impl PromptSet {
    /// Defaults overridden by whichever `{name}.txt` files exist in `dir`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AgentError::Config(format!(
                "prompt directory not found: {}",
                dir.display()
            )));
        }

        let mut set = Self::default();
        for name in PROMPT_NAMES {
            let path = dir.join(format!("{}.txt", name));
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|e| {
                AgentError::Config(format!("failed to read {}: {}", path.display(), e))
            })?;
            debug!(prompt = name, path = %path.display(), "Prompt overridden");
            set.prompts.insert(name.to_string(), text.trim().to_string());
        }
        Ok(set)
    }

    /// Builder: replace one prompt
    pub fn with_prompt(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(name.into(), text.into());
        self
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.prompts
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AgentError::PromptNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_cover_every_name() {
        let set = PromptSet::default();
        for name in PROMPT_NAMES {
            assert!(!set.get(name).unwrap().is_empty());
        }
        assert!(matches!(set.get("nope"), Err(AgentError::PromptNotFound(_))));
    }

    #[test]
    fn test_from_dir_overrides_present_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("final_answers.txt"), "Be brief.\n").unwrap();

        let set = PromptSet::from_dir(dir.path()).unwrap();
        assert_eq!(set.get(FINAL_ANSWERS).unwrap(), "Be brief.");
        assert_eq!(
            set.get(EXTRACTION).unwrap(),
            PromptSet::default().get(EXTRACTION).unwrap()
        );
    }

    #[test]
    fn test_from_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(PromptSet::from_dir(&dir.path().join("missing")).is_err());
    }
}
