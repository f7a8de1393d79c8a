//! Map-reduce query answering over community summaries, with source attribution

use crate::error::AnswerPhase;
use crate::llm::LanguageModel;
use crate::pool::WorkerPool;
use crate::prompts::{PromptSet, EDIT_RESPONSE, FINAL_ANSWERS, INTERMEDIATE_ANSWERS};
use crate::{AgentError, Result};
use commgraph_core::CommunitySummary;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};

/// Placeholder query of the interactive front end
pub const SENTINEL_QUERY: &str = "Select an option...";
pub const INVALID_QUERY_ANSWER: &str = "Please select a valid query.";

static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(Source:\s*([^)]*)\)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Data-folder file names cited by the answer
    pub sources: Vec<String>,
    /// Map-phase answers, one per summary
    pub intermediate: Vec<String>,
    pub refined: bool,
}

impl Answer {
    fn invalid_query() -> Self {
        Self {
            text: INVALID_QUERY_ANSWER.to_string(),
            sources: Vec::new(),
            intermediate: Vec::new(),
            refined: false,
        }
    }
}

pub struct QueryAnswerer {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
    pool: WorkerPool,
    refine: bool,
}

impl QueryAnswerer {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>, pool: WorkerPool) -> Self {
        Self {
            model,
            prompts,
            pool,
            refine: false,
        }
    }

    /// Builder: format the final answer into ranked bullet points
    pub fn with_refinement(mut self, refine: bool) -> Self {
        self.refine = refine;
        self
    }

    /// Answer `query` from `summaries` and attribute it to the files in
    /// `source_names`. The sentinel query short-circuits without model calls.
    #[instrument(skip(self, summaries, source_names), fields(summaries = summaries.len()))]
    pub async fn answer(
        &self,
        query: &str,
        summaries: &[CommunitySummary],
        source_names: &[String],
    ) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() || query == SENTINEL_QUERY {
            debug!("Sentinel query, skipping model calls");
            return Ok(Answer::invalid_query());
        }

        let intermediate = self.map(query, summaries).await?;
        let text = self.reduce(query, &intermediate).await?;
        let (text, refined) = if self.refine {
            self.refine_answer(query, text).await
        } else {
            (text, false)
        };
        let sources = extract_sources(&text, source_names);

        info!(sources = sources.len(), refined, "Query answered");
        Ok(Answer {
            text,
            sources,
            intermediate,
            refined,
        })
    }

    async fn map(&self, query: &str, summaries: &[CommunitySummary]) -> Result<Vec<String>> {
        let system = self.prompts.get(INTERMEDIATE_ANSWERS)?;

        let results = self
            .pool
            .run(summaries.iter().collect::<Vec<_>>(), |summary| async move {
                let user = format!("Query: {} Summary: {}", query, summary.text);
                self.pool
                    .call(self.model.complete(system, &user))
                    .await
                    .map_err(|e| AgentError::Answer {
                        phase: AnswerPhase::Map {
                            community: summary.community_index,
                        },
                        reason: e.to_string(),
                    })
            })
            .await;

        results
            .into_iter()
            .map(|r| r.map(|text| text.trim().to_string()))
            .collect()
    }

    async fn reduce(&self, query: &str, intermediate: &[String]) -> Result<String> {
        let system = self.prompts.get(FINAL_ANSWERS)?;
        let answers = serde_json::to_string(intermediate).map_err(|e| AgentError::Answer {
            phase: AnswerPhase::Reduce,
            reason: e.to_string(),
        })?;
        let user = format!("Intermediate answers: {} , Query: {}", answers, query);

        let text = self
            .pool
            .call(self.model.complete(system, &user))
            .await
            .map_err(|e| AgentError::Answer {
                phase: AnswerPhase::Reduce,
                reason: e.to_string(),
            })?;
        Ok(text.trim().to_string())
    }

    /// Refinement never fails the query; the unrefined text is kept instead
    async fn refine_answer(&self, query: &str, text: String) -> (String, bool) {
        let system = match self.prompts.get(EDIT_RESPONSE) {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "Refinement skipped");
                return (text, false);
            }
        };
        let user = format!("Query: {}\nResponse:\n{}", query, text);

        match self.pool.call(self.model.complete(system, &user)).await {
            Ok(refined) if !refined.trim().is_empty() => (refined.trim().to_string(), true),
            Ok(_) => {
                warn!("Refinement returned nothing, keeping the unrefined answer");
                (text, false)
            }
            Err(e) => {
                warn!(error = %e, "Refinement failed, keeping the unrefined answer");
                (text, false)
            }
        }
    }
}

/// File names from `file_names` cited in `answer`'s `(Source: a, b)` markers.
///
/// Each cited name is stripped of whitespace, quotes, underscores and its
/// extension, lower-cased, and matched as a substring of the lower-cased file
/// names. Matches are distinct and sorted.
pub fn extract_sources(answer: &str, file_names: &[String]) -> Vec<String> {
    let mut matches = BTreeSet::new();
    for captures in CITATION.captures_iter(answer) {
        for cited in captures[1].split(',') {
            let cleaned = cited
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '_' || c.is_whitespace());
            let stem = cleaned.split('.').next().unwrap_or_default().to_lowercase();
            if stem.is_empty() {
                continue;
            }
            for name in file_names {
                if name.to_lowercase().contains(&stem) {
                    matches.insert(name.clone());
                }
            }
        }
    }

    matches.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn summaries() -> Vec<CommunitySummary> {
        vec![
            CommunitySummary::generated(0, "Inflation rose in 2023."),
            CommunitySummary::generated(1, "Premiums increased."),
        ]
    }

    fn answerer(model: Arc<ScriptedModel>) -> QueryAnswerer {
        QueryAnswerer::new(model, Arc::new(PromptSet::default()), WorkerPool::default())
    }

    #[test]
    fn test_extract_sources() {
        let files = names(&["inflation_report.txt", "premiums.txt", "sports.txt"]);
        let answer = "Costs rose (Source: \"Inflation_Report.txt\", premiums) and fell (Source: inflation)";

        let sources = extract_sources(answer, &files);
        assert_eq!(sources, names(&["inflation_report.txt", "premiums.txt"]));
    }

    #[test]
    fn test_extract_sources_without_citations() {
        let files = names(&["a.txt"]);
        assert!(extract_sources("No citations here.", &files).is_empty());
        assert!(extract_sources("(Source: )", &files).is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_makes_no_calls() {
        let model = Arc::new(ScriptedModel::replying("unused"));
        let answer = answerer(model.clone())
            .answer(SENTINEL_QUERY, &summaries(), &[])
            .await
            .unwrap();

        assert_eq!(answer.text, INVALID_QUERY_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_map_reduce() {
        let model = Arc::new(ScriptedModel::new(|_, user| {
            if user.starts_with("Query:") {
                Ok(format!("partial for [{}]", user))
            } else {
                Ok("Premiums rose (Source: premiums.txt)".into())
            }
        }));
        let answer = answerer(model.clone())
            .answer("What happened to premiums?", &summaries(), &names(&["premiums.txt", "other.txt"]))
            .await
            .unwrap();

        assert_eq!(model.call_count(), 3);
        assert_eq!(answer.intermediate.len(), 2);
        assert_eq!(
            answer.intermediate[0],
            "partial for [Query: What happened to premiums? Summary: Inflation rose in 2023.]"
        );
        assert_eq!(answer.text, "Premiums rose (Source: premiums.txt)");
        assert_eq!(answer.sources, names(&["premiums.txt"]));
        assert!(!answer.refined);

        let reduce = &model.calls()[2];
        assert!(reduce.user.starts_with("Intermediate answers: ["));
        assert!(reduce.user.ends_with(" , Query: What happened to premiums?"));
    }

    #[tokio::test]
    async fn test_map_failure_reports_community() {
        let model = Arc::new(ScriptedModel::new(|_, user| {
            if user.contains("Premiums increased") {
                Err(AgentError::Model("boom".into()))
            } else {
                Ok("ok".into())
            }
        }));
        let err = answerer(model)
            .answer("premiums?", &summaries(), &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Answer {
                phase: AnswerPhase::Map { community: 1 },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reduce_failure() {
        let model = Arc::new(ScriptedModel::new(|_, user| {
            if user.starts_with("Intermediate") {
                Err(AgentError::Model("down".into()))
            } else {
                Ok("ok".into())
            }
        }));
        let err = answerer(model)
            .answer("premiums?", &summaries(), &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Answer {
                phase: AnswerPhase::Reduce,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refinement_failure_keeps_answer() {
        let model = Arc::new(ScriptedModel::new(|system, _| {
            if system.contains("meticulous editor") {
                Err(AgentError::Model("editor offline".into()))
            } else {
                Ok("final".into())
            }
        }));
        let answer = answerer(model.clone())
            .with_refinement(true)
            .answer("premiums?", &summaries(), &[])
            .await
            .unwrap();

        assert_eq!(answer.text, "final");
        assert!(!answer.refined);
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_refinement_replaces_answer() {
        let model = Arc::new(ScriptedModel::new(|system, _| {
            if system.contains("meticulous editor") {
                Ok("- point one".into())
            } else {
                Ok("final".into())
            }
        }));
        let answer = answerer(model)
            .with_refinement(true)
            .answer("premiums?", &summaries(), &[])
            .await
            .unwrap();

        assert_eq!(answer.text, "- point one");
        assert!(answer.refined);
    }
}
