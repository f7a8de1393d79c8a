//! Community summarizer

use crate::llm::LanguageModel;
use crate::pool::WorkerPool;
use crate::prompts::{PromptSet, COMMUNITY_SUMMARIES};
use crate::{AgentError, Result};
use commgraph_core::{CommunitySummary, EntityGraph, Partition};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct CommunitySummarizer {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
    pool: WorkerPool,
}

impl CommunitySummarizer {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>, pool: WorkerPool) -> Self {
        Self {
            model,
            prompts,
            pool,
        }
    }

    /// One summary per community, in community order. A failed call yields a
    /// placeholder instead of an error.
    #[instrument(skip_all, fields(communities = partition.len()))]
    pub async fn summarize(
        &self,
        graph: &EntityGraph,
        partition: &Partition,
    ) -> Result<Vec<CommunitySummary>> {
        let system = self.prompts.get(COMMUNITY_SUMMARIES)?;
        let descriptions: Vec<(usize, String)> = partition
            .communities
            .iter()
            .map(|c| (c.index, graph.describe(&c.members)))
            .collect();

        let results = self
            .pool
            .run(descriptions, |(index, description)| async move {
                let text = self
                    .pool
                    .call(self.model.complete(system, &description))
                    .await?;
                Ok::<_, AgentError>((index, text.trim().to_string()))
            })
            .await;

        let summaries: Vec<CommunitySummary> = results
            .into_iter()
            .zip(&partition.communities)
            .map(|(result, community)| match result {
                Ok((index, text)) => CommunitySummary::generated(index, text),
                Err(e) => {
                    let error = AgentError::Summarization {
                        index: community.index,
                        reason: e.to_string(),
                    };
                    warn!(community = community.index, error = %e, "Summarization failed, using placeholder");
                    CommunitySummary::placeholder(community.index, error.to_string())
                }
            })
            .collect();

        info!(
            summaries = summaries.len(),
            placeholders = summaries.iter().filter(|s| s.is_placeholder()).count(),
            "Communities summarized"
        );
        Ok(summaries)
    }
}
