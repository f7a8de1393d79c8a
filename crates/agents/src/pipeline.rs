//! End-to-end pipeline: build the graph, detect and summarize communities, answer queries

use crate::answerer::{Answer, QueryAnswerer};
use crate::builder::{BuildReport, GraphBuilder};
use crate::config::PipelineConfig;
use crate::extractor::{Extractor, LlmExtractor};
use crate::llm::LanguageModel;
use crate::prompts::PromptSet;
use crate::summarizer::CommunitySummarizer;
use crate::Result;
use chrono::{DateTime, Utc};
use commgraph_core::document::{list_documents, Document};
use commgraph_core::summary::digest;
use commgraph_core::{CommunityDetector, CommunitySummary, EntityGraph, GraphDocument, Partition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Everything one build produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub built_at: DateTime<Utc>,
    /// Folder the documents were read from, when built from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_folder: Option<String>,
    pub graph: GraphDocument,
    pub partition: Partition,
    pub summaries: Vec<CommunitySummary>,
    pub report: BuildReport,
}

impl PipelineRun {
    /// `Community {n}: {summary}` per community
    pub fn digest(&self) -> String {
        digest(&self.summaries)
    }

    /// Names that citations are resolved against: the data folder's files
    /// when it still exists, else the file nodes of the graph
    pub fn source_names(&self) -> Vec<String> {
        if let Some(folder) = &self.data_folder {
            if let Ok(paths) = list_documents(Path::new(folder)) {
                return paths
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
            }
        }
        self.graph
            .files()
            .filter_map(|n| n.properties.get("path"))
            .filter_map(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

pub struct Pipeline {
    model: Arc<dyn LanguageModel>,
    extractor: Arc<dyn Extractor>,
    prompts: Arc<PromptSet>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline whose extractor is the language model itself
    pub fn new(model: Arc<dyn LanguageModel>, prompts: PromptSet, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let prompts = Arc::new(prompts);
        let extractor = Arc::new(LlmExtractor::new(model.clone(), prompts.clone()));
        Ok(Self {
            model,
            extractor,
            prompts,
            config,
        })
    }

    /// Builder: use a different extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build from every regular file in `folder`
    pub async fn build_from_folder(&self, folder: &Path) -> Result<PipelineRun> {
        let paths = list_documents(folder)?;
        info!(folder = %folder.display(), files = paths.len(), "Processing data folder");
        let mut run = self.build_from_paths(&paths).await?;
        run.data_folder = Some(folder.display().to_string());
        Ok(run)
    }

    pub async fn build_from_paths(&self, paths: &[PathBuf]) -> Result<PipelineRun> {
        let builder = GraphBuilder::new(self.extractor.clone(), &self.config)?;
        let (graph, report) = builder.build_from_paths(paths).await?;
        self.finish(graph, report).await
    }

    pub async fn build(&self, documents: &[Document]) -> Result<PipelineRun> {
        let builder = GraphBuilder::new(self.extractor.clone(), &self.config)?;
        let (graph, report) = builder.build(documents).await?;
        self.finish(graph, report).await
    }

    #[instrument(skip_all)]
    async fn finish(&self, graph: GraphDocument, report: BuildReport) -> Result<PipelineRun> {
        let projection = EntityGraph::from_document(&graph);
        let partition = CommunityDetector::new()
            .with_resolution(self.config.resolution)
            .detect(&projection);
        info!(
            communities = partition.len(),
            modularity = partition.modularity,
            levels = partition.levels,
            "Communities detected"
        );

        let summaries = CommunitySummarizer::new(self.model.clone(), self.prompts.clone(), self.config.pool())
            .summarize(&projection, &partition)
            .await?;

        Ok(PipelineRun {
            run_id: Uuid::new_v4(),
            built_at: Utc::now(),
            data_folder: None,
            graph,
            partition,
            summaries,
            report,
        })
    }

    pub fn answerer(&self) -> QueryAnswerer {
        QueryAnswerer::new(self.model.clone(), self.prompts.clone(), self.config.pool())
            .with_refinement(self.config.refine_answers)
    }

    /// Answer `query` from a run's summaries
    pub async fn answer(&self, query: &str, run: &PipelineRun) -> Result<Answer> {
        self.answerer()
            .answer(query, &run.summaries, &run.source_names())
            .await
    }
}
