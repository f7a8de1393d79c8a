//! Graph assembler: documents in, one deduplicated knowledge graph out.
//!
//! Extraction runs concurrently through the worker pool. Merging happens
//! afterwards, in document and chunk order, so the same inputs and extractor
//! answers always produce the same graph.

use crate::config::{ExtractionPolicy, PipelineConfig};
use crate::extractor::{Extraction, Extractor};
use crate::pool::WorkerPool;
use crate::{AgentError, Result};
use commgraph_core::document::load_document;
use commgraph_core::normalize::{link, normalize_node, normalize_relationship};
use commgraph_core::{Document, GraphDocument, GraphStats, Node, Relationship, TokenSplitter, FROM};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// A document that could not be used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    Extracted {
        nodes: usize,
        relationships: usize,
        attempts: usize,
    },
    Failed {
        error: String,
        attempts: usize,
    },
}

/// Extraction result of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    /// File name the chunk belongs to
    pub file: String,
    pub chunk: usize,
    #[serde(flatten)]
    pub status: ChunkStatus,
}

impl ChunkOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ChunkStatus::Failed { .. })
    }
}

/// Ledger of one build: per-item failures, chunk outcomes and totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub files_loaded: usize,
    pub file_failures: Vec<FileFailure>,
    pub chunks: Vec<ChunkOutcome>,
    pub stats: GraphStats,
    pub elapsed_ms: u64,
}

impl BuildReport {
    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|c| c.is_failed())
    }
}

struct ChunkJob {
    file: usize,
    index: usize,
    text: String,
}

pub struct GraphBuilder {
    extractor: Arc<dyn Extractor>,
    splitter: TokenSplitter,
    pool: WorkerPool,
    policy: ExtractionPolicy,
    allowed_nodes: Option<Vec<String>>,
    allowed_relationships: Option<Vec<String>>,
}

impl GraphBuilder {
    pub fn new(extractor: Arc<dyn Extractor>, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            extractor,
            splitter: config.splitter()?,
            pool: config.pool(),
            policy: config.extraction_policy,
            allowed_nodes: config.allowed_nodes.clone(),
            allowed_relationships: config.allowed_relationships.clone(),
        })
    }

    /// Load and build. Files that cannot be read or decoded are logged,
    /// recorded in the report and skipped.
    #[instrument(skip_all, fields(files = paths.len()))]
    pub async fn build_from_paths(&self, paths: &[PathBuf]) -> Result<(GraphDocument, BuildReport)> {
        let mut documents = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();

        for path in paths {
            match load_document(path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unreadable document");
                    failures.push(FileFailure {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let (graph, mut report) = self.build(&documents).await?;
        failures.append(&mut report.file_failures);
        report.file_failures = failures;
        Ok((graph, report))
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build(&self, documents: &[Document]) -> Result<(GraphDocument, BuildReport)> {
        let started = Instant::now();
        let mut report = BuildReport::default();

        let mut file_nodes: Vec<Node> = Vec::with_capacity(documents.len());
        let mut seen_files = HashSet::new();
        let mut jobs = Vec::new();

        for doc in documents {
            let file = Node::file(&doc.path);
            if !seen_files.insert(file.id.clone()) {
                warn!(file = %doc.path, "Skipping document with duplicate file name");
                report.file_failures.push(FileFailure {
                    path: doc.path.clone(),
                    error: format!("duplicate file name {}", file.id),
                });
                continue;
            }

            for chunk in self.splitter.split(&doc.text) {
                jobs.push(ChunkJob {
                    file: file_nodes.len(),
                    index: chunk.index,
                    text: chunk.content,
                });
            }
            file_nodes.push(file);
        }
        report.files_loaded = file_nodes.len();

        info!(
            files = file_nodes.len(),
            chunks = jobs.len(),
            "Extracting entities"
        );
        let results = self
            .pool
            .run(jobs.iter().collect::<Vec<_>>(), |job| self.extract_chunk(job))
            .await;

        let chunk_nodes: Vec<Node> = jobs
            .iter()
            .map(|j| Node::chunk(&j.text, j.index, &file_nodes[j.file]))
            .collect();
        let structural: HashSet<String> = file_nodes
            .iter()
            .chain(&chunk_nodes)
            .map(|n| normalize_node(n).id)
            .collect();

        // Single writer, input order
        let mut distinct: Vec<Node> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut relationships = Vec::new();

        for ((job, chunk), result) in jobs.iter().zip(&chunk_nodes).zip(results) {
            let file = &file_nodes[job.file];
            relationships.push(link(chunk, file, FROM));

            let status = match result {
                Ok((extraction, attempts)) => {
                    let status = ChunkStatus::Extracted {
                        nodes: extraction.nodes.len(),
                        relationships: extraction.relationships.len(),
                        attempts,
                    };
                    let (nodes, extracted) = normalize_extraction(extraction);
                    for node in nodes {
                        relationships.push(link(&node, chunk, FROM));
                        if structural.contains(&node.id) {
                            debug!(id = %node.id, "Entity id collides with a file or chunk node");
                        } else if seen.insert(node.id.clone()) {
                            distinct.push(node);
                        }
                    }
                    relationships.extend(extracted);
                    status
                }
                Err((e, attempts)) => {
                    if self.policy == ExtractionPolicy::Abort {
                        error!(file = %file.id, chunk = job.index, error = %e, "Extraction failed, aborting");
                        return Err(AgentError::Extraction(format!(
                            "{} chunk {}: {}",
                            file.id, job.index, e
                        )));
                    }
                    warn!(file = %file.id, chunk = job.index, error = %e, "Extraction failed, chunk skipped");
                    ChunkStatus::Failed {
                        error: e.to_string(),
                        attempts,
                    }
                }
            };

            report.chunks.push(ChunkOutcome {
                file: file.id.clone(),
                chunk: job.index,
                status,
            });
        }

        let mut nodes = distinct;
        nodes.extend(file_nodes.iter().map(normalize_node));
        nodes.extend(chunk_nodes.iter().map(normalize_node));

        let graph = GraphDocument {
            nodes,
            relationships,
        };
        report.stats = graph.stats();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            entities = report.stats.entities,
            relationships = report.stats.relationships,
            failed_chunks = report.failed_chunks().count(),
            elapsed_ms = report.elapsed_ms,
            "Graph assembled"
        );
        Ok((graph, report))
    }

    /// Extract one chunk under the configured policy. Returns the number of
    /// attempts alongside the outcome.
    async fn extract_chunk(
        &self,
        job: &ChunkJob,
    ) -> std::result::Result<(Extraction, usize), (AgentError, usize)> {
        let attempts = match self.policy {
            ExtractionPolicy::Retry(n) => n + 1,
            ExtractionPolicy::Skip | ExtractionPolicy::Abort => 1,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .pool
                .call(self.extractor.extract(
                    &job.text,
                    self.allowed_nodes.as_deref(),
                    self.allowed_relationships.as_deref(),
                ))
                .await;

            match result {
                Ok(extraction) => return Ok((extraction, attempt)),
                Err(e) if attempt < attempts => {
                    debug!(chunk = job.index, attempt, error = %e, "Extraction attempt failed, retrying");
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

/// Normalize an extractor's output and add relationship endpoints missing
/// from its node list, so every entity gets provenance
fn normalize_extraction(extraction: Extraction) -> (Vec<Node>, Vec<Relationship>) {
    let mut nodes: Vec<Node> = extraction.nodes.iter().map(normalize_node).collect();
    let relationships: Vec<Relationship> = extraction
        .relationships
        .iter()
        .map(normalize_relationship)
        .collect();

    let mut known: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for rel in &relationships {
        for endpoint in [&rel.source, &rel.target] {
            if known.insert(endpoint.id.clone()) {
                nodes.push(endpoint.clone());
            }
        }
    }
    (nodes, relationships)
}
