//! Model-backed agents for CommGraph
//!
//! This crate contains the parts of the pipeline that call a language model:
//! - Extractor: turns chunks of text into entities and relationships
//! - GraphBuilder: assembles the knowledge graph from many extractions
//! - CommunitySummarizer: summarizes detected communities
//! - QueryAnswerer: map-reduce answering with source attribution

pub mod answerer;
pub mod builder;
pub mod config;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod pipeline;
pub mod pool;
pub mod prompts;
pub mod summarizer;
pub mod testing;

pub use answerer::{extract_sources, Answer, QueryAnswerer};
pub use builder::{BuildReport, ChunkOutcome, ChunkStatus, GraphBuilder};
pub use config::{ExtractionPolicy, PipelineConfig};
pub use error::{AgentError, AnswerPhase, Result};
pub use extractor::{Extraction, Extractor, LlmExtractor};
pub use llm::{ChatClient, LanguageModel, Provider};
pub use pipeline::{Pipeline, PipelineRun};
pub use pool::WorkerPool;
pub use prompts::PromptSet;
pub use summarizer::CommunitySummarizer;
