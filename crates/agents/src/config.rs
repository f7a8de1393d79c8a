//! Pipeline settings read from the environment

use crate::pool::{WorkerPool, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_CONCURRENCY};
use crate::{AgentError, Result};
use commgraph_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use commgraph_core::community::DEFAULT_RESOLUTION;
use commgraph_core::TokenSplitter;
use std::time::Duration;

/// What to do when extraction of one chunk fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionPolicy {
    /// Log the failure and leave the chunk without entities
    #[default]
    Skip,
    /// Try again up to this many times, then skip
    Retry(usize),
    /// Fail the whole run
    Abort,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_concurrency: usize,
    pub call_timeout: Duration,
    pub extraction_policy: ExtractionPolicy,
    pub allowed_nodes: Option<Vec<String>>,
    pub allowed_relationships: Option<Vec<String>>,
    pub resolution: f64,
    /// Run the refinement pass on final answers
    pub refine_answers: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            extraction_policy: ExtractionPolicy::Skip,
            allowed_nodes: None,
            allowed_relationships: None,
            resolution: DEFAULT_RESOLUTION,
            refine_answers: false,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_positive(key: &str, default: usize) -> usize {
    Some(env_usize(key, default))
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Defaults overridden by `CHUNK_SIZE`, `CHUNK_OVERLAP`,
    /// `MAX_CONCURRENCY`, `LLM_TIMEOUT_SECS` and `EXTRACTION_RETRIES`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retries = env_usize("EXTRACTION_RETRIES", 0);

        Self {
            chunk_size: env_positive("CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_usize("CHUNK_OVERLAP", defaults.chunk_overlap),
            max_concurrency: env_positive("MAX_CONCURRENCY", defaults.max_concurrency),
            call_timeout: Duration::from_secs(env_positive(
                "LLM_TIMEOUT_SECS",
                defaults.call_timeout.as_secs() as usize,
            ) as u64),
            extraction_policy: if retries > 0 {
                ExtractionPolicy::Retry(retries)
            } else {
                ExtractionPolicy::Skip
            },
            ..defaults
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_extraction_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.extraction_policy = policy;
        self
    }

    pub fn with_allowed_nodes(mut self, labels: Vec<String>) -> Self {
        self.allowed_nodes = Some(labels);
        self
    }

    pub fn with_allowed_relationships(mut self, types: Vec<String>) -> Self {
        self.allowed_relationships = Some(types);
        self
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_refinement(mut self, refine: bool) -> Self {
        self.refine_answers = refine;
        self
    }

    /// Reject structurally invalid combinations
    pub fn validate(&self) -> Result<()> {
        self.splitter()?;
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(AgentError::Config(format!(
                "resolution must be a positive number, got {}",
                self.resolution
            )));
        }
        Ok(())
    }

    pub fn splitter(&self) -> Result<TokenSplitter> {
        Ok(TokenSplitter::new(self.chunk_size, self.chunk_overlap)?)
    }

    pub fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.max_concurrency, self.call_timeout)
    }
}
