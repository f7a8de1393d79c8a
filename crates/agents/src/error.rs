//! Agent error types

use commgraph_core::CoreError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Stage of query answering that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPhase {
    /// Intermediate answer for one community
    Map { community: usize },
    Reduce,
}

impl fmt::Display for AnswerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerPhase::Map { community } => write!(f, "map (community {})", community),
            AnswerPhase::Reduce => write!(f, "reduce"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Model output could not be turned into nodes and relationships
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Failed to summarize community {index}: {reason}")]
    Summarization { index: usize, reason: String },

    #[error("Answer failed during {phase}: {reason}")]
    Answer { phase: AnswerPhase, reason: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
