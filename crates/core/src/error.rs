//! Error types for the core domain

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// A document could not be read or decoded
    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Data folder not found: {0}")]
    FolderNotFound(String),

    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
