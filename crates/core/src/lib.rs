//! Core domain types for CommGraph
//!
//! This crate defines the data structures and pure algorithms of the
//! pipeline: documents and chunking, graph nodes and relationships, identity
//! normalization, the undirected projection, and community detection.

pub mod chunk;
pub mod community;
pub mod document;
pub mod dot;
pub mod error;
pub mod graph;
pub mod node;
pub mod normalize;
pub mod projection;
pub mod property;
pub mod summary;

pub use chunk::{Chunk, TokenSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use community::{Community, CommunityDetector, Partition};
pub use document::{Document, FILE_NOT_FOUND};
pub use error::{CoreError, Result};
pub use graph::{GraphDocument, GraphStats};
pub use node::{Node, Relationship, CHUNK_TYPE, FILE_TYPE, FROM};
pub use projection::{EdgeLabel, EntityGraph};
pub use property::{Properties, Property};
pub use summary::CommunitySummary;
