//! Retrieval collaborator trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChunkPayload, ChunkRecord, Result, TrustConfig};

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub limit: u64,
    pub score_threshold: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            score_threshold: Some(0.7),
        }
    }
}

impl From<&TrustConfig> for SearchConfig {
    fn from(config: &TrustConfig) -> Self {
        Self {
            limit: config.retrieval_limit,
            score_threshold: Some(config.relevance_threshold),
        }
    }
}

/// A chunk to be written to the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPoint {
    pub vector_id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Trait for vector stores (e.g., Qdrant, in-memory)
///
/// `search` returns hits ordered by similarity, highest first, with every
/// `relevance_score` at or above `score_threshold` and at most `limit` entries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store chunks with their vectors, replacing any existing ids
    async fn upsert_chunks(&self, points: Vec<ChunkPoint>) -> Result<usize>;

    /// Search using a vector embedding
    async fn search(&self, vector: &[f32], config: &SearchConfig) -> Result<Vec<ChunkRecord>>;

    /// Get the total number of stored chunks
    async fn count(&self) -> Result<usize>;
}
