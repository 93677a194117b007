//! Embedding collaborator trait

use async_trait::async_trait;

use crate::Result;

/// Trait for text embedders
///
/// The vector store collection must be created with the same [`Embedder::dimension`]
/// the embedder produces.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;
}
