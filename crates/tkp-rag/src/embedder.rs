//! Deterministic local embedder

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tkp_core::{Embedder, Result};

/// Hashed bag-of-words embedder.
///
/// Produces normalized vectors without any network call. Texts sharing words land
/// close together, which is enough to exercise the retrieval path in tests and demos.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> (usize, u64) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let hash = hasher.finish();
        ((hash as usize) % self.dimension, hash)
    }

    /// Embed text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let mut embedding = vec![0.0f32; self.dimension];

        for word in &words {
            let (idx, hash) = self.bucket(word);
            embedding[idx] += 1.0;

            if word.len() > 3 {
                let secondary = ((hash >> 16) as usize) % self.dimension;
                embedding[secondary] += 0.5;
            }
        }

        for window in words.windows(2) {
            let (idx, _) = self.bucket(&format!("{} {}", window[0], window[1]));
            embedding[idx] += 0.3;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
