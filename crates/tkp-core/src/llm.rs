//! Generation collaborator trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "ibm/granite-3-3-8b-instruct".to_string(),
            max_tokens: 600,
            temperature: None,
            top_p: Some(1.0),
            top_k: Some(50),
            stop_sequences: vec!["Question:".to_string()],
            timeout: Duration::from_secs(60),
        }
    }
}

/// The three parts of a grounded-answer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Fixed instruction contract the answer must obey
    pub instruction: String,
    /// Rendered source blocks
    pub context: String,
    pub question: String,
}

impl GenerationRequest {
    /// Render the request as a single completion prompt
    pub fn to_prompt(&self) -> String {
        format!(
            "{}\n\nContext:\n{}\nQuestion: {}\n\nAnswer:",
            self.instruction.trim_end(),
            self.context,
            self.question.trim()
        )
    }
}

/// Result of a text generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub tokens_used: Option<u32>,
}

/// Trait for answer generators (e.g., watsonx.ai, test doubles)
///
/// Implementations may be slow and may fail; callers own retry and timeout policy
/// above the per-call timeout an adapter applies itself.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer for a grounded request
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
