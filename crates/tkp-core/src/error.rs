//! Error types for the trust-aware knowledge platform

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the TKP system
#[derive(Error, Debug)]
pub enum Error {
    /// A chunk payload carried a field of the wrong shape
    #[error("Validation error for chunk {vector_id}: {reason}")]
    Validation { vector_id: String, reason: String },

    /// The generation collaborator could not produce an answer
    #[error("Generation failed after {attempts} attempt(s): {reason}")]
    GenerationFailure { attempts: u32, reason: String },

    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Build a validation error for the chunk identified by `vector_id`
    pub fn validation(vector_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            vector_id: vector_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Network(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
