//! Data shapes shared by the trust pipeline and its collaborators

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

/// Identifier of the document a chunk was cut from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    Text(String),
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(id) => write!(f, "{}", id),
            DocumentId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: Option<DocumentId>,
    pub title: String,
    pub content: String,
    pub page: Option<u32>,
    /// ISO-8601 creation timestamp of the source document
    pub created_at: Option<String>,
}

impl ChunkPayload {
    /// Parse an untyped payload into its typed form.
    ///
    /// `null` and missing optional fields are treated as absent. Any field carrying the
    /// wrong JSON type is rejected with [`Error::Validation`] naming `vector_id`.
    pub fn from_json(vector_id: &str, payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| Error::validation(vector_id, "payload must be a JSON object"))?;

        let document_id = match object.get("document_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(DocumentId::Text(s.clone())),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(id) => Some(DocumentId::Int(id)),
                None => {
                    return Err(Error::validation(
                        vector_id,
                        format!("document_id must be an integer, got {}", n),
                    ));
                }
            },
            Some(other) => {
                return Err(Error::validation(
                    vector_id,
                    format!("document_id must be an integer or string, got {}", other),
                ));
            }
        };

        let title = required_string(vector_id, object.get("title"), "title")?;
        let content = required_string(vector_id, object.get("content"), "content")?;

        let page = match object.get("page") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let page = value
                    .as_u64()
                    .and_then(|p| u32::try_from(p).ok())
                    .ok_or_else(|| {
                        Error::validation(
                            vector_id,
                            format!("page must be a non-negative integer, got {}", value),
                        )
                    })?;
                Some(page)
            }
        };

        let created_at = match object.get("created_at") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(Error::validation(
                    vector_id,
                    format!("created_at must be a string, got {}", other),
                ));
            }
        };

        Ok(Self {
            document_id,
            title,
            content,
            page,
            created_at,
        })
    }

    /// Render the payload as a JSON object, the inverse of [`ChunkPayload::from_json`]
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "document_id": self.document_id,
            "title": self.title,
            "content": self.content,
            "page": self.page,
            "created_at": self.created_at,
        })
    }
}

fn required_string(vector_id: &str, value: Option<&Value>, field: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::validation(
            vector_id,
            format!("{} must be a string, got {}", field, other),
        )),
        None => Err(Error::validation(vector_id, format!("{} is missing", field))),
    }
}

/// A passage returned by the retrieval collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub vector_id: String,
    /// Similarity score, already threshold-filtered upstream
    pub relevance_score: f32,
    pub payload: ChunkPayload,
}

impl ChunkRecord {
    /// Create a chunk record from an already typed payload
    pub fn new(vector_id: impl Into<String>, relevance_score: f32, payload: ChunkPayload) -> Self {
        Self {
            vector_id: vector_id.into(),
            relevance_score,
            payload,
        }
    }

    /// Build a record from a search hit with an untyped payload
    pub fn from_json(vector_id: impl Into<String>, relevance_score: f32, payload: &Value) -> Result<Self> {
        let vector_id = vector_id.into();
        if !relevance_score.is_finite() {
            return Err(Error::validation(
                vector_id,
                format!("relevance score must be finite, got {}", relevance_score),
            ));
        }
        let payload = ChunkPayload::from_json(&vector_id, payload)?;
        Ok(Self {
            vector_id,
            relevance_score,
            payload,
        })
    }
}

/// A chunk with its derived trust scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: ChunkRecord,
    pub freshness_score: f64,
    pub combined_score: f64,
}

impl ScoredChunk {
    pub fn payload(&self) -> &ChunkPayload {
        &self.chunk.payload
    }

    pub fn title(&self) -> &str {
        &self.chunk.payload.title
    }

    /// Creation date, with blank strings treated as absent
    pub fn created_at(&self) -> Option<&str> {
        self.chunk
            .payload
            .created_at
            .as_deref()
            .filter(|date| !date.trim().is_empty())
    }
}

/// Kind of inconsistency flagged between two sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Sources dated in different calendar years
    Temporal,
    /// Reserved for statement-level contradictions; never produced yet
    Statement,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::Temporal => write!(f, "temporal"),
            ConflictType::Statement => write!(f, "statement"),
        }
    }
}

/// A flagged pair of potentially inconsistent sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub sources: [String; 2],
    pub description: String,
}

/// Output of the trust gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Chunks ordered by combined score, highest first
    pub scored_chunks: Vec<ScoredChunk>,
    pub conflicts: Vec<Conflict>,
}

impl EvaluationResult {
    pub fn is_empty(&self) -> bool {
        self.scored_chunks.is_empty()
    }
}

/// Coarse confidence attached to a synthesized answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Final answer returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub confidence: Confidence,
    /// Payloads of at most the top three ranked chunks
    pub sources: Vec<ChunkPayload>,
    pub conflicts: Vec<Conflict>,
}

/// Configuration for retrying transient generation failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl RetryConfig {
    /// Backoff to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2,
        }
    }
}
