//! Persistence collaborator trait and the record it receives

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AnswerResult, Confidence, Result};

/// One answered query, with its conflict report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: Uuid,
    pub query: String,
    pub confidence: Confidence,
    /// Set when the pipeline refused to synthesize an answer
    pub is_blocked: bool,
    pub answer: AnswerResult,
    pub created_at: DateTime<Utc>,
}

impl QueryLogEntry {
    /// Build a log entry for an answer produced at `created_at`
    pub fn new(query: impl Into<String>, answer: AnswerResult, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            confidence: answer.confidence,
            is_blocked: answer.confidence == Confidence::Low,
            answer,
            created_at,
        }
    }
}

/// Durable sink for pipeline outputs
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a query log entry
    async fn record(&self, entry: &QueryLogEntry) -> Result<()>;
}
