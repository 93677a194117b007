//! Trust gate facade: score, rank, detect conflicts

use chrono::{DateTime, Utc};
use tkp_core::{ChunkRecord, EvaluationResult, TrustConfig};
use tracing::debug;

use crate::conflict::ConflictDetector;
use crate::freshness::FreshnessScorer;
use crate::ranker::rank;

/// Single entry point for evaluating a retrieval result.
///
/// Holds only read-only configuration, so one instance can be shared across
/// concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustGate {
    scorer: FreshnessScorer,
    detector: ConflictDetector,
}

impl TrustGate {
    pub fn new(config: &TrustConfig) -> Self {
        Self {
            scorer: FreshnessScorer::new(config.freshness_penalty_days),
            detector: ConflictDetector::new(config.dedupe_conflicts),
        }
    }

    /// Evaluate chunks against the current wall clock
    pub fn evaluate_retrieval(&self, chunks: Vec<ChunkRecord>) -> EvaluationResult {
        self.evaluate_retrieval_at(chunks, Utc::now())
    }

    /// Evaluate chunks as of `now`
    pub fn evaluate_retrieval_at(&self, chunks: Vec<ChunkRecord>, now: DateTime<Utc>) -> EvaluationResult {
        if chunks.is_empty() {
            return EvaluationResult::default();
        }

        let scored = chunks
            .into_iter()
            .map(|chunk| self.scorer.score(chunk, now))
            .collect();
        let scored_chunks = rank(scored);
        let conflicts = self.detector.detect(&scored_chunks);

        debug!(
            chunks = scored_chunks.len(),
            conflicts = conflicts.len(),
            "retrieval evaluated"
        );

        EvaluationResult {
            scored_chunks,
            conflicts,
        }
    }
}
