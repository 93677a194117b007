//! Ordering of scored chunks

use tkp_core::ScoredChunk;

/// Order chunks by combined score, highest first.
///
/// The sort is stable: chunks with equal scores keep the order retrieval returned them in.
pub fn rank(mut scored: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    scored
}
